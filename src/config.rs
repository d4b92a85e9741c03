use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory of the local mailbox; each folder is a subdirectory
    /// containing `.eml` files.
    pub mailbox_dir: String,
    /// Folders scanned in order.
    pub check_folders: Vec<String>,
    /// Only messages received within the last `days_back` days are considered.
    pub days_back: i64,
    /// Destination address every confirmed booking is forwarded to.
    pub forward_to: String,
    /// Path of the persisted forwarding history.
    pub history_path: String,
    /// Directory the forwarding sender delivers raw messages into.
    pub outbox_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mailbox_dir: "mail".to_string(),
            check_folders: vec!["INBOX".to_string()],
            days_back: 30,
            forward_to: "track@my.flightyapp.com".to_string(),
            history_path: "history.json".to_string(),
            outbox_dir: "outbox".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
