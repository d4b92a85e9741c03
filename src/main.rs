use clap::{Arg, Command};
use flight_forwarder::engine::DecisionEngine;
use flight_forwarder::extractor::Extractor;
use flight_forwarder::history::HistoryStore;
use flight_forwarder::mailbox::{MailboxReader, MaildirReader, OutboxSender};
use flight_forwarder::report::{self, ReportFormat};
use flight_forwarder::{message, Config};
use log::LevelFilter;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() {
    let matches = Command::new("flight-forwarder")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scans a mailbox for airline flight confirmations and forwards each booking once")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("flight-forwarder.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the configuration and signature table, then exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test-email")
                .long("test-email")
                .value_name("FILE")
                .help("Classify a single .eml file and print the verdict, without touching history")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("dry-run")
                .short('d')
                .long("dry-run")
                .help("Report verdicts without forwarding or updating history")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("reset-history")
                .long("reset-history")
                .help("Clear the forwarding history and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .value_name("FORMAT")
                .help("Print a flight summary from the history (text, json) and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        match Extractor::new() {
            Ok(_) => {
                println!("Configuration OK: forwarding to {}", config.forward_to);
                println!("Folders: {}", config.check_folders.join(", "));
                println!("All signature patterns compiled successfully.");
            }
            Err(e) => {
                eprintln!("Signature table validation failed: {e}");
                process::exit(1);
            }
        }
        return;
    }

    if matches.get_flag("reset-history") {
        let mut store = HistoryStore::open(&config.history_path);
        if let Err(e) = store.reset() {
            eprintln!("Failed to reset history: {e}");
            process::exit(1);
        }
        println!("Forwarding history cleared: {}", config.history_path);
        return;
    }

    if let Some(format) = matches.get_one::<String>("report") {
        let format: ReportFormat = match format.parse() {
            Ok(format) => format,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        };
        let store = HistoryStore::open(&config.history_path);
        print!("{}", report::render(&store, format));
        return;
    }

    if let Some(email_file) = matches.get_one::<String>("test-email") {
        test_email_file(email_file);
        return;
    }

    let dry_run = matches.get_flag("dry-run");
    if let Err(e) = run(&config, dry_run) {
        log::error!("Run failed: {e}");
        process::exit(1);
    }
}

fn run(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    println!();
    println!("==================================================");
    println!("  Flight Forwarder");
    println!("==================================================");
    println!();
    println!("  Mailbox:     {}", config.mailbox_dir);
    println!("  Folders:     {}", config.check_folders.join(", "));
    println!("  Forward to:  {}", config.forward_to);
    println!("  Days back:   {}", config.days_back);
    if dry_run {
        println!("  Mode:        DRY RUN (nothing will be sent)");
    }
    println!();

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        log::info!("Interrupt received; finishing the current message");
        flag.store(true, Ordering::SeqCst);
    })?;

    let since = chrono::Utc::now() - chrono::Duration::days(config.days_back);
    let mut reader = MaildirReader::new(&config.mailbox_dir);
    let candidates = reader.fetch(&config.check_folders, Some(since))?;
    log::info!("Fetched {} candidate messages", candidates.len());

    let store = HistoryStore::open(&config.history_path);
    let mut engine = DecisionEngine::new(Extractor::new()?, store, dry_run);
    let mut sender = OutboxSender::new(&config.outbox_dir);

    let summary = engine.process_batch(&candidates, &mut sender, &config.forward_to, &interrupted);

    println!();
    println!("--------------------------------------------------");
    println!("  Messages scanned:       {}", summary.scanned);
    println!("  Flight emails found:    {}", summary.flights_found);
    if dry_run {
        println!("  Would be forwarded:     {}", summary.forwarded);
    } else {
        println!("  Successfully forwarded: {}", summary.forwarded);
    }
    println!("  Duplicates skipped:     {}", summary.duplicates);
    if summary.send_failures > 0 {
        println!("  Delivery failures:      {}", summary.send_failures);
    }
    if summary.interrupted {
        println!("  Interrupted before the batch finished.");
    }
    println!("--------------------------------------------------");
    println!();

    Ok(())
}

/// Classify one message file and print what the engine would do. Runs
/// against an in-memory history, so nothing is recorded.
fn test_email_file(path: &str) {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Could not read {path}: {e}");
            process::exit(1);
        }
    };
    let candidate = match message::parse_candidate(&raw, format!("file:{path}")) {
        Ok(candidate) => candidate,
        Err(e) => {
            eprintln!("Could not parse {path}: {e}");
            process::exit(1);
        }
    };

    let extractor = match Extractor::new() {
        Ok(extractor) => extractor,
        Err(e) => {
            eprintln!("Signature table failed to compile: {e}");
            process::exit(1);
        }
    };

    println!("From:    {}", candidate.sender);
    println!("Subject: {}", candidate.subject);

    match extractor.classify(&candidate) {
        Some(result) => {
            println!("Airline: {}", result.airline);
            println!(
                "Code:    {}",
                result.confirmation_code.as_deref().unwrap_or("(none)")
            );
            for leg in &result.flights {
                println!("Flight:  {}", leg.id());
            }
            println!("Confidence: {:.2}", result.confidence);

            let engine = DecisionEngine::new(extractor, HistoryStore::in_memory(), true);
            let decision = engine.decide(&candidate);
            println!("Verdict: {:?} ({})", decision.verdict, decision.reason);
        }
        None => println!("Verdict: SkipNotFlight (no airline signature matched)"),
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
