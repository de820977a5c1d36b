use clap::{Arg, Command};
use log::LevelFilter;
use phishguard::protocol::{handle_line, LogNotifier};
use phishguard::router::AnalysisRouter;
use phishguard::settings::SettingsProvider;
use phishguard::store::{KvStore, ResultStore, RETENTION_LIMIT};
use phishguard::{EmailData, LocalScanner, RemoteScanner};
use std::process;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() {
    let matches = Command::new("phishguard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Phishing analysis host: routes emails between an LLM-backed scanner and local heuristics")
        .arg(
            Arg::new("store")
                .short('s')
                .long("store")
                .value_name("FILE")
                .help("Key-value store file for settings and analysis records")
                .default_value("phishguard-store.json"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test-email")
                .long("test-email")
                .value_name("FILE")
                .help("Run the local heuristic scanner against an email JSON file and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("set-api-key")
                .long("set-api-key")
                .value_name("KEY")
                .help("Store the API credential (must start with sk-or-) and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("clear-api-key")
                .long("clear-api-key")
                .help("Remove the stored API credential and exit (analysis records are kept)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("set-endpoint")
                .long("set-endpoint")
                .value_name("URL")
                .help("Store the chat-completion endpoint URL and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("set-model")
                .long("set-model")
                .value_name("MODEL")
                .help("Store the model identifier and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("set-threshold")
                .long("set-threshold")
                .value_name("N")
                .help("Store the decision threshold (1-100) and exit")
                .value_parser(clap::value_parser!(u32))
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("show-latest")
                .long("show-latest")
                .help("Print the most recent stored analysis and exit")
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

    let store_path = matches.get_one::<String>("store").unwrap();
    let kv = match KvStore::open(store_path) {
        Ok(kv) => kv,
        Err(e) => {
            eprintln!("Error opening store {store_path}: {e}");
            process::exit(1);
        }
    };
    let settings = SettingsProvider::new(kv.clone());
    let results = ResultStore::new(kv);

    if let Some(email_file) = matches.get_one::<String>("test-email") {
        test_email_file(email_file);
        return;
    }

    if let Some(key) = matches.get_one::<String>("set-api-key") {
        exit_on_error(settings.set_api_key(key).await, "set API key");
        println!("API key stored.");
        return;
    }
    if matches.get_flag("clear-api-key") {
        exit_on_error(settings.clear_api_key().await, "clear API key");
        println!("API key cleared. Stored analyses were not removed.");
        return;
    }
    if let Some(endpoint) = matches.get_one::<String>("set-endpoint") {
        exit_on_error(settings.set_endpoint(endpoint).await, "set endpoint");
        println!("Endpoint stored.");
        return;
    }
    if let Some(model) = matches.get_one::<String>("set-model") {
        exit_on_error(settings.set_model(model).await, "set model");
        println!("Model stored.");
        return;
    }
    if let Some(threshold) = matches.get_one::<u32>("set-threshold") {
        exit_on_error(settings.set_threshold(*threshold).await, "set threshold");
        println!("Threshold stored.");
        return;
    }

    if matches.get_flag("show-latest") {
        match results.latest().await {
            Ok(Some(record)) => match serde_json::to_string_pretty(&record) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error printing record: {e}");
                    process::exit(1);
                }
            },
            Ok(None) => println!("No stored analyses."),
            Err(e) => {
                eprintln!("Error reading store: {e}");
                process::exit(1);
            }
        }
        return;
    }

    run_host(settings, results).await;
}

fn exit_on_error<T>(result: anyhow::Result<T>, what: &str) {
    if let Err(e) = result {
        eprintln!("Failed to {what}: {e}");
        process::exit(1);
    }
}

/// One-shot local scan of an email JSON file, for trying the heuristics
/// without a credential or a message channel.
fn test_email_file(path: &str) {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            process::exit(1);
        }
    };
    let email: EmailData = match serde_json::from_str(&content) {
        Ok(email) => email,
        Err(e) => {
            eprintln!("Error parsing {path}: {e}");
            process::exit(1);
        }
    };

    let result = LocalScanner::new().scan(&email, false);
    println!("Verdict:        {}", if result.is_phishing { "PHISHING" } else { "clean" });
    println!("Confidence:     {}", result.confidence);
    for indicator in &result.indicators {
        println!("Indicator:      {indicator}");
    }
    println!("Recommendation: {}", result.recommendation);
}

/// Message host loop: one JSON request per stdin line, one JSON reply per
/// stdout line. Notifications produce no reply line.
async fn run_host(settings: SettingsProvider, results: ResultStore) {
    // Bounded retention runs once per host start.
    if let Err(e) = results.evict_excess(RETENTION_LIMIT).await {
        log::warn!("retention eviction failed: {e:#}");
    }

    let remote = match RemoteScanner::new() {
        Ok(remote) => remote,
        Err(e) => {
            eprintln!("Error building HTTP client: {e}");
            process::exit(1);
        }
    };
    let router = AnalysisRouter::new(settings, remote, results);
    let notifier = LogNotifier;

    log::info!("phishguard host ready");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("stdin read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        if let Some(reply) = handle_line(&router, &notifier, &line).await {
            let out = format!("{reply}\n");
            if stdout.write_all(out.as_bytes()).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    }
    log::info!("phishguard host shutting down");
}
