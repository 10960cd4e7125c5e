mod cache;
mod client;
mod config;
mod daemon;
mod dateval;
mod images;
mod occurrence;
mod records;
mod refs;
mod transport;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod testing;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use crate::client::GrampsClient;
use crate::config::AppConfig;

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--version" | "-V" => {
                println!("kinfeed {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "install-service" => {
                return daemon::install_service();
            }
            _ => {}
        }
    }

    let config_path = PathBuf::from("config.toml");
    let config = AppConfig::load(&config_path)?;
    let mut client = GrampsClient::from_config(&config)?;

    match args.get(1).map(String::as_str) {
        None | Some("run") => daemon::run(client, &config),
        Some("birthdays") => {
            let feed = client.get_birthdays(parse_limit(&args)?)?;
            println!("{}", serde_json::to_string_pretty(&feed)?);
            Ok(())
        }
        Some("deathdays") => {
            let feed = client.get_deathdays(parse_limit(&args)?)?;
            println!("{}", serde_json::to_string_pretty(&feed)?);
            Ok(())
        }
        Some("anniversaries") => {
            let feed = client.get_anniversaries(parse_limit(&args)?)?;
            println!("{}", serde_json::to_string_pretty(&feed)?);
            Ok(())
        }
        Some("doctor") => {
            let report = client.probe(5)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {other}\n");
            print_help();
            std::process::exit(2);
        }
    }
}

fn print_help() {
    println!("kinfeed {}", env!("CARGO_PKG_VERSION"));
    println!("{}\n", env!("CARGO_PKG_DESCRIPTION"));
    println!("Usage: kinfeed [COMMAND]\n");
    println!("Commands:");
    println!("  run                    Start the polling daemon (default)");
    println!("  birthdays [--limit N]  Print the upcoming-birthdays feed as JSON");
    println!("  deathdays [--limit N]  Print the memorial-days feed as JSON");
    println!("  anniversaries [--limit N]");
    println!("                         Print the anniversaries feed as JSON");
    println!("  doctor                 Probe connectivity and sample record shapes");
    println!("  install-service        Install as a system service (systemd/launchd)");
    println!("\nOptions:");
    println!("  -h, --help       Print help");
    println!("  -V, --version    Print version");
    println!("\nConfiguration is read from ./config.toml (see config.example.toml).");
}

/// `--limit N` for the one-shot feed dumps; defaults to 50.
fn parse_limit(args: &[String]) -> anyhow::Result<usize> {
    match args.iter().position(|a| a == "--limit") {
        None => Ok(50),
        Some(i) => match args.get(i + 1) {
            Some(value) => value
                .parse()
                .map_err(|_| anyhow::anyhow!("--limit expects a number, got '{value}'")),
            None => anyhow::bail!("--limit expects a number"),
        },
    }
}
