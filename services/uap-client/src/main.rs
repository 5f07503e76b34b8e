use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use client::{ClientError, FileLines, LineSource, StdinLines, DEFAULT_TIMEOUT};

/// The UAP Client: opens one session against a server and streams lines
/// of input to it.
#[derive(Parser, Debug)]
#[command(name = "uap-client", version, about)]
struct Cli {
    host: String,
    port: u16,
    /// Read lines from this file instead of standard input. A bare `q`
    /// line is only end-of-input in interactive (stdin) mode.
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let addr = match tokio::net::lookup_host((cli.host.as_str(), cli.port)).await {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => addr,
            None => {
                eprintln!("could not resolve {}:{}", cli.host, cli.port);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("could not resolve {}:{}: {e}", cli.host, cli.port);
            std::process::exit(1);
        }
    };

    let lines: Box<dyn LineSource> = match cli.file {
        Some(path) => match FileLines::open(&path).await {
            Ok(lines) => Box::new(lines),
            Err(e) => {
                eprintln!(
                    "{}",
                    ClientError::InputFile {
                        path: path.clone(),
                        source: e,
                    }
                );
                std::process::exit(1);
            }
        },
        None => Box::new(StdinLines::new()),
    };

    match client::run(addr, lines, DEFAULT_TIMEOUT).await {
        Ok(_session) => std::process::exit(0),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
