use clap::Parser;
use tracing_subscriber::EnvFilter;

/// The UAP Server: multiplexes UAP sessions over one UDP socket.
#[derive(Parser, Debug)]
#[command(name = "uap-server", version, about)]
struct Cli {
    /// UDP port to listen on.
    port: u16,
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

    server::run(cli.port).await;
}
