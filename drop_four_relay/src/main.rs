// CLI entry point for the Drop Four relay.
//
// Starts the relay (and, with `--web-port`, the page/cookie server) and
// blocks until the process is killed. SIGINT/SIGTERM terminate it directly:
// there is no state worth flushing.
//
// Usage:
//   relay [OPTIONS]
//     --bind <ADDR>          Listen address (default: 127.0.0.1)
//     --port <PORT>          Relay port (default: 3000)
//     --web-port <PORT>      Also serve pages and cookies on this port
//     --public-dir <DIR>     Page/asset directory (default: public)
//     --log-level <LEVEL>    trace, debug, info, warn, error (default: info)
//     --json-logs            Emit logs as JSON

use std::path::PathBuf;

use clap::Parser;
use drop_four_relay::server::{RelayConfig, start_relay};
use drop_four_relay::web::{WebConfig, start_web};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relay", about = "Drop Four two-player session relay")]
struct Cli {
    /// Listen address for the relay and web server.
    #[arg(long, env = "DROP_FOUR_BIND", default_value = "127.0.0.1")]
    bind: String,

    /// Relay TCP port.
    #[arg(long, env = "DROP_FOUR_PORT", default_value_t = 3000)]
    port: u16,

    /// Serve entry pages and preference cookies on this port.
    #[arg(long, env = "DROP_FOUR_WEB_PORT")]
    web_port: Option<u16>,

    /// Directory holding index.html, game.html and static assets.
    #[arg(long, env = "DROP_FOUR_PUBLIC_DIR", default_value = "public")]
    public_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_thread_ids(false))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "drop four relay starting");

    let config = RelayConfig {
        bind: cli.bind.clone(),
        port: cli.port,
        ..RelayConfig::default()
    };
    let (relay, addr) = start_relay(config)?;
    println!("Relay listening on {addr}");

    let web = match cli.web_port {
        Some(port) => {
            let (web, web_addr) = start_web(WebConfig {
                bind: cli.bind.clone(),
                port,
                public_dir: cli.public_dir.clone(),
            })?;
            println!("Pages at http://{web_addr}/");
            Some(web)
        }
        None => None,
    };

    relay.wait();
    if let Some(web) = web {
        web.stop();
    }
    Ok(())
}
