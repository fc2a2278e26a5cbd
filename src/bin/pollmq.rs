//! pollmq broker daemon.
//
//  $ pollmq -p 8080
//  $ curl -X PUT 'localhost:8080/jobs?v=task1'
//  $ curl 'localhost:8080/jobs?timeout=5'
use std::process;
use std::sync::Arc;

use clap::Parser;
use pollmq::{config, logging::init_logging, start_broker, Broker, Config};

#[derive(Debug, Parser)]
#[command(name = "pollmq", version, about = "pollmq long-polling message queue")]
struct Cli {
    /// Port to listen on (overrides the port of `server.bind_addr`)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to config TOML (env POLLMQ_CONFIG is used when omitted)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let mut cfg: Config = match config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("[FATAL] Failed to load config: {e}");
            process::exit(1);
        }
    };
    if let Some(port) = cli.port {
        cfg.set_port(port);
    }

    let broker = Arc::new(Broker::new());
    if let Err(e) = start_broker(&cfg, broker).await {
        eprintln!("[FATAL] Broker crashed: {e}");
        process::exit(1);
    }
}
