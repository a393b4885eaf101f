//! Checkward notify CLI
//!
//! Reads a collector notification from stdin, converts it to JSON, and
//! forwards it to a TCP endpoint, an HTTP endpoint, or stdout. A delivery
//! failure is logged but does not fail the process: the collector retries
//! notifications on a non-zero exit and a flapping endpoint would pile up
//! duplicate work.

use anyhow::Result;
use clap::Parser;
use cw_core::TcpSink;
use cw_observability::{init_logging_with_config, LoggingConfig};
use tokio::io::AsyncReadExt;
use tracing::{debug, error};

mod parse;

use parse::{parse_notification, NotificationRecord};

#[derive(Parser)]
#[command(name = "checkward-notify")]
#[command(version)]
#[command(about = "Forward collector notifications as JSON", long_about = None)]
struct Cli {
    /// TCP endpoint to write the JSON to
    #[arg(long, value_name = "HOST:PORT", conflicts_with = "http_server")]
    server: Option<String>,

    /// HTTP endpoint to POST the JSON to
    #[arg(long, value_name = "URL")]
    http_server: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    debug: bool,
}

async fn deliver_tcp(addr: &str, body: &str) {
    let sink = match TcpSink::new(addr) {
        Ok(sink) => sink,
        Err(e) => {
            error!(addr = %addr, error = %e, "invalid TCP endpoint");
            return;
        }
    };
    match sink.send_text(body).await {
        Ok(()) => debug!(addr = %addr, "notification written"),
        Err(e) => error!(addr = %addr, error = %e, "TCP delivery failed"),
    }
}

async fn deliver_http(url: &str, record: &NotificationRecord) {
    let client = reqwest::Client::new();
    let result = client.post(url).json(record).send().await;
    match result {
        Ok(response) if response.status().is_success() => {
            debug!(url = %url, "notification posted");
        }
        Ok(response) => {
            error!(url = %url, status = %response.status(), "HTTP delivery rejected");
        }
        Err(e) => {
            error!(url = %url, error = %e, "HTTP delivery failed");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = if cli.debug {
        LoggingConfig::development()
    } else {
        LoggingConfig::default()
    };
    init_logging_with_config(logging);

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    if input.trim().is_empty() {
        error!("no notification text on stdin");
        std::process::exit(1);
    }

    let record = parse_notification(&input);
    let body = serde_json::to_string(&record)?;
    debug!(body = %body, "parsed notification");

    if let Some(addr) = cli.server.as_deref() {
        deliver_tcp(addr, &body).await;
    } else if let Some(url) = cli.http_server.as_deref() {
        deliver_http(url, &record).await;
    } else {
        println!("{}", body);
    }

    Ok(())
}
