use anyhow::Context;
use obed::config::Config;
use obed::ipc;
use std::io::{self, BufRead, Write};

fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("reading configuration")?;

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_filter)
                .with_context(|| format!("invalid log filter {:?}", config.log_filter))?,
        )
        .with_writer(io::stderr)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "obed sidecar started");

    let mut state = ipc::AppState::new(&config);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request line");
                // No id to echo back.
                ipc::bad_json(&e.to_string())
            }
        };
        let text = serde_json::to_string(&resp).context("serializing response")?;
        writeln!(stdout, "{}", text).context("writing response")?;
        stdout.flush().context("flushing response")?;
    }

    tracing::info!("stdin closed, exiting");
    Ok(())
}
