//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! One process is one session. Stdout carries protocol frames only; logs go to stderr.

use std::io;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::mcp::rpc::{json_rpc_error, PARSE_ERROR};
use crate::mcp::server::McpService;
use crate::shutdown::shutdown_signal;

/// Serves until stdin closes or a shutdown signal arrives.
pub async fn serve_stdio(service: &McpService) -> io::Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();

    info!("stdio transport ready");
    tokio::select! {
        result = run_lines(reader, writer, service) => result,
        _ = shutdown_signal() => {
            info!("shutdown signal received, stopping stdio transport");
            Ok(())
        }
    }
}

pub async fn run_lines<R, W>(reader: R, mut writer: W, service: &McpService) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(payload) => service.handle_payload(payload).await,
            Err(err) => {
                warn!(error = %err, "invalid JSON on stdin");
                Some(json_rpc_error(None, PARSE_ERROR, "Parse error"))
            }
        };

        if let Some(response) = response {
            let mut frame = serde_json::to_string(&response)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            frame.push('\n');
            writer.write_all(frame.as_bytes()).await?;
            writer.flush().await?;
        }
    }

    info!("stdin closed, stopping stdio transport");
    Ok(())
}
