//! Newline-delimited JSON front end
//!
//! Reads `Inbound` records from any buffered reader and writes `Outbound`
//! records to any writer, one JSON object per line.

use crate::application::command::Inbound;
use crate::domain::shared::value_objects::ClientToken;
use crate::infrastructure::outbound::Outbound;
use serde_json::Value;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Decodes one input line
///
/// A request whose command does not decode but whose token does becomes
/// `Inbound::Malformed`, so the client still gets an answer. Anything else
/// undecodable is skipped.
pub fn parse_line(line: &str) -> Option<Inbound> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<Inbound>(line) {
        Ok(inbound) => Some(inbound),
        Err(e) => {
            let token = serde_json::from_str::<Value>(line)
                .ok()
                .and_then(|v| v.pointer("/request/token").and_then(Value::as_u64));
            match token {
                Some(token) => {
                    warn!("Undecodable request with token {}: {}", token, e);
                    Some(Inbound::Malformed(ClientToken::new(token)))
                }
                None => {
                    warn!("Skipping undecodable input line: {}", e);
                    None
                }
            }
        }
    }
}

/// Forwards decoded lines until EOF or until the dispatch loop goes away
pub async fn read_inbound<R>(reader: R, tx: mpsc::Sender<Inbound>) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let Some(inbound) = parse_line(&line) else {
            continue;
        };
        if tx.send(inbound).await.is_err() {
            debug!("Dispatch loop gone, stopping input");
            break;
        }
    }
    info!("Input closed");
    Ok(())
}

/// Writes every record until all senders are dropped
pub async fn write_outbound<W>(mut rx: mpsc::UnboundedReceiver<Outbound>, mut writer: W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(record) = rx.recv().await {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
