//! JSON-lines front end: one `ClientMessage` per input line, one
//! `ServerMessage` per output line

pub mod handlers;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;

use crate::protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
use crate::state::AppState;

/// Longest accepted input line in bytes, newline included
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Splits raw input into lines without giving up on bad ones.
///
/// Bytes are moved out of the reader as soon as they are seen, so a
/// `next_line` future dropped by `select!` loses nothing. An overlong line
/// is discarded up to its newline instead of being buffered.
struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
    overflow: bool,
}

impl<R> LineReader<R>
where
    R: AsyncBufRead + Unpin,
{
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            overflow: false,
        }
    }

    /// Next line as text, `Err` with a reason for a line that cannot be
    /// read as text, or None once the input is closed
    async fn next_line(&mut self) -> std::io::Result<Option<Result<String, String>>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.buf.is_empty() && !self.overflow {
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            let (chunk, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(end) => (&available[..=end], true),
                None => (available, false),
            };
            let used = chunk.len();

            if !self.overflow {
                if self.buf.len() + used > MAX_LINE_BYTES {
                    self.overflow = true;
                    self.buf.clear();
                } else {
                    self.buf.extend_from_slice(chunk);
                }
            }
            self.reader.consume(used);

            if complete {
                return Ok(Some(self.take_line()));
            }
        }
    }

    fn take_line(&mut self) -> Result<String, String> {
        let bytes = std::mem::take(&mut self.buf);
        if std::mem::replace(&mut self.overflow, false) {
            return Err(format!("line longer than {} bytes", MAX_LINE_BYTES));
        }
        String::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {}", e))
    }
}

async fn send<W>(writer: &mut W, msg: &ServerMessage) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(msg)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Serve one front end until its input closes
pub async fn run<R, W>(state: AppState, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = LineReader::new(reader);
    let mut broadcast_rx = state.broadcast.subscribe();

    let welcome = ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        server_now: chrono::Utc::now().to_rfc3339(),
        snapshot: Box::new(state.snapshot().await),
    };
    send(&mut writer, &welcome).await?;

    loop {
        tokio::select! {
            broadcast_msg = broadcast_rx.recv() => {
                match broadcast_msg {
                    Ok(msg) => send(&mut writer, &msg).await?,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Front end fell behind, skipped {} updates", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            line = lines.next_line() => {
                let text = match line? {
                    Some(Ok(text)) => text,
                    Some(Err(reason)) => {
                        tracing::error!("Unreadable input line: {}", reason);
                        let error = ServerMessage::Error {
                            code: "PARSE_ERROR".to_string(),
                            msg: format!("Invalid message format: {}", reason),
                        };
                        send(&mut writer, &error).await?;
                        continue;
                    }
                    None => {
                        tracing::info!("Input closed");
                        break;
                    }
                };
                if text.trim().is_empty() {
                    continue;
                }

                tracing::debug!("Received message: {}", text.trim_end());

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        if let Some(response) = handlers::handle_message(client_msg, &state).await {
                            send(&mut writer, &response).await?;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to parse client message: {}", e);
                        let error = ServerMessage::Error {
                            code: "PARSE_ERROR".to_string(),
                            msg: format!("Invalid message format: {}", e),
                        };
                        send(&mut writer, &error).await?;
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(output: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(output)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_welcome_then_replies() {
        let state = AppState::new();
        let input: &[u8] = b"{\"t\":\"add_team\"}\n\n{\"t\":\"bogus\"}\n";
        let mut output = Vec::new();

        run(state, input, &mut output).await.unwrap();

        let messages = decode(&output);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["t"], "welcome");
        assert_eq!(messages[0]["snapshot"]["game"]["phase"], "SETUP");
        assert_eq!(messages[1]["t"], "setup");
        assert_eq!(messages[1]["teams"].as_array().unwrap().len(), 3);
        assert_eq!(messages[2]["t"], "error");
        assert_eq!(messages[2]["code"], "PARSE_ERROR");
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_keeps_session() {
        let state = AppState::new();
        let input: &[u8] = b"\xff\xfe\n{\"t\":\"add_team\"}\n";
        let mut output = Vec::new();

        run(state.clone(), input, &mut output).await.unwrap();

        let messages = decode(&output);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["t"], "error");
        assert_eq!(messages[1]["code"], "PARSE_ERROR");
        assert_eq!(messages[2]["t"], "setup");
        assert_eq!(state.get_teams().await.len(), 3);
    }

    #[tokio::test]
    async fn test_overlong_line_is_rejected() {
        let state = AppState::new();
        let mut input = vec![b'x'; MAX_LINE_BYTES + 10];
        input.extend_from_slice(b"\n{\"t\":\"add_team\"}");
        let mut output = Vec::new();

        run(state, input.as_slice(), &mut output).await.unwrap();

        let messages = decode(&output);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["code"], "PARSE_ERROR");
        assert!(messages[1]["msg"].as_str().unwrap().contains("longer than"));
        // last line without a newline still counts
        assert_eq!(messages[2]["t"], "setup");
    }
}
