//! Framed transport to the classifier server
//!
//! Messages are JSON-encoded, prefixed with a 4-byte little-endian length.
//! This is not Socket.IO; see [`connect`] for what the server must speak.

use anyhow::Context;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::protocol::{decode_server_message, ClientMessage, ServerMessage};

/// Largest frame accepted in either direction
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Errors on the real-time channel
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),
}

/// Write one length-prefixed JSON frame
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(msg)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(ChannelError::FrameTooLarge(body.len()));
    }
    let len = (body.len() as u32).to_le_bytes();

    writer.write_all(&len).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;

    Ok(())
}

/// Read one frame body. `None` means the peer closed the stream between
/// frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ChannelError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ChannelError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Forward decoded server messages into `tx` until the stream closes.
///
/// Frames that fail to decode are logged and skipped.
pub fn spawn_reader<R>(mut reader: R, tx: mpsc::Sender<ServerMessage>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let body = match read_frame(&mut reader).await {
                Ok(Some(body)) => body,
                Ok(None) => {
                    info!("server closed the channel");
                    return;
                }
                Err(e) => {
                    warn!(?e, "channel read failed");
                    return;
                }
            };

            match decode_server_message(&body) {
                Ok(Some(msg)) => {
                    debug!(?msg, "received server message");
                    if tx.send(msg).await.is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(?e, "skipping undecodable message"),
            }
        }
    })
}

/// Sending half of the channel
pub struct ChannelClient<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> ChannelClient<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Send a transcript for classification
    pub async fn process_command(&mut self, text: &str) -> Result<(), ChannelError> {
        let msg = ClientMessage::ProcessCommand {
            text: text.to_string(),
        };
        debug!(?msg, "sending command");
        write_frame(&mut self.writer, &msg).await
    }
}

/// Connect to the classifier server over TCP.
///
/// The server must speak this module's framing: every message in both
/// directions is a 4-byte little-endian length followed by a JSON
/// `{"event", "data"}` envelope. A Socket.IO endpoint is not compatible and
/// needs a bridge that unwraps its events into these frames.
pub async fn connect(
    addr: &str,
) -> anyhow::Result<(ChannelClient<OwnedWriteHalf>, mpsc::Receiver<ServerMessage>)> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to classifier server at {addr}"))?;
    stream.set_nodelay(true)?;

    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::channel(32);
    spawn_reader(read_half, tx);

    info!(addr, "connected to classifier server");
    Ok((ChannelClient::new(write_half), rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Response;

    fn frame(json: &str) -> Vec<u8> {
        let mut bytes = (json.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(json.as_bytes());
        bytes
    }

    #[tokio::test]
    async fn test_process_command_frame() {
        let expected = frame(r#"{"event":"process_command","data":{"text":"who am i"}}"#);
        let writer = tokio_test::io::Builder::new().write(&expected).build();

        let mut client = ChannelClient::new(writer);
        client.process_command("who am i").await.unwrap();
    }

    #[tokio::test]
    async fn test_reader_skips_bad_frames() {
        let stream = tokio_test::io::Builder::new()
            .read(&frame("garbage"))
            .read(&frame(r#"{"event":"ui_update","data":{}}"#))
            .read(&frame(
                r#"{"event":"action_update","data":{"action":"show_identity","feedback":"You are Ann"}}"#,
            ))
            .read(&frame(r#"{"event":"error","data":{"message":"boom"}}"#))
            .build();

        let (tx, mut rx) = mpsc::channel(8);
        spawn_reader(stream, tx).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::ActionUpdate(Response::new(
                "show_identity",
                None,
                "You are Ann"
            )))
        );
        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::Error {
                message: "boom".into()
            })
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let len = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes();
        let mut stream = tokio_test::io::Builder::new().read(&len).build();
        assert!(matches!(
            read_frame(&mut stream).await,
            Err(ChannelError::FrameTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_clean_eof() {
        let mut stream = tokio_test::io::Builder::new().build();
        assert!(read_frame(&mut stream).await.unwrap().is_none());
    }
}
