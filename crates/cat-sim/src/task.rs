//! Virtual radio task
//!
//! Runs a [`VirtualRadio`] behind one end of a `tokio::io::duplex` stream,
//! so a controller talks to it exactly as it would to a serial port. The
//! radio's state stays reachable through a [`VirtualRadioHandle`] for
//! inspection and fault injection while the task runs.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::radio::VirtualRadio;

/// Buffer size of each direction of the duplex stream
pub const DUPLEX_CAPACITY: usize = 4096;

/// Commands for a running virtual radio task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCommand {
    /// Stop the task and drop the stream, as if the cable was pulled
    Shutdown,
}

/// Shared access to a running virtual radio
#[derive(Debug, Clone)]
pub struct VirtualRadioHandle {
    radio: Arc<Mutex<VirtualRadio>>,
    cmd_tx: mpsc::Sender<SimCommand>,
}

impl VirtualRadioHandle {
    /// Run `f` with the radio locked
    ///
    /// The task is blocked while `f` runs, so keep it short.
    pub fn with<R>(&self, f: impl FnOnce(&mut VirtualRadio) -> R) -> R {
        let mut radio = self.radio.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut radio)
    }

    /// Complete commands received so far
    pub fn requests(&self) -> usize {
        self.with(|radio| radio.requests())
    }

    /// Stop the task; the controller sees the stream close
    pub async fn shutdown(&self) {
        // Already stopped if the receiver is gone
        let _ = self.cmd_tx.send(SimCommand::Shutdown).await;
    }
}

/// Spawn `radio` on the current runtime
///
/// Returns the controller's end of the stream and a handle to the radio.
pub fn spawn_virtual_radio(radio: VirtualRadio) -> (DuplexStream, VirtualRadioHandle) {
    let (controller, device) = tokio::io::duplex(DUPLEX_CAPACITY);
    let (cmd_tx, cmd_rx) = mpsc::channel(4);
    let radio = Arc::new(Mutex::new(radio));
    let handle = VirtualRadioHandle {
        radio: Arc::clone(&radio),
        cmd_tx,
    };

    tokio::spawn(async move {
        if let Err(e) = run_virtual_radio(device, radio, cmd_rx).await {
            warn!("Virtual radio task failed: {}", e);
        }
    });

    (controller, handle)
}

/// Run the virtual radio task
///
/// Reads controller bytes from `stream`, feeds them to the radio and writes
/// back whatever it answers, until the stream closes or a
/// [`SimCommand::Shutdown`] arrives.
pub async fn run_virtual_radio<S>(
    mut stream: S,
    radio: Arc<Mutex<VirtualRadio>>,
    mut cmd_rx: mpsc::Receiver<SimCommand>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = radio
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .id()
        .to_string();
    let mut buf = [0u8; 1024];
    info!("Starting virtual radio task for {}", id);

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                let n = match result {
                    Ok(0) => {
                        debug!("Virtual radio stream closed for {}", id);
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        warn!("Virtual radio {} stream error: {}", id, e);
                        return Err(e.into());
                    }
                };
                debug!("Virtual radio {} received {:02X?}", id, &buf[..n]);
                answer(&mut stream, &radio, &buf[..n]).await?;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SimCommand::Shutdown) => {
                        info!("Shutdown requested for virtual radio {}", id);
                        break;
                    }
                    // Handles gone; keep serving the stream
                    None => {
                        serve_until_closed(&mut stream, &radio, &id).await?;
                        break;
                    }
                }
            }
        }
    }

    info!("Virtual radio task ended for {}", id);
    Ok(())
}

/// Feed `data` to the radio and write back its answer
async fn answer<S>(stream: &mut S, radio: &Mutex<VirtualRadio>, data: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let output = radio
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .receive(data);
    if !output.is_empty() {
        stream.write_all(&output).await?;
        stream.flush().await?;
    }
    Ok(())
}

/// Serve the stream without a command channel
async fn serve_until_closed<S>(stream: &mut S, radio: &Mutex<VirtualRadio>, id: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            debug!("Virtual radio stream closed for {}", id);
            return Ok(());
        }
        answer(stream, radio, &buf[..n]).await?;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cat_protocol::civ::{encode_frame, opcode, CONTROLLER_ADDR};
    use cat_protocol::Slot;

    use super::*;

    #[tokio::test]
    async fn test_answers_over_duplex() {
        let radio = VirtualRadio::for_model("TS-590SG").unwrap();
        let (mut stream, handle) = spawn_virtual_radio(radio);

        stream.write_all(b"FB00007074000;FB;").await.unwrap();
        let mut buf = [0u8; 14];
        tokio::time::timeout(Duration::from_secs(1), stream.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf, b"FB00007074000;");
        assert_eq!(handle.requests(), 2);
        assert_eq!(handle.with(|r| r.frequency(Slot::MAIN_B)), 7_074_000);
    }

    #[tokio::test]
    async fn test_civ_reply_over_duplex() {
        let radio = VirtualRadio::for_model("IC-7300").unwrap();
        let (mut stream, _handle) = spawn_virtual_radio(radio);

        let request = encode_frame(0x94, CONTROLLER_ADDR, opcode::READ_FREQUENCY, None, &[]);
        stream.write_all(&request).await.unwrap();
        let mut buf = [0u8; 11];
        tokio::time::timeout(Duration::from_secs(1), stream.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            buf,
            [0xFE, 0xFE, 0xE0, 0x94, 0x03, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD]
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_stream() {
        let radio = VirtualRadio::for_model("K3").unwrap();
        let (mut stream, handle) = spawn_virtual_radio(radio);

        handle.shutdown().await;
        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }
}
