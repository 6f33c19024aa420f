//! Transport seam — hands finished diagnostics to the editor protocol.

use parking_lot::Mutex;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::codec::FrameWriter;
use crate::protocol::publish_diagnostics_notification;
use crate::types::Diagnostic;

/// Sends a document's diagnostics as an out-of-band notification.
///
/// Called from analysis tasks, so implementations must not block.
pub trait DiagnosticsPublisher: Send + Sync {
    fn publish(&self, uri: &str, diagnostics: Vec<Diagnostic>);
}

enum WriterCommand {
    Send(serde_json::Value),
    Shutdown,
}

/// Publishes `textDocument/publishDiagnostics` frames to a byte stream.
///
/// Frames are queued and written in order by a dedicated writer task.
pub struct FramedPublisher {
    writer_tx: mpsc::UnboundedSender<WriterCommand>,
    writer_handle: Mutex<Option<JoinHandle<()>>>,
}

impl FramedPublisher {
    /// Spawn the writer task on the current runtime.
    pub fn spawn<W>(output: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<WriterCommand>();
        let writer_handle = tokio::spawn(async move {
            let mut writer = FrameWriter::new(output);
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_frame(&frame).await {
                            tracing::warn!("Diagnostics write error: {e:#}");
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
            if let Err(e) = writer.close().await {
                tracing::debug!("Closing diagnostics output failed: {e:#}");
            }
        });

        Self {
            writer_tx,
            writer_handle: Mutex::new(Some(writer_handle)),
        }
    }

    /// Write everything queued so far, then stop the writer task.
    pub async fn shutdown(&self) {
        let _ = self.writer_tx.send(WriterCommand::Shutdown);
        let handle = self.writer_handle.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::warn!("Diagnostics writer task failed: {e}");
        }
    }
}

impl DiagnosticsPublisher for FramedPublisher {
    fn publish(&self, uri: &str, diagnostics: Vec<Diagnostic>) {
        let frame = match publish_diagnostics_notification(uri, &diagnostics) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(uri, "Failed to serialize diagnostics: {e}");
                return;
            }
        };
        if self.writer_tx.send(WriterCommand::Send(frame)).is_err() {
            tracing::debug!(uri, "Diagnostics writer closed; dropping publish");
        }
    }
}
