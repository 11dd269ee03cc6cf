//! Utterance capture
//!
//! A capture produces one transcript per call. Devices and speech
//! recognizers live behind [`Capture`]; [`ChannelCapture`] is fed by any
//! producer holding its sender (a terminal reader, a test).

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Failure obtaining an utterance
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The environment cannot capture speech at all
    #[error("speech capture not supported")]
    Unsupported,

    /// The device produced no usable signal
    #[error("no audio signal")]
    NoSignal,

    /// The user refused microphone access
    #[error("microphone permission denied")]
    PermissionDenied,

    /// The device failed
    #[error("capture device error: {0}")]
    DeviceError(String),

    /// No utterance arrived within the allotted time
    #[error("no utterance within {0:?}")]
    Timeout(Duration),

    /// The capture was cancelled before it completed
    #[error("capture aborted")]
    Aborted,
}

/// Source of user utterances
#[async_trait]
pub trait Capture: Send + Sync {
    /// Wait up to `timeout` for one utterance and return its transcript
    ///
    /// Implementations stop listening and return [`CaptureError::Aborted`]
    /// once `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns error if the device fails, nothing is heard in time or
    /// capture is aborted
    async fn capture(
        &self,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<String, CaptureError>;
}

/// Capture fed by transcripts sent through a channel
pub struct ChannelCapture {
    sender: mpsc::Sender<String>,
    receiver: Mutex<mpsc::Receiver<String>>,
}

impl ChannelCapture {
    /// Create a capture buffering up to `capacity` pending utterances
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Handle for producing utterances
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<String> {
        self.sender.clone()
    }
}

impl Default for ChannelCapture {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait]
impl Capture for ChannelCapture {
    async fn capture(
        &self,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<String, CaptureError> {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut receiver = tokio::select! {
            () = cancel.cancelled() => return Err(CaptureError::Aborted),
            () = &mut deadline => return Err(CaptureError::Timeout(timeout)),
            guard = self.receiver.lock() => guard,
        };

        tokio::select! {
            () = cancel.cancelled() => Err(CaptureError::Aborted),
            () = &mut deadline => Err(CaptureError::Timeout(timeout)),
            utterance = receiver.recv() => {
                let utterance = utterance
                    .ok_or_else(|| CaptureError::DeviceError("capture source closed".to_string()))?;
                tracing::debug!(chars = utterance.len(), "utterance captured");
                Ok(utterance)
            }
        }
    }
}
