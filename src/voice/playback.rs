//! Audio playback of synthesized clips
//!
//! A loaded clip is owned by its [`AudioHandle`]; dropping the handle stops
//! playback and releases everything the clip holds.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Players tried, in order, when none is configured
const KNOWN_PLAYERS: &[&str] = &["mpv", "ffplay", "afplay"];

/// How often a playing clip checks whether its player exited
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Failure loading or playing a clip
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    /// The clip holds no audio
    #[error("empty audio clip")]
    EmptyClip,

    /// The clip could not be staged for playback
    #[error("failed to stage audio: {0}")]
    Io(String),

    /// The player could not be started
    #[error("audio player failed: {0}")]
    Player(String),
}

impl From<std::io::Error> for PlaybackError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Something that can load synthesized audio for playback
pub trait AudioOutput: Send + Sync {
    /// Load an encoded clip
    ///
    /// # Errors
    ///
    /// Returns error if the clip cannot be staged
    fn load(&self, audio: Vec<u8>) -> Result<Box<dyn AudioHandle>, PlaybackError>;
}

/// A loaded clip; released on drop
pub trait AudioHandle: Send {
    /// Identifier reported when the clip finishes
    fn id(&self) -> Uuid;

    /// Start playback
    ///
    /// # Errors
    ///
    /// Returns error if the player cannot be started
    fn play(&mut self) -> Result<(), PlaybackError>;
}

/// Audio output that stages clips in temporary files and plays them with an
/// external player
///
/// Finished clip ids are sent on the channel given at construction. Without a
/// player the clip counts as finished as soon as it starts.
pub struct ClipOutput {
    player: Option<PathBuf>,
    finished: mpsc::UnboundedSender<Uuid>,
}

impl ClipOutput {
    /// Create an output using `player`, or the first known player on `PATH`
    #[must_use]
    pub fn new(player: Option<&str>, finished: mpsc::UnboundedSender<Uuid>) -> Self {
        let player = match player {
            Some(cmd) => which::which(cmd)
                .inspect_err(|e| tracing::warn!(player = cmd, error = %e, "audio player not found"))
                .ok(),
            None => detect_player(),
        };

        match &player {
            Some(path) => tracing::debug!(player = %path.display(), "audio player selected"),
            None => tracing::info!("no audio player available, clips will not be heard"),
        }

        Self { player, finished }
    }

    #[must_use]
    pub fn player(&self) -> Option<&Path> {
        self.player.as_deref()
    }
}

/// First known player found on `PATH`
#[must_use]
pub fn detect_player() -> Option<PathBuf> {
    KNOWN_PLAYERS
        .iter()
        .find_map(|name| which::which(name).ok())
}

impl AudioOutput for ClipOutput {
    fn load(&self, audio: Vec<u8>) -> Result<Box<dyn AudioHandle>, PlaybackError> {
        if audio.is_empty() {
            return Err(PlaybackError::EmptyClip);
        }

        let mut file = tempfile::Builder::new()
            .prefix("parley-")
            .suffix(".mp3")
            .tempfile()?;
        file.write_all(&audio)?;
        file.flush()?;

        let id = Uuid::new_v4();
        tracing::debug!(clip = %id, bytes = audio.len(), "clip loaded");

        Ok(Box::new(Clip {
            id,
            file,
            player: self.player.clone(),
            child: Arc::new(Mutex::new(None)),
            finished: self.finished.clone(),
        }))
    }
}

struct Clip {
    id: Uuid,
    file: tempfile::NamedTempFile,
    player: Option<PathBuf>,
    child: Arc<Mutex<Option<Child>>>,
    finished: mpsc::UnboundedSender<Uuid>,
}

fn player_args(player: &Path) -> &'static [&'static str] {
    match player.file_stem().and_then(|s| s.to_str()) {
        Some("mpv") => &["--no-video", "--really-quiet"],
        Some("ffplay") => &["-nodisp", "-autoexit", "-loglevel", "quiet"],
        _ => &[],
    }
}

impl AudioHandle for Clip {
    fn id(&self) -> Uuid {
        self.id
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        let Some(player) = &self.player else {
            let _ = self.finished.send(self.id);
            return Ok(());
        };

        let child = Command::new(player)
            .args(player_args(player))
            .arg(self.file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PlaybackError::Player(e.to_string()))?;

        *self.child.lock().unwrap_or_else(PoisonError::into_inner) = Some(child);
        tracing::debug!(clip = %self.id, player = %player.display(), "playback started");

        let id = self.id;
        let slot = Arc::clone(&self.child);
        let finished = self.finished.clone();
        std::thread::spawn(move || {
            loop {
                {
                    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
                    let Some(child) = guard.as_mut() else {
                        // Released before the player exited
                        return;
                    };
                    match child.try_wait() {
                        Ok(Some(status)) => {
                            guard.take();
                            tracing::debug!(clip = %id, %status, "playback finished");
                            let _ = finished.send(id);
                            return;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            guard.take();
                            tracing::warn!(clip = %id, error = %e, "lost track of audio player");
                            let _ = finished.send(id);
                            return;
                        }
                    }
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        });

        Ok(())
    }
}

impl Drop for Clip {
    fn drop(&mut self) {
        let child = self
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut child) = child {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!(clip = %self.id, "playback stopped");
        }
    }
}
