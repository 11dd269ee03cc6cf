//! Voice processing module
//!
//! Handles utterance capture, speech synthesis, and playback. Concrete
//! devices and providers sit behind the traits exported here.

mod capture;
mod playback;
mod tts;

pub use capture::{Capture, CaptureError, ChannelCapture};
pub use playback::{AudioHandle, AudioOutput, ClipOutput, PlaybackError, detect_player};
pub use tts::{OpenAiSpeech, Synthesizer};
