//! Voice processing module
//!
//! Audio container handling plus the STT and TTS vendor client adapters.
//! The orchestrator only depends on the `Transcribe` and `Synthesize` seams.

mod audio;
mod stt;
mod tts;

pub use audio::{AudioClip, AudioFormat};
pub use stt::{SpeechToText, Transcribe};
pub use tts::{Synthesize, TextToSpeech};
