//! SAT Tutor - Voice-driven SAT Reading/Writing tutoring gateway
//!
//! This library provides the core functionality for the tutoring gateway:
//! - The session orchestration loop (turn state machine)
//! - Voice processing (STT transcription, TTS synthesis)
//! - Question bank loading and spoken-number resolution
//! - Category classification and dialogue template dispatch
//! - The file-based signaling protocol consumed by the front end
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Front end (browser)                 │
//! │      writes input audio  │  polls signal files      │
//! └────────────────────┬────────────────────────────────┘
//!                      │ shared session directory
//! ┌────────────────────▼────────────────────────────────┐
//! │                Session Orchestrator                  │
//! │  poll → STT → resolve question → dispatch → TTS     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Hosted vendor services                  │
//! │   Whisper/Deepgram │ chat completions │ OpenAI/Azure│
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod bank;
pub mod classify;
pub mod completion;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod language;
pub mod protocol;
pub mod search;
pub mod session;
pub mod voice;

pub use bank::{Question, QuestionBank, detect_question_number};
pub use classify::{Category, Classification};
pub use completion::{Complete, CompletionClient};
pub use config::Config;
pub use dialogue::{DialogueHandler, DialogueRegistry, TutorContext};
pub use error::{Error, Result};
pub use language::Language;
pub use protocol::{FileInput, InputSource, SessionDir, SignalFile, Speaker, Transcript};
pub use search::{SearchLinks, WebSearch, format_reference_links};
pub use session::{Collaborators, Orchestrator};
pub use voice::{AudioClip, AudioFormat, SpeechToText, Synthesize, TextToSpeech, Transcribe};
