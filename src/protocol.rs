//! File-based cross-process signaling protocol
//!
//! The orchestrator and the HTTP front end are separate processes
//! coordinating purely through well-known paths in a shared session
//! directory:
//!
//! - input audio artifact: written by the front end; zero length is the
//!   "empty" sentinel, non-empty means a new turn is ready; truncated (not
//!   deleted) by the orchestrator after consuming a turn
//! - `reply.mp3`: synthesized reply, overwritten per turn
//! - `processing_complete.json`: one-shot marker raised after every turn
//! - `conversation_complete.json`: one-shot marker raised only on the
//!   farewell turn
//! - `RecordedChats.txt`: append-only transcript, recreated at session start
//! - `web_search_results.txt`: reference links, written once at session end
//!
//! Signal markers are deleted by whichever side observes them; the writer
//! defensively removes a stale predecessor before re-arming.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::{Error, Result};

/// Default polling interval for the input artifact
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Speaker tag in transcript and chat history lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The student
    User,
    /// The tutoring assistant
    Tutor,
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Tutor => write!(f, "Tutor"),
        }
    }
}

/// Well-known layout of one session's output directory
#[derive(Debug, Clone)]
pub struct SessionDir {
    root: PathBuf,
}

impl SessionDir {
    /// Open (creating if needed) a session output directory
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root path of the session directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the synthesized reply audio artifact
    #[must_use]
    pub fn reply_audio_path(&self) -> PathBuf {
        self.root.join("reply.mp3")
    }

    /// Path of the transcript artifact
    #[must_use]
    pub fn transcript_path(&self) -> PathBuf {
        self.root.join("RecordedChats.txt")
    }

    /// Path of the web-search results artifact
    #[must_use]
    pub fn web_search_results_path(&self) -> PathBuf {
        self.root.join("web_search_results.txt")
    }

    /// The per-turn completion marker
    #[must_use]
    pub fn processing_complete(&self) -> SignalFile {
        SignalFile::new(self.root.join("processing_complete.json"))
    }

    /// The end-of-conversation marker
    #[must_use]
    pub fn conversation_complete(&self) -> SignalFile {
        SignalFile::new(self.root.join("conversation_complete.json"))
    }

    /// Overwrite the reply audio artifact
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn write_reply_audio(&self, audio: &[u8]) -> Result<()> {
        std::fs::write(self.reply_audio_path(), audio)?;
        Ok(())
    }

    /// Write the web-search results artifact
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn write_search_results(&self, text: &str) -> Result<()> {
        std::fs::write(self.web_search_results_path(), text)?;
        Ok(())
    }
}

/// Marker body written into signal files
#[derive(serde::Serialize, serde::Deserialize)]
struct SignalBody<'a> {
    status: &'a str,
}

/// A one-shot filesystem event marker
///
/// Existence is the event. The observer deletes the file on observation;
/// the writer removes any stale predecessor before re-arming so a missed
/// consume cannot be misread as a second event.
#[derive(Debug, Clone)]
pub struct SignalFile {
    path: PathBuf,
}

impl SignalFile {
    /// Wrap a marker path
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Marker path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raise the signal, overwriting any stale predecessor
    ///
    /// # Errors
    ///
    /// Returns error if the marker cannot be written
    pub fn raise(&self) -> Result<()> {
        if self.path.exists() {
            tracing::warn!(
                path = %self.path.display(),
                "stale signal marker found, overwriting"
            );
        }
        let body = serde_json::to_string(&SignalBody { status: "complete" })?;
        std::fs::write(&self.path, body)?;
        tracing::debug!(path = %self.path.display(), "signal raised");
        Ok(())
    }

    /// True if the marker currently exists
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.path.exists()
    }

    /// Consume the marker, deleting it
    ///
    /// Returns `true` if the marker existed.
    ///
    /// # Errors
    ///
    /// Returns error if an existing marker cannot be removed
    pub fn consume(&self) -> Result<bool> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Append-only human-readable transcript, recreated at session start
#[derive(Debug)]
pub struct Transcript {
    file: File,
    path: PathBuf,
}

impl Transcript {
    /// Create (truncating any previous session's file) the transcript
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self { file, path })
    }

    /// Transcript path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one `Speaker: text` line
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn append(&mut self, speaker: Speaker, text: &str) -> Result<()> {
        writeln!(self.file, "{speaker}: {text}")?;
        self.file.flush()?;
        Ok(())
    }
}

/// Source of per-turn audio input
///
/// Abstracts the busy-polling file watch so the orchestrator's ordering
/// logic is testable without real timing delays. The contract: `next_turn`
/// suspends until a new turn's audio is available, and `clear` resets the
/// source to the "no pending turn" state.
#[async_trait]
pub trait InputSource: Send {
    /// Block until a new turn's audio is available and return its bytes
    async fn next_turn(&mut self) -> Result<Vec<u8>>;

    /// Reset the input to the consumed state
    ///
    /// # Errors
    ///
    /// Returns error if the reset fails
    fn clear(&mut self) -> Result<()>;
}

/// Polling file-based input source
///
/// The front end writes raw audio to a fixed path; a zero-length file is
/// the "empty" sentinel. Polls at a fixed short interval and truncates the
/// file (never deletes it) to consume a turn.
pub struct FileInput {
    path: PathBuf,
    poll_interval: Duration,
}

impl FileInput {
    /// Create a polling input source over the given audio path
    ///
    /// # Errors
    ///
    /// Returns error if the input path does not exist
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(Error::Config(format!(
                "input audio file not found: {}",
                path.display()
            )));
        }
        Ok(Self {
            path,
            poll_interval,
        })
    }
}

#[async_trait]
impl InputSource for FileInput {
    async fn next_turn(&mut self) -> Result<Vec<u8>> {
        loop {
            let len = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
            if len > 0 {
                let bytes = std::fs::read(&self.path)?;
                if !bytes.is_empty() {
                    tracing::debug!(bytes = bytes.len(), "input audio detected");
                    return Ok(bytes);
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn clear(&mut self) -> Result<()> {
        std::fs::write(&self.path, b"")?;
        tracing::debug!(path = %self.path.display(), "input artifact cleared");
        Ok(())
    }
}
