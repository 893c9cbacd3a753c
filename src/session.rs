//! Session orchestrator - the turn loop state machine
//!
//! Drives one tutoring conversation: waits for new audio, transcribes it,
//! resolves which question is being discussed, selects a dialogue handler,
//! invokes it, persists transcript and chat history, triggers synthesis,
//! and emits completion signals for the polling front end.
//!
//! Turn states: awaiting input → transcribing → resolving question (while
//! unresolved) → dispatching → synthesizing → signaling → awaiting input,
//! with a terminal state reached from dispatch on farewell detection.
//!
//! All in-loop errors are caught at the turn boundary; a single bad turn
//! degrades but never terminates the session.

use std::sync::Arc;

use crate::bank::{Question, QuestionBank, detect_question_number};
use crate::classify::classify_question;
use crate::completion::{Complete, CompletionClient};
use crate::config::Config;
use crate::dialogue::{DialogueHandler, DialogueRegistry, TutorContext};
use crate::language::Language;
use crate::protocol::{FileInput, InputSource, SessionDir, Speaker, Transcript};
use crate::search::{DEFAULT_LINK_COUNT, SearchLinks, WebSearch, format_reference_links};
use crate::voice::{AudioClip, SpeechToText, Synthesize, TextToSpeech, Transcribe};
use crate::{Error, Result};

/// Reply when no dialogue template matches the question's sub-category
pub const NO_TEMPLATE_REPLY: &str = "I could not identify this question.";

/// Reply when a dialogue handler invocation fails
pub const APOLOGY_REPLY: &str = "An error occurred while processing the question.";

/// One chat history entry
#[derive(Debug, Clone)]
pub struct ChatTurn {
    /// Who spoke
    pub speaker: Speaker,
    /// What was said
    pub text: String,
}

/// Outcome of a single turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Dialogue turn completed, keep polling
    Continue,
    /// No question number recognized yet, clarification sent
    AwaitingQuestion,
    /// Farewell detected, conversation over
    Ended,
}

/// Dialogue handler resolution state
///
/// Resolution happens exactly once per session, after the question is
/// known. A failed resolution is remembered so every subsequent turn
/// yields the fixed no-template reply instead of re-classifying.
enum HandlerSlot {
    Unresolved,
    NoMatch,
    Resolved(DialogueHandler),
}

/// External collaborators plugged into the orchestrator
///
/// Production wiring uses the real vendor clients; tests plug in scripted
/// doubles.
pub struct Collaborators {
    /// Per-turn audio input source
    pub input: Box<dyn InputSource>,
    /// Transcription client
    pub stt: Box<dyn Transcribe>,
    /// Synthesis client
    pub tts: Box<dyn Synthesize>,
    /// Completion client shared by classifier and dialogue templates
    pub completer: Arc<dyn Complete>,
    /// Session-end reference link search; `None` disables the artifact
    pub search: Option<Box<dyn SearchLinks>>,
}

/// The session orchestrator
pub struct Orchestrator {
    language: Language,
    bank: QuestionBank,
    dir: SessionDir,
    input: Box<dyn InputSource>,
    stt: Box<dyn Transcribe>,
    tts: Box<dyn Synthesize>,
    completer: Arc<dyn Complete>,
    search: Option<Box<dyn SearchLinks>>,
    registry: DialogueRegistry,
    transcript: Transcript,
    history: Vec<ChatTurn>,
    selected_question: Option<usize>,
    handler: HandlerSlot,
    turns: usize,
}

impl Orchestrator {
    /// Create an orchestrator over explicit collaborators
    ///
    /// Recreates (truncates) the transcript artifact.
    ///
    /// # Errors
    ///
    /// Returns error if the transcript cannot be created
    pub fn new(
        language: Language,
        bank: QuestionBank,
        dir: SessionDir,
        seams: Collaborators,
    ) -> Result<Self> {
        let transcript = Transcript::create(dir.transcript_path())?;
        let registry = DialogueRegistry::new(Arc::clone(&seams.completer));

        Ok(Self {
            language,
            bank,
            dir,
            input: seams.input,
            stt: seams.stt,
            tts: seams.tts,
            completer: seams.completer,
            search: seams.search,
            registry,
            transcript,
            history: Vec::new(),
            selected_question: None,
            handler: HandlerSlot::Unresolved,
            turns: 0,
        })
    }

    /// Build an orchestrator with real vendor clients from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the question bank fails to load, the input artifact
    /// is missing, or a required API key is absent
    pub fn from_config(config: &Config) -> Result<Self> {
        let dir = SessionDir::new(&config.output_dir)?;
        let bank = QuestionBank::load(&config.bank_path)?;
        let input = Box::new(FileInput::new(&config.input_path, config.poll_interval)?);

        let openai_key = config.api_keys.openai.clone().unwrap_or_default();

        let stt: Box<dyn Transcribe> = if config.voice.stt_provider == "deepgram" {
            let key = config
                .api_keys
                .deepgram
                .clone()
                .ok_or_else(|| Error::Config("DEEPGRAM_API_KEY not set".to_string()))?;
            Box::new(SpeechToText::new_deepgram(key, config.voice.stt_model.clone())?)
        } else {
            Box::new(SpeechToText::new_whisper(
                openai_key.clone(),
                config.voice.stt_model.clone(),
            )?)
        };

        let tts: Box<dyn Synthesize> = if config.voice.tts_provider == "azure" {
            let key = config
                .api_keys
                .azure_tts
                .clone()
                .ok_or_else(|| Error::Config("AZURE_TTS_KEY not set".to_string()))?;
            let region = config
                .api_keys
                .azure_tts_region
                .clone()
                .ok_or_else(|| Error::Config("AZURE_TTS_REGION not set".to_string()))?;
            let voice = config
                .voice
                .tts_voice
                .clone()
                .unwrap_or_else(|| "en-US-AvaMultilingualNeural".to_string());
            Box::new(TextToSpeech::new_azure(key, region, voice)?)
        } else {
            let voice = config
                .voice
                .tts_voice
                .clone()
                .unwrap_or_else(|| "alloy".to_string());
            Box::new(TextToSpeech::new_openai(
                openai_key.clone(),
                config.voice.tts_model.clone(),
                voice,
                config.voice.tts_speed,
            )?)
        };

        let completer: Arc<dyn Complete> = Arc::new(CompletionClient::new(
            openai_key,
            config.llm.model.clone(),
            config.llm.temperature,
        )?);

        let search: Box<dyn SearchLinks> = config.api_keys.serper.as_ref().map_or_else(
            || Box::new(WebSearch::new_google_scrape()) as Box<dyn SearchLinks>,
            |key| Box::new(WebSearch::new_serper(key.clone())),
        );

        Self::new(
            config.language,
            bank,
            dir,
            Collaborators {
                input,
                stt,
                tts,
                completer,
                search: Some(search),
            },
        )
    }

    /// The 1-based index of the resolved question, if any
    #[must_use]
    pub const fn selected_question(&self) -> Option<usize> {
        self.selected_question
    }

    /// The accumulated chat history
    #[must_use]
    pub fn chat_history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Run the turn loop until farewell
    ///
    /// # Errors
    ///
    /// Returns error only for unrecoverable session setup failures; in-loop
    /// errors are logged and the loop continues
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            language = %self.language,
            questions = self.bank.len(),
            output = %self.dir.root().display(),
            "session started"
        );

        loop {
            match self.run_turn().await {
                Ok(TurnOutcome::Ended) => break,
                Ok(outcome) => {
                    tracing::debug!(?outcome, turn = self.turns, "turn complete");
                }
                Err(e) => {
                    tracing::error!(error = %e, "turn failed, recovering");
                    // Keep the protocol moving so the front end is not
                    // left waiting on a signal that will never arrive
                    if let Err(e) = self.dir.processing_complete().raise() {
                        tracing::error!(error = %e, "failed to raise recovery signal");
                    }
                    if let Err(e) = self.input.clear() {
                        tracing::error!(error = %e, "failed to clear input artifact");
                    }
                }
            }
        }

        tracing::info!(turns = self.turns, "session ended");
        Ok(())
    }

    /// Execute one turn of the state machine
    ///
    /// # Errors
    ///
    /// Returns error if a persistence or signaling write fails
    pub async fn run_turn(&mut self) -> Result<TurnOutcome> {
        let audio = self.input.next_turn().await?;
        self.turns += 1;

        let clip = AudioClip::sniff(audio);
        let text = match self.stt.transcribe(&clip, self.language).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed, treating as empty turn");
                String::new()
            }
        };
        tracing::info!(text = %text, "student turn");

        if self.language.is_farewell(&text) {
            return self.finish_session(&text).await;
        }

        if self.selected_question.is_none() {
            if let Some(index) = detect_question_number(&text, self.bank.len()) {
                self.selected_question = Some(index);
                tracing::info!(question = index, "question selected");
            } else {
                return self.request_clarification(&text).await;
            }
        }

        let Some(index) = self.selected_question else {
            return Err(Error::Session("question unresolved after scan".to_string()));
        };
        let question = self
            .bank
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Session(format!("question {index} missing from bank")))?;

        self.ensure_handler(&question, &text).await;

        let reply = match &self.handler {
            HandlerSlot::Resolved(handler) => {
                let chat_history = self.render_history();
                let ctx = TutorContext {
                    question: &question,
                    chat_history: &chat_history,
                    language: self.language,
                    student_input: &text,
                };
                match handler.reply(&ctx).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        tracing::warn!(error = %e, "dialogue handler failed");
                        APOLOGY_REPLY.to_string()
                    }
                }
            }
            HandlerSlot::NoMatch => NO_TEMPLATE_REPLY.to_string(),
            HandlerSlot::Unresolved => {
                return Err(Error::Session("handler resolution skipped".to_string()));
            }
        };

        self.record(Speaker::User, &text)?;
        self.record(Speaker::Tutor, &reply)?;
        self.speak(&reply).await;
        self.dir.processing_complete().raise()?;
        self.input.clear()?;

        Ok(TurnOutcome::Continue)
    }

    /// Handle a turn with no recognizable question number
    ///
    /// Records the user line only; the clarification prompt is synthesized
    /// but deliberately not recorded as a tutor turn.
    async fn request_clarification(&mut self, text: &str) -> Result<TurnOutcome> {
        let prompt = self.language.clarification_prompt();
        tracing::info!("no question number recognized, asking for clarification");

        self.record(Speaker::User, text)?;
        self.speak(prompt).await;
        self.dir.processing_complete().raise()?;
        self.input.clear()?;

        Ok(TurnOutcome::AwaitingQuestion)
    }

    /// Handle the farewell turn: fixed reply, reference links, both signals
    async fn finish_session(&mut self, text: &str) -> Result<TurnOutcome> {
        let reply = self.language.farewell_reply();
        tracing::info!("farewell detected, ending session");

        self.record(Speaker::User, text)?;
        self.record(Speaker::Tutor, reply)?;
        self.speak(reply).await;

        if let Some(index) = self.selected_question {
            self.write_reference_links(index).await;
        } else {
            tracing::debug!("no question was resolved, skipping reference links");
        }

        self.dir.conversation_complete().raise()?;
        self.dir.processing_complete().raise()?;

        Ok(TurnOutcome::Ended)
    }

    /// Resolve the dialogue handler once per session
    ///
    /// Prefers the bank's pre-baked sub-category; falls back to the
    /// two-stage classifier on the turn text when the bank record has none.
    async fn ensure_handler(&mut self, question: &Question, turn_text: &str) {
        if !matches!(self.handler, HandlerSlot::Unresolved) {
            return;
        }

        let key = if let Some(sub) = &question.sub_category {
            tracing::info!(sub_category = %sub, "using bank-supplied sub-category");
            Some(sub.clone())
        } else {
            let classification = classify_question(self.completer.as_ref(), turn_text).await;
            classification.dispatch_key()
        };

        self.handler = match key.and_then(|k| self.registry.resolve(&k)) {
            Some(handler) => {
                tracing::info!(template = handler.key(), "dialogue template selected");
                HandlerSlot::Resolved(handler)
            }
            None => {
                tracing::warn!("no dialogue template matched, using fixed fallback reply");
                HandlerSlot::NoMatch
            }
        };
    }

    /// Run the web-search fallback and write the reference links artifact
    ///
    /// Failures are logged and never affect session termination.
    async fn write_reference_links(&self, index: usize) {
        let Some(search) = &self.search else {
            return;
        };
        let Some(question) = self.bank.get(index) else {
            return;
        };

        match search.search_links(&question.context, DEFAULT_LINK_COUNT).await {
            Ok(links) => {
                tracing::info!(links = links.len(), "reference links found");
                if let Err(e) = self.dir.write_search_results(&format_reference_links(&links)) {
                    tracing::warn!(error = %e, "failed to write reference links");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "reference link search failed");
            }
        }
    }

    /// Append a turn to the chat history and transcript, in order
    fn record(&mut self, speaker: Speaker, text: &str) -> Result<()> {
        self.history.push(ChatTurn {
            speaker,
            text: text.to_string(),
        });
        self.transcript.append(speaker, text)
    }

    /// Render the chat history as `Speaker: text` lines for prompt slots
    fn render_history(&self) -> String {
        let mut out = String::new();
        for turn in &self.history {
            out.push_str(&format!("{}: {}\n", turn.speaker, turn.text));
        }
        out
    }

    /// Synthesize a reply and overwrite the output audio artifact
    ///
    /// Synthesis failures are logged; signaling proceeds regardless.
    async fn speak(&self, text: &str) {
        match self.tts.synthesize(text, self.language).await {
            Ok(audio) => {
                if let Err(e) = self.dir.write_reply_audio(&audio) {
                    tracing::warn!(error = %e, "failed to write reply audio");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "synthesis failed, no reply audio written");
            }
        }
    }
}
