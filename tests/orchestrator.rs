//! Orchestrator integration tests
//!
//! Drives the turn loop with scripted doubles for every collaborator so
//! ordering, persistence, and signaling can be asserted without vendor
//! APIs or real audio.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use sat_tutor::protocol::{InputSource, SessionDir, Speaker};
use sat_tutor::search::SearchLinks;
use sat_tutor::session::{APOLOGY_REPLY, NO_TEMPLATE_REPLY, TurnOutcome};
use sat_tutor::voice::{AudioClip, Synthesize, Transcribe};
use sat_tutor::{
    Collaborators, Complete, Error, Language, Orchestrator, QuestionBank, Result,
};

const BANK: &str = "\
In 2014, a mobile carrier clipped clients for millions of dollars.
--
As used in the text, what does the word \"clipped\" most nearly mean?
--
A) Cut
B) Overcharged
--
Overcharged matches the context; (B) is correct.
--
vocabulary
%%
A passage about the Harlem Renaissance.
--
Which choice best states the main idea of the text?
--
A) First
B) Second
--
(A) is correct.
--
main ideas
%%
A passage about monarch butterflies.
--
Which choice best describes the function of the underlined sentence?
--
A) First
B) Second
--
(B) is correct.
%%
A passage about telegraph inventors.
--
Which choice most logically completes the text?
--
A) meanwhile,
B) therefore,
--
(A) is correct.
--
transition
%%
A passage where a word is used in an unusual sense.
--
As used in the text, what does the word most nearly mean?
--
A) First
B) Second
--
(B) is correct.
--
vocabulary
";

/// Input source over a fixed script of audio turns
struct ScriptedInput {
    turns: VecDeque<Vec<u8>>,
    cleared: Arc<AtomicUsize>,
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn next_turn(&mut self) -> Result<Vec<u8>> {
        self.turns
            .pop_front()
            .ok_or_else(|| Error::Session("input script exhausted".to_string()))
    }

    fn clear(&mut self) -> Result<()> {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Transcriber returning pre-scripted texts in order
struct ScriptedStt {
    texts: std::sync::Mutex<VecDeque<String>>,
}

#[async_trait]
impl Transcribe for ScriptedStt {
    async fn transcribe(&self, _clip: &AudioClip, _language: Language) -> Result<String> {
        let mut texts = self
            .texts
            .lock()
            .map_err(|_| Error::Stt("script lock poisoned".to_string()))?;
        texts
            .pop_front()
            .ok_or_else(|| Error::Stt("transcript script exhausted".to_string()))
    }
}

/// Synthesizer emitting a fixed byte pattern
struct NullTts;

#[async_trait]
impl Synthesize for NullTts {
    async fn synthesize(&self, _text: &str, _language: Language) -> Result<Vec<u8>> {
        Ok(vec![0xFF, 0xE3, 0x00])
    }
}

/// Completer returning a fixed reply and counting invocations
struct StaticComplete {
    reply: String,
    calls: AtomicUsize,
}

impl StaticComplete {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Complete for StaticComplete {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Search double returning a fixed link set
struct FixedSearch;

#[async_trait]
impl SearchLinks for FixedSearch {
    async fn search_links(&self, _query: &str, _limit: usize) -> Result<Vec<String>> {
        Ok(vec!["https://example.com/sat".to_string()])
    }
}

struct Harness {
    orchestrator: Orchestrator,
    session: SessionDir,
    cleared: Arc<AtomicUsize>,
    completer: Arc<StaticComplete>,
    _dir: tempfile::TempDir,
}

fn harness(texts: &[&str], completer_reply: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let session = SessionDir::new(dir.path()).unwrap();
    let bank = QuestionBank::parse(BANK).unwrap();
    let cleared = Arc::new(AtomicUsize::new(0));
    let completer = Arc::new(StaticComplete::new(completer_reply));

    let input = Box::new(ScriptedInput {
        turns: texts.iter().map(|_| b"audio".to_vec()).collect(),
        cleared: Arc::clone(&cleared),
    });
    let stt = Box::new(ScriptedStt {
        texts: std::sync::Mutex::new(texts.iter().map(|t| (*t).to_string()).collect()),
    });

    let orchestrator = Orchestrator::new(
        Language::English,
        bank,
        session.clone(),
        Collaborators {
            input,
            stt,
            tts: Box::new(NullTts),
            completer: Arc::clone(&completer) as Arc<dyn Complete>,
            search: Some(Box::new(FixedSearch)),
        },
    )
    .unwrap();

    Harness {
        orchestrator,
        session,
        cleared,
        completer,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_clarification_records_user_line_only() {
    let mut h = harness(&["can you help me with this passage"], "unused");

    let outcome = h.orchestrator.run_turn().await.unwrap();
    assert_eq!(outcome, TurnOutcome::AwaitingQuestion);

    // The clarification prompt is spoken but not persisted as a tutor turn
    let history = h.orchestrator.chat_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].speaker, Speaker::User);
    assert!(h.orchestrator.selected_question().is_none());

    assert!(h.session.processing_complete().is_raised());
    assert!(!h.session.conversation_complete().is_raised());
    assert_eq!(h.cleared.load(Ordering::SeqCst), 1);

    // Reply audio carries the synthesized clarification
    assert!(h.session.reply_audio_path().exists());
}

#[tokio::test]
async fn test_farewell_ends_session_and_raises_both_signals() {
    let mut h = harness(&["Thanks, BYE now"], "unused");

    let outcome = h.orchestrator.run_turn().await.unwrap();
    assert_eq!(outcome, TurnOutcome::Ended);

    let history = h.orchestrator.chat_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].speaker, Speaker::Tutor);

    let transcript = std::fs::read_to_string(h.session.transcript_path()).unwrap();
    assert!(transcript.contains("User: Thanks, BYE now"));
    assert!(transcript.contains("Tutor: Happy to help"));

    assert!(h.session.processing_complete().is_raised());
    assert!(h.session.conversation_complete().is_raised());

    // No question resolved, so no reference links artifact
    assert!(!h.session.web_search_results_path().exists());
    // Terminal turn leaves the input untouched
    assert_eq!(h.cleared.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_question_selection_is_idempotent_and_history_grows_by_two() {
    let mut h = harness(
        &["question two please", "maybe the answer is option 1"],
        "Look at the closing sentence.",
    );

    assert_eq!(h.orchestrator.run_turn().await.unwrap(), TurnOutcome::Continue);
    assert_eq!(h.orchestrator.selected_question(), Some(2));
    assert_eq!(h.orchestrator.chat_history().len(), 2);

    // The second turn contains a digit, but a resolved index never re-scans
    assert_eq!(h.orchestrator.run_turn().await.unwrap(), TurnOutcome::Continue);
    assert_eq!(h.orchestrator.selected_question(), Some(2));
    assert_eq!(h.orchestrator.chat_history().len(), 4);

    let history = h.orchestrator.chat_history();
    assert_eq!(history[3].text, "Look at the closing sentence.");
}

#[tokio::test]
async fn test_spoken_number_word_resolves_and_dispatches() {
    let mut h = harness(
        &["let's work on question five"],
        "What does the sentence around the word suggest?",
    );

    assert_eq!(h.orchestrator.run_turn().await.unwrap(), TurnOutcome::Continue);
    assert_eq!(h.orchestrator.selected_question(), Some(5));

    // Record five carries "vocabulary", so the only completion call is the
    // dialogue reply itself
    assert_eq!(h.completer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.orchestrator.chat_history()[1].text,
        "What does the sentence around the word suggest?"
    );
}

#[tokio::test]
async fn test_bank_sub_category_bypasses_classifier() {
    let mut h = harness(
        &["question 1 what does clipped mean"],
        "Let's use context clues from the passage.",
    );

    assert_eq!(h.orchestrator.run_turn().await.unwrap(), TurnOutcome::Continue);

    // One completion call: the dialogue reply. Classification never ran
    // because the bank record carries "vocabulary".
    assert_eq!(h.completer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.orchestrator.chat_history()[1].text,
        "Let's use context clues from the passage."
    );
}

#[tokio::test]
async fn test_unclassifiable_question_yields_fixed_fallback_once_resolved() {
    // Record three has no sub-category; the completer's answer matches no
    // category, so resolution lands on the fixed fallback
    let mut h = harness(
        &["question three what is going on", "still confused"],
        "no idea",
    );

    assert_eq!(h.orchestrator.run_turn().await.unwrap(), TurnOutcome::Continue);
    assert_eq!(h.orchestrator.chat_history()[1].text, NO_TEMPLATE_REPLY);
    let calls_after_first = h.completer.calls.load(Ordering::SeqCst);

    // Failed resolution is cached: no re-classification on later turns
    assert_eq!(h.orchestrator.run_turn().await.unwrap(), TurnOutcome::Continue);
    assert_eq!(h.orchestrator.chat_history()[3].text, NO_TEMPLATE_REPLY);
    assert_eq!(h.completer.calls.load(Ordering::SeqCst), calls_after_first);
}

#[tokio::test]
async fn test_end_to_end_session_with_farewell_artifacts() {
    let mut h = harness(
        &["question 1 what does clipped mean", "Thank you, goodbye"],
        "Start from the sentence around the word.",
    );

    assert_eq!(h.orchestrator.run_turn().await.unwrap(), TurnOutcome::Continue);
    assert!(h.session.reply_audio_path().exists());
    assert!(h.session.processing_complete().is_raised());
    assert!(!h.session.conversation_complete().is_raised());

    // Front end observes and consumes the per-turn marker
    assert!(h.session.processing_complete().consume().unwrap());

    assert_eq!(h.orchestrator.run_turn().await.unwrap(), TurnOutcome::Ended);
    assert!(h.session.processing_complete().is_raised());
    assert!(h.session.conversation_complete().is_raised());

    let transcript = std::fs::read_to_string(h.session.transcript_path()).unwrap();
    let lines: Vec<&str> = transcript.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("User: question 1"));
    assert_eq!(lines[1], "Tutor: Start from the sentence around the word.");

    let links = std::fs::read_to_string(h.session.web_search_results_path()).unwrap();
    assert_eq!(links, "Reference links:\n[1] - https://example.com/sat\n");
}

#[tokio::test]
async fn test_handler_failure_yields_apology_and_keeps_session_alive() {
    struct FailingComplete;

    #[async_trait]
    impl Complete for FailingComplete {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Err(Error::Completion("upstream unavailable".to_string()))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let session = SessionDir::new(dir.path()).unwrap();
    let bank = QuestionBank::parse(BANK).unwrap();
    let cleared = Arc::new(AtomicUsize::new(0));

    let mut orchestrator = Orchestrator::new(
        Language::English,
        bank,
        session.clone(),
        Collaborators {
            input: Box::new(ScriptedInput {
                turns: VecDeque::from([b"audio".to_vec()]),
                cleared,
            }),
            stt: Box::new(ScriptedStt {
                texts: std::sync::Mutex::new(VecDeque::from([
                    "question 1 what does clipped mean".to_string(),
                ])),
            }),
            tts: Box::new(NullTts),
            completer: Arc::new(FailingComplete),
            search: None,
        },
    )
    .unwrap();

    assert_eq!(orchestrator.run_turn().await.unwrap(), TurnOutcome::Continue);
    assert_eq!(orchestrator.chat_history()[1].text, APOLOGY_REPLY);
    assert!(session.processing_complete().is_raised());
}

#[tokio::test]
async fn test_failed_transcription_degrades_to_empty_turn() {
    struct FailingStt;

    #[async_trait]
    impl Transcribe for FailingStt {
        async fn transcribe(&self, _clip: &AudioClip, _language: Language) -> Result<String> {
            Err(Error::Stt("vendor unavailable".to_string()))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let session = SessionDir::new(dir.path()).unwrap();
    let bank = QuestionBank::parse(BANK).unwrap();
    let cleared = Arc::new(AtomicUsize::new(0));

    let mut orchestrator = Orchestrator::new(
        Language::English,
        bank,
        session.clone(),
        Collaborators {
            input: Box::new(ScriptedInput {
                turns: VecDeque::from([b"audio".to_vec()]),
                cleared: Arc::clone(&cleared),
            }),
            stt: Box::new(FailingStt),
            tts: Box::new(NullTts),
            completer: Arc::new(StaticComplete::new("unused")),
            search: None,
        },
    )
    .unwrap();

    // Failed transcription is an empty-text turn: no number to resolve, so
    // the session asks for clarification instead of crashing
    assert_eq!(
        orchestrator.run_turn().await.unwrap(),
        TurnOutcome::AwaitingQuestion
    );

    let history = orchestrator.chat_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].speaker, Speaker::User);
    assert_eq!(history[0].text, "");

    assert!(session.processing_complete().is_raised());
    assert!(!session.conversation_complete().is_raised());
    assert_eq!(cleared.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_synthesis_still_signals_turn_complete() {
    struct FailingTts;

    #[async_trait]
    impl Synthesize for FailingTts {
        async fn synthesize(&self, _text: &str, _language: Language) -> Result<Vec<u8>> {
            Err(Error::Tts("vendor unavailable".to_string()))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let session = SessionDir::new(dir.path()).unwrap();
    let bank = QuestionBank::parse(BANK).unwrap();
    let cleared = Arc::new(AtomicUsize::new(0));

    let mut orchestrator = Orchestrator::new(
        Language::English,
        bank,
        session.clone(),
        Collaborators {
            input: Box::new(ScriptedInput {
                turns: VecDeque::from([b"audio".to_vec()]),
                cleared: Arc::clone(&cleared),
            }),
            stt: Box::new(ScriptedStt {
                texts: std::sync::Mutex::new(VecDeque::from([
                    "question 1 what does clipped mean".to_string(),
                ])),
            }),
            tts: Box::new(FailingTts),
            completer: Arc::new(StaticComplete::new("Start with the context.")),
            search: None,
        },
    )
    .unwrap();

    // Synthesis failure is logged and dropped; the turn still persists,
    // signals, and clears the input
    assert_eq!(orchestrator.run_turn().await.unwrap(), TurnOutcome::Continue);

    assert!(!session.reply_audio_path().exists());
    assert_eq!(orchestrator.chat_history().len(), 2);
    assert_eq!(orchestrator.chat_history()[1].text, "Start with the context.");
    assert!(session.processing_complete().is_raised());
    assert_eq!(cleared.load(Ordering::SeqCst), 1);

    let transcript = std::fs::read_to_string(session.transcript_path()).unwrap();
    assert!(transcript.contains("Tutor: Start with the context."));
}

#[tokio::test]
async fn test_run_recovers_from_a_failed_turn() {
    /// Input source that fails once before yielding a final turn
    struct FlakyInput {
        responses: VecDeque<Result<Vec<u8>>>,
        cleared: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl InputSource for FlakyInput {
        async fn next_turn(&mut self) -> Result<Vec<u8>> {
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(Error::Session("input script exhausted".to_string())))
        }

        fn clear(&mut self) -> Result<()> {
            self.cleared.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let session = SessionDir::new(dir.path()).unwrap();
    let bank = QuestionBank::parse(BANK).unwrap();
    let cleared = Arc::new(AtomicUsize::new(0));

    let orchestrator = Orchestrator::new(
        Language::English,
        bank,
        session.clone(),
        Collaborators {
            input: Box::new(FlakyInput {
                responses: VecDeque::from([
                    Err(Error::Session("watch failed".to_string())),
                    Ok(b"audio".to_vec()),
                ]),
                cleared: Arc::clone(&cleared),
            }),
            stt: Box::new(ScriptedStt {
                texts: std::sync::Mutex::new(VecDeque::from(["goodbye".to_string()])),
            }),
            tts: Box::new(NullTts),
            completer: Arc::new(StaticComplete::new("unused")),
            search: None,
        },
    )
    .unwrap();

    // The failed turn is recovered in-loop (signal raised, input cleared)
    // and the following farewell turn still terminates the session cleanly
    orchestrator.run().await.unwrap();

    assert!(session.conversation_complete().is_raised());
    assert!(session.processing_complete().is_raised());
    assert_eq!(cleared.load(Ordering::SeqCst), 1);
}
