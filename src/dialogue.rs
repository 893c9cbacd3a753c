//! Dialogue template registry
//!
//! A fixed mapping from sub-category key to a specialized Socratic tutoring
//! prompt. Each entry fills the structured slots (context, question, options,
//! answer explanation, chat history, language) into a system instruction and
//! sends the student's turn to the completion model.
//!
//! Dispatch keys arrive as free-form model output or bank text, not a closed
//! enum, so resolution is fuzzy: exact match first, then substring
//! containment in either direction. Fuzzy fallbacks are logged so silent
//! misrouting stays observable.

use std::sync::Arc;

use crate::bank::Question;
use crate::completion::Complete;
use crate::language::Language;
use crate::{Error, Result};

/// Shared tutoring persona prefix applied to every template
const PERSONA_PREAMBLE: &str = "You are an experienced SAT tutor. Guide students through \
questions without providing direct answers, helping them develop critical thinking skills. \
Keep responses concise, within 2-3 sentences maximum. Maintain a friendly tone, be aware of \
previous exchanges, and avoid repeating information the student has already provided. If the \
student gives a correct answer, congratulate them with a very short explanation.";

/// One registry entry: dispatch key plus category-specific strategy
struct TemplateEntry {
    key: &'static str,
    strategy: &'static str,
}

/// The fixed template table, one entry per pedagogical sub-category
const TEMPLATES: &[TemplateEntry] = &[
    TemplateEntry {
        key: "vocabulary",
        strategy: "You specialize in vocabulary questions. Ask the student to identify the \
context in which the word is used, then what they think the word means based on that context. \
When evaluating answer choices, have the student eliminate options one at a time, briefly \
explaining why an elimination is right or wrong.",
    },
    TemplateEntry {
        key: "purpose",
        strategy: "You specialize in purpose questions. Briefly highlight the question type and \
the passage's main idea, then ask for the student's initial thoughts on why the author wrote \
it. Guide elimination of choices that describe details rather than the overall purpose.",
    },
    TemplateEntry {
        key: "connection",
        strategy: "You specialize in connection questions. Ask the student how the two parts of \
the text relate, then guide them to test each answer choice against that relationship.",
    },
    TemplateEntry {
        key: "main ideas",
        strategy: "You specialize in main idea questions. Ask the student to summarize the \
passage in their own words before looking at the choices, then compare each choice against \
their summary, eliminating choices that are too narrow or too broad.",
    },
    TemplateEntry {
        key: "detail",
        strategy: "You specialize in detail questions. Direct the student back to the specific \
part of the passage the question targets and ask what it literally states, then match choices \
against the text, eliminating anything unsupported.",
    },
    TemplateEntry {
        key: "textual evidence",
        strategy: "You specialize in textual evidence questions. Ask the student what claim the \
question asks them to support, then have them test which quotation actually supports that \
claim rather than merely mentioning the same topic.",
    },
    TemplateEntry {
        key: "quantitative evidence",
        strategy: "You specialize in quantitative evidence questions. Ask the student to read \
the graph or table first and state what it shows, then check each choice against the data and \
the claim in the passage.",
    },
    TemplateEntry {
        key: "inference",
        strategy: "You specialize in inference questions. Remind the student the answer must be \
supported by the text even though it is not stated directly. Ask what the passage implies, \
then eliminate choices that go beyond what the text can support.",
    },
    TemplateEntry {
        key: "synthesis",
        strategy: "You specialize in synthesis questions. Ask the student what goal the question \
states, then have them test each choice against the bulleted notes, keeping only the one that \
accomplishes the stated goal.",
    },
    TemplateEntry {
        key: "transition",
        strategy: "You specialize in transition questions. Ask the student to describe the \
relationship between the sentence before and after the blank (contrast, continuation, cause), \
then match that relationship to the transition word choices.",
    },
    TemplateEntry {
        key: "standard english conventions",
        strategy: "You specialize in Standard English Conventions questions. Ask the student to \
identify what grammatical element the choices vary on (punctuation, verb form, agreement), \
then guide them to the convention that applies and have them eliminate choices violating it.",
    },
];

/// Structured tutoring context handed to a dialogue handler each turn
#[derive(Debug, Clone, Copy)]
pub struct TutorContext<'a> {
    /// The resolved question record
    pub question: &'a Question,
    /// Accumulated chat history rendered as `Speaker: text` lines
    pub chat_history: &'a str,
    /// Session language
    pub language: Language,
    /// The student's current transcribed turn
    pub student_input: &'a str,
}

/// Registry resolving sub-category keys to dialogue handlers
pub struct DialogueRegistry {
    completer: Arc<dyn Complete>,
}

impl DialogueRegistry {
    /// Create a registry backed by the given completion client
    #[must_use]
    pub fn new(completer: Arc<dyn Complete>) -> Self {
        Self { completer }
    }

    /// The fixed set of dispatch keys
    #[must_use]
    pub fn keys() -> Vec<&'static str> {
        TEMPLATES.iter().map(|t| t.key).collect()
    }

    /// Resolve a dispatch key to a handler
    ///
    /// Exact match first, then substring containment in either direction.
    /// Fuzzy fallbacks are logged. Returns `None` when no key matches.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<DialogueHandler> {
        let wanted = key.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        let entry = if let Some(exact) = TEMPLATES.iter().find(|t| t.key == wanted) {
            exact
        } else {
            let fuzzy = TEMPLATES
                .iter()
                .find(|t| t.key.contains(&wanted) || wanted.contains(t.key))?;
            tracing::warn!(
                requested = %wanted,
                matched = %fuzzy.key,
                "dialogue template resolved by partial match"
            );
            fuzzy
        };

        Some(DialogueHandler {
            key: entry.key,
            strategy: entry.strategy,
            completer: Arc::clone(&self.completer),
        })
    }
}

/// A resolved dialogue handler, cached for the session lifetime
pub struct DialogueHandler {
    key: &'static str,
    strategy: &'static str,
    completer: Arc<dyn Complete>,
}

impl DialogueHandler {
    /// The canonical key this handler dispatches on
    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    /// Produce the tutor reply for one turn
    ///
    /// # Errors
    ///
    /// Returns error if the completion call fails; the orchestrator converts
    /// this into a generic apology reply
    pub async fn reply(&self, ctx: &TutorContext<'_>) -> Result<String> {
        let system = self.system_prompt(ctx);
        let reply = self
            .completer
            .complete(&system, ctx.student_input)
            .await
            .map_err(|e| Error::Completion(format!("dialogue handler '{}': {e}", self.key)))?;
        Ok(reply.trim().to_string())
    }

    /// Fill the structured slots into the template's system instruction
    fn system_prompt(&self, ctx: &TutorContext<'_>) -> String {
        format!(
            "{PERSONA_PREAMBLE}\n\n{strategy}\n\n\
Context: {context}\n\
Question: {question}\n\
Options: {options}\n\
Answer and Explanation: {answer_exp}\n\
Chat History: {history}\n\
Language: {language}\n\
Respond in {language}.",
            strategy = self.strategy,
            context = ctx.question.context,
            question = ctx.question.prompt,
            options = ctx.question.options,
            answer_exp = ctx.question.answer_explanation,
            history = ctx.chat_history,
            language = ctx.language,
        )
    }
}
