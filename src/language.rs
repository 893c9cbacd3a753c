//! Session language handling
//!
//! The session language is fixed at start. It drives farewell detection,
//! the localized fixed replies, and the STT/TTS locale selection.

use std::fmt;

/// Supported session languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Language {
    /// English (default)
    #[default]
    English,
    /// Spanish
    Spanish,
    /// French
    French,
    /// Hindi
    Hindi,
    /// Italian
    Italian,
}

/// Exit keywords recognized in every session regardless of language
const ENGLISH_FAREWELLS: &[&str] = &["bye", "thank", "goodbye", "quit"];

impl Language {
    /// ISO 639-1 code used by transcription providers
    #[must_use]
    pub const fn iso639(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Spanish => "es",
            Self::French => "fr",
            Self::Hindi => "hi",
            Self::Italian => "it",
        }
    }

    /// BCP-47 locale tag used in Azure SSML requests
    #[must_use]
    pub const fn bcp47(self) -> &'static str {
        match self {
            Self::English => "en-US",
            Self::Spanish => "es-ES",
            Self::French => "fr-FR",
            Self::Hindi => "hi-IN",
            Self::Italian => "it-IT",
        }
    }

    /// Exit keywords for farewell detection
    ///
    /// The English set always applies; non-English sessions add localized
    /// equivalents on top of it.
    #[must_use]
    pub const fn farewell_keywords(self) -> &'static [&'static str] {
        match self {
            Self::English => ENGLISH_FAREWELLS,
            Self::Spanish => &[
                "bye", "thank", "goodbye", "quit", "adiós", "adios", "gracias", "hasta luego",
            ],
            Self::French => &["bye", "thank", "goodbye", "quit", "au revoir", "merci", "adieu"],
            Self::Hindi => &[
                "bye",
                "thank",
                "goodbye",
                "quit",
                "अलविदा",
                "धन्यवाद",
                "शुक्रिया",
            ],
            Self::Italian => &[
                "bye",
                "thank",
                "goodbye",
                "quit",
                "arrivederci",
                "grazie",
                "addio",
            ],
        }
    }

    /// Fixed localized reply emitted on the farewell turn
    #[must_use]
    pub const fn farewell_reply(self) -> &'static str {
        match self {
            Self::English => "Happy to help",
            Self::Spanish => "Feliz de ayudar",
            Self::French => "Ravi de vous aider",
            Self::Hindi => "आपकी मदद करके खुशी हुई",
            Self::Italian => "Felice di aiutare",
        }
    }

    /// Fixed localized prompt asking for the question number
    #[must_use]
    pub const fn clarification_prompt(self) -> &'static str {
        match self {
            Self::English => "Can you specify the question number?",
            Self::Spanish => "¿Puedes especificar el número de la pregunta?",
            Self::French => "Pouvez-vous préciser le numéro de la question ?",
            Self::Hindi => "कृपया प्रश्न संख्या बताएं",
            Self::Italian => "Puoi specificare il numero della domanda?",
        }
    }

    /// True if the transcribed text contains an exit keyword for this language
    ///
    /// Matching is case-insensitive substring containment, so "Thanks, BYE
    /// now" terminates an English session.
    #[must_use]
    pub fn is_farewell(self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.farewell_keywords().iter().any(|kw| lower.contains(kw))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::English => "English",
            Self::Spanish => "Spanish",
            Self::French => "French",
            Self::Hindi => "Hindi",
            Self::Italian => "Italian",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn farewell_is_case_insensitive() {
        assert!(Language::English.is_farewell("Thanks, BYE now"));
        assert!(Language::English.is_farewell("GOODBYE"));
        assert!(!Language::English.is_farewell("what does clipped mean"));
    }

    #[test]
    fn localized_sessions_keep_english_keywords() {
        assert!(Language::Spanish.is_farewell("ok bye"));
        assert!(Language::Spanish.is_farewell("muchas gracias"));
        assert!(Language::Hindi.is_farewell("धन्यवाद"));
    }

    #[test]
    fn empty_text_is_not_a_farewell() {
        assert!(!Language::French.is_farewell(""));
    }

    #[test]
    fn locale_tags() {
        assert_eq!(Language::English.iso639(), "en");
        assert_eq!(Language::Italian.bcp47(), "it-IT");
    }
}
