//! Question bank loading and spoken-number resolution
//!
//! The bank is a delimited text resource loaded once at process start and
//! read-only for the session lifetime. Records are separated by `%%` lines
//! and fields within a record by `--` lines. A record carries four or five
//! fields positionally: context, question, options, answer explanation, and
//! an optional sub-category. Malformed records are fatal at load time.

use std::path::Path;

use crate::{Error, Result};

/// Highest index recognizable from speech (digit or English number word)
pub const MAX_SPOKEN_INDEX: usize = 20;

/// A single SAT Reading/Writing question record
#[derive(Debug, Clone)]
pub struct Question {
    /// Passage the question refers to
    pub context: String,
    /// The question text itself
    pub prompt: String,
    /// Answer choices, one per line
    pub options: String,
    /// Correct answer with explanation
    pub answer_explanation: String,
    /// Pre-baked pedagogical sub-category; when absent the classifier runs
    pub sub_category: Option<String>,
}

/// Ordered, read-only collection of question records
///
/// Spoken index `i` (1-based) maps to record `i-1`.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Load a bank from a delimited text file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or any record is malformed
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Bank(format!("cannot read {}: {e}", path.display())))?;
        let bank = Self::parse(&text)?;
        tracing::info!(
            path = %path.display(),
            questions = bank.len(),
            "question bank loaded"
        );
        Ok(bank)
    }

    /// Parse bank text into records
    ///
    /// # Errors
    ///
    /// Returns error if the bank is empty or a record does not carry
    /// exactly four or five fields
    pub fn parse(text: &str) -> Result<Self> {
        let mut questions = Vec::new();

        for (i, record) in split_on_marker(text, "%%").into_iter().enumerate() {
            if record.trim().is_empty() {
                continue;
            }

            let fields: Vec<String> = split_on_marker(&record, "--")
                .into_iter()
                .map(|f| f.trim().to_string())
                .collect();

            let (context, prompt, options, answer_explanation, sub_category) =
                match fields.as_slice() {
                    [c, q, o, a] => (c.clone(), q.clone(), o.clone(), a.clone(), None),
                    [c, q, o, a, s] => {
                        let sub = if s.is_empty() { None } else { Some(s.to_lowercase()) };
                        (c.clone(), q.clone(), o.clone(), a.clone(), sub)
                    }
                    _ => {
                        return Err(Error::Bank(format!(
                            "record {} has {} fields, expected 4 or 5",
                            i + 1,
                            fields.len()
                        )));
                    }
                };

            if prompt.is_empty() {
                return Err(Error::Bank(format!("record {} has an empty question", i + 1)));
            }

            questions.push(Question {
                context,
                prompt,
                options,
                answer_explanation,
                sub_category,
            });
        }

        if questions.is_empty() {
            return Err(Error::Bank("bank contains no questions".to_string()));
        }

        Ok(Self { questions })
    }

    /// Fetch a record by its 1-based spoken index
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        index.checked_sub(1).and_then(|i| self.questions.get(i))
    }

    /// Number of records in the bank
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// True if the bank has no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Split text on lines consisting solely of the given marker
fn split_on_marker(text: &str, marker: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    for line in text.lines() {
        if line.trim() == marker {
            parts.push(String::new());
        } else if let Some(current) = parts.last_mut() {
            current.push_str(line);
            current.push('\n');
        }
    }
    parts
}

/// English word spelling for a spoken index
#[must_use]
pub const fn number_word(n: usize) -> Option<&'static str> {
    let word = match n {
        1 => "one",
        2 => "two",
        3 => "three",
        4 => "four",
        5 => "five",
        6 => "six",
        7 => "seven",
        8 => "eight",
        9 => "nine",
        10 => "ten",
        11 => "eleven",
        12 => "twelve",
        13 => "thirteen",
        14 => "fourteen",
        15 => "fifteen",
        16 => "sixteen",
        17 => "seventeen",
        18 => "eighteen",
        19 => "nineteen",
        20 => "twenty",
        _ => return None,
    };
    Some(word)
}

/// Detect a spoken question number in transcribed text
///
/// Scans candidate indices in descending order from `bank_size` (capped at
/// [`MAX_SPOKEN_INDEX`]) down to 1, matching either the digit string or the
/// English number word, case-insensitively. Descending order is deliberate:
/// it keeps "question 15" from resolving to 1 via the digit prefix. First
/// match wins.
#[must_use]
pub fn detect_question_number(text: &str, bank_size: usize) -> Option<usize> {
    let lower = text.to_lowercase();
    for i in (1..=bank_size.min(MAX_SPOKEN_INDEX)).rev() {
        let digit_match = lower.contains(&i.to_string());
        let word_match = number_word(i).is_some_and(|w| lower.contains(w));
        if digit_match || word_match {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Passage one text.
--
Question one text?
--
A) Alpha
B) Beta
--
The answer is B.
--
vocabulary
%%
Passage two text.
--
Question two text?
--
A) Gamma
B) Delta
--
The answer is A.
";

    #[test]
    fn parses_five_and_four_field_records() {
        let bank = QuestionBank::parse(SAMPLE).unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.get(1).unwrap().sub_category.as_deref(), Some("vocabulary"));
        assert!(bank.get(2).unwrap().sub_category.is_none());
    }

    #[test]
    fn index_is_one_based() {
        let bank = QuestionBank::parse(SAMPLE).unwrap();
        assert_eq!(bank.get(1).unwrap().prompt, "Question one text?");
        assert!(bank.get(0).is_none());
        assert!(bank.get(3).is_none());
    }

    #[test]
    fn sub_category_is_lowercased() {
        let text = "c\n--\nq\n--\no\n--\na\n--\nVocabulary\n";
        let bank = QuestionBank::parse(text).unwrap();
        assert_eq!(bank.get(1).unwrap().sub_category.as_deref(), Some("vocabulary"));
    }

    #[test]
    fn malformed_record_is_fatal() {
        let err = QuestionBank::parse("only one field").unwrap_err();
        assert!(matches!(err, Error::Bank(_)));
    }

    #[test]
    fn empty_bank_is_fatal() {
        assert!(matches!(QuestionBank::parse("").unwrap_err(), Error::Bank(_)));
    }

    #[test]
    fn detects_digit_and_word() {
        assert_eq!(detect_question_number("let's do question 3", 10), Some(3));
        assert_eq!(detect_question_number("let's do question five", 10), Some(5));
        assert_eq!(detect_question_number("Question FIVE please", 10), Some(5));
    }

    #[test]
    fn descending_scan_prefers_larger_index() {
        // Ascending would match "1" inside "15"
        assert_eq!(detect_question_number("question 15", 20), Some(15));
        assert_eq!(detect_question_number("question twelve", 20), Some(12));
    }

    #[test]
    fn no_number_yields_none() {
        assert_eq!(detect_question_number("what does clipped mean", 10), None);
    }

    #[test]
    fn scan_is_bounded_by_bank_size() {
        assert_eq!(detect_question_number("question 9", 5), None);
        assert_eq!(detect_question_number("question 4", 5), Some(4));
    }
}
