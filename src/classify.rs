//! Two-stage pedagogical category classification
//!
//! Stage 1 maps free question text to one of four top-level SAT Reading and
//! Writing categories. Stage 2, run for the first three categories only,
//! maps to a fixed sub-category set specific to that top level. The
//! classifier output is free-form model text, so parsing is substring
//! tolerant and unrecognized output degrades to `Unknown` without retry.
//!
//! The classifier is bypassed entirely when the question bank record carries
//! a pre-baked sub-category.

use crate::completion::Complete;

/// Top-level SAT Reading/Writing question category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Information and Ideas
    InformationAndIdeas,
    /// Craft and Structure
    CraftAndStructure,
    /// Expression of Ideas
    ExpressionOfIdeas,
    /// Standard English Conventions (no sub-categories)
    StandardEnglishConventions,
    /// Classifier output did not match any known category
    Unknown,
}

impl Category {
    /// Canonical lower-case label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InformationAndIdeas => "information and ideas",
            Self::CraftAndStructure => "craft and structure",
            Self::ExpressionOfIdeas => "expression of ideas",
            Self::StandardEnglishConventions => "standard english conventions",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a free-form model label into a tagged category
    ///
    /// Substring match on the lower-cased text; labels are model output and
    /// not guaranteed to round-trip exactly.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        let lower = label.to_lowercase();
        if lower.contains("standard") {
            Self::StandardEnglishConventions
        } else if lower.contains("craft") {
            Self::CraftAndStructure
        } else if lower.contains("information") {
            Self::InformationAndIdeas
        } else if lower.contains("expression") {
            Self::ExpressionOfIdeas
        } else {
            Self::Unknown
        }
    }

    /// Fixed sub-category set for this top level, empty where stage 2 does
    /// not apply
    #[must_use]
    pub const fn sub_categories(self) -> &'static [&'static str] {
        match self {
            Self::InformationAndIdeas => &[
                "main ideas",
                "detail",
                "textual evidence",
                "quantitative evidence",
                "inference",
            ],
            Self::CraftAndStructure => &["vocabulary", "purpose", "connection"],
            Self::ExpressionOfIdeas => &["synthesis", "transition"],
            Self::StandardEnglishConventions | Self::Unknown => &[],
        }
    }
}

/// Result of the two-stage classification
#[derive(Debug, Clone)]
pub struct Classification {
    /// Top-level category
    pub category: Category,
    /// Stage-2 sub-category, where one applies
    pub sub_category: Option<String>,
}

impl Classification {
    /// The registry key this classification dispatches on
    ///
    /// Standard English Conventions dispatches on the category itself; the
    /// other categories dispatch on their sub-category.
    #[must_use]
    pub fn dispatch_key(&self) -> Option<String> {
        match self.category {
            Category::StandardEnglishConventions => {
                Some(Category::StandardEnglishConventions.label().to_string())
            }
            Category::Unknown => None,
            _ => self.sub_category.clone(),
        }
    }
}

const STAGE1_SYSTEM: &str = "You are classifying SAT Reading and Writing questions. \
Respond with exactly one of the following category names and nothing else, in lower case: \
information and ideas, craft and structure, expression of ideas, standard english conventions.";

/// Classify a question's pedagogical category from its transcribed text
///
/// Never fails: any vendor error or unrecognized label degrades to
/// `Category::Unknown` with no sub-category.
pub async fn classify_question(completer: &dyn Complete, question: &str) -> Classification {
    let category = match completer.complete(STAGE1_SYSTEM, question).await {
        Ok(label) => {
            let category = Category::parse(&label);
            tracing::info!(label = %label.trim(), category = category.label(), "question categorized");
            category
        }
        Err(e) => {
            tracing::warn!(error = %e, "category classification failed");
            Category::Unknown
        }
    };

    let subs = category.sub_categories();
    if subs.is_empty() {
        return Classification {
            category,
            sub_category: None,
        };
    }

    let stage2_system = format!(
        "You are classifying SAT questions within the '{}' category. \
Respond with exactly one of the following sub-category names and nothing else, in lower case: {}.",
        category.label(),
        subs.join(", ")
    );

    let sub_category = match completer.complete(&stage2_system, question).await {
        Ok(label) => {
            let sub = label.trim().to_lowercase();
            tracing::info!(sub_category = %sub, "question sub-categorized");
            Some(sub)
        }
        Err(e) => {
            tracing::warn!(error = %e, "sub-category classification failed");
            None
        }
    };

    Classification {
        category,
        sub_category,
    }
}
