//! Question cards and answer matching
//!
//! Each tile carries one question card: the question text plus the set of
//! accepted answers. Cards travel in a compact `|`-delimited wire form
//! (`"text|answer1|answer2"`). Answer matching is diacritic-insensitive:
//! both sides are Unicode-decomposed, stripped of combining marks, trimmed
//! and lowercased before an exact comparison, so "Řím" matches "rim".

use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::constants::answer_text::DELIMITER;

/// Errors produced when parsing a delimited question card
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The delimited form has no question text
    #[error("question text is empty")]
    EmptyQuestion,
    /// The delimited form lists no accepted answers
    #[error("question has no accepted answers")]
    NoAnswers,
}

/// One question with its accepted answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCard {
    /// The question text shown to the player on turn
    text: String,
    /// Accepted answers, matched after normalization
    answers: Vec<String>,
}

impl QuestionCard {
    /// Creates a card from question text and accepted answers
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyQuestion`] or [`Error::NoAnswers`] when either
    /// part is missing.
    pub fn new(text: impl Into<String>, answers: Vec<String>) -> Result<Self, Error> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::EmptyQuestion);
        }
        if answers.is_empty() {
            return Err(Error::NoAnswers);
        }
        Ok(Self { text, answers })
    }

    /// Parses the `"text|answer1|answer2"` wire form
    ///
    /// # Errors
    ///
    /// Returns an error when the text or the answer list is empty.
    pub fn from_delimited(serialized: &str) -> Result<Self, Error> {
        let mut parts = serialized.split(DELIMITER);
        let text = parts.next().unwrap_or_default().to_owned();
        let answers: Vec<String> = parts.map(str::to_owned).collect();
        Self::new(text, answers)
    }

    /// Renders the card back into its delimited wire form
    pub fn to_delimited(&self) -> String {
        let mut out = self.text.clone();
        for answer in &self.answers {
            out.push(DELIMITER);
            out.push_str(answer);
        }
        out
    }

    /// The question text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The accepted answers as authored
    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// Whether a submission matches any accepted answer
    ///
    /// An absent submission is always wrong; a present one is compared in
    /// normalized form against every accepted answer.
    pub fn matches(&self, submission: Option<&str>) -> bool {
        let Some(submission) = submission else {
            return false;
        };
        let submitted = normalize(submission);
        self.answers.iter().any(|a| normalize(a) == submitted)
    }
}

/// Folds an answer into its canonical comparison form
///
/// NFD-decomposes, drops combining marks, trims surrounding whitespace and
/// lowercases. Applying it twice yields the same result as once.
pub fn normalize(answer: &str) -> String {
    answer
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_diacritics() {
        assert_eq!(normalize("Řím"), "rim");
        assert_eq!(normalize("Sněžka"), "snezka");
        assert_eq!(normalize("  Paříž  "), "pariz");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in ["Řím", "  Boční Čára ", "plain", "Tučňák"] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_matches_accepts_any_listed_answer() {
        let card = QuestionCard::new(
            "Nejvyšší hora světa",
            vec!["Mount Everest".to_owned(), "Everest".to_owned()],
        )
        .unwrap();

        assert!(card.matches(Some("everest")));
        assert!(card.matches(Some(" MOUNT EVEREST ")));
        assert!(!card.matches(Some("K2")));
    }

    #[test]
    fn test_matches_is_diacritic_insensitive() {
        let card = QuestionCard::new("Hlavní město Itálie", vec!["Řím".to_owned()]).unwrap();
        assert!(card.matches(Some("rim")));
        assert!(card.matches(Some("Řím")));
    }

    #[test]
    fn test_absent_answer_never_matches() {
        let card = QuestionCard::new("q", vec!["a".to_owned()]).unwrap();
        assert!(!card.matches(None));
    }

    #[test]
    fn test_delimited_round_trip() {
        let card = QuestionCard::from_delimited("Hlavní město Francie|Paříž").unwrap();
        assert_eq!(card.text(), "Hlavní město Francie");
        assert_eq!(card.answers(), ["Paříž"]);
        assert_eq!(card.to_delimited(), "Hlavní město Francie|Paříž");
    }

    #[test]
    fn test_delimited_rejects_missing_parts() {
        assert_eq!(
            QuestionCard::from_delimited("|answer"),
            Err(Error::EmptyQuestion)
        );
        assert_eq!(QuestionCard::from_delimited("question"), Err(Error::NoAnswers));
    }
}
