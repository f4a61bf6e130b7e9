//! Lexical question detection over transcript snippets.
//!
//! Runs on every snippet the transcript source emits, so detection has to be
//! cheap and synchronous: ordered regex heuristics plus a normalization pass.
//! The normalized text doubles as the dedup key downstream. Mid-sentence
//! question fragments that miss every lead-in are a documented false negative.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Snippets shorter than this after trimming never match.
const MIN_SNIPPET_CHARS: usize = 3;

/// Question category derived from the normalized lead-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    What,
    When,
    Where,
    Who,
    Which,
    Why,
    How,
    YesNo,
    Explanation,
    Calculation,
    Other,
}

impl QuestionKind {
    pub fn label(self) -> &'static str {
        match self {
            QuestionKind::What => "what",
            QuestionKind::When => "when",
            QuestionKind::Where => "where",
            QuestionKind::Who => "who",
            QuestionKind::Which => "which",
            QuestionKind::Why => "why",
            QuestionKind::How => "how",
            QuestionKind::YesNo => "yes/no",
            QuestionKind::Explanation => "explanation",
            QuestionKind::Calculation => "calculation",
            QuestionKind::Other => "other",
        }
    }
}

/// A question pulled out of a snippet, normalized for dedup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedQuestion {
    pub text: String,
    pub kind: QuestionKind,
}

/// Detects questions with a fixed, ordered set of lexical heuristics.
/// No model call, no I/O.
#[derive(Debug, Default)]
pub struct QuestionDetector;

impl QuestionDetector {
    pub fn new() -> Self {
        Self
    }

    /// Check a single snippet. Returns the normalized question when a
    /// heuristic matches: trailing question mark first, then interrogative,
    /// auxiliary, or command-like lead-ins.
    pub fn detect(&self, snippet: &str) -> Option<DetectedQuestion> {
        let trimmed = snippet.trim();
        if trimmed.chars().count() < MIN_SNIPPET_CHARS {
            return None;
        }
        if !trimmed.ends_with('?') && !lead_in_regex().is_match(trimmed) {
            return None;
        }
        let text = normalize(trimmed);
        if text.is_empty() {
            return None;
        }
        let kind = classify(&text);
        Some(DetectedQuestion { text, kind })
    }

    /// Pull every question out of a snippet that may span multiple sentences.
    /// Sentences keep their terminal punctuation so a trailing `?` still
    /// counts toward detection.
    pub fn extract(&self, snippet: &str) -> Vec<DetectedQuestion> {
        sentence_regex()
            .find_iter(snippet)
            .filter_map(|m| self.detect(m.as_str()))
            .collect()
    }
}

/// Lowercase, collapse whitespace, strip trailing punctuation runs.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(&['?', '!', '.', ','][..])
        .trim_end()
        .to_string()
}

fn classify(normalized: &str) -> QuestionKind {
    let first = normalized.split_whitespace().next().unwrap_or("");
    match first {
        "what" => QuestionKind::What,
        "when" => QuestionKind::When,
        "where" => QuestionKind::Where,
        "who" | "whom" | "whose" => QuestionKind::Who,
        "which" => QuestionKind::Which,
        "why" => QuestionKind::Why,
        "how" => QuestionKind::How,
        "tell" | "explain" | "describe" | "define" => QuestionKind::Explanation,
        "calculate" | "solve" | "compute" => QuestionKind::Calculation,
        _ if AUXILIARIES.contains(&first) => QuestionKind::YesNo,
        _ => QuestionKind::Other,
    }
}

const AUXILIARIES: &[&str] = &[
    "is", "are", "was", "were", "do", "does", "did", "can", "could", "will", "would", "should",
    "shall", "may", "might", "must", "am", "has", "have", "had",
];

fn lead_in_regex() -> &'static Regex {
    static LEAD_IN_RE: OnceLock<Regex> = OnceLock::new();
    LEAD_IN_RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:what|when|where|who(?:m|se)?|which|why|how|is|are|was|were|do(?:es)?|did|can|could|will|would|should|shall|may|might|must|am|has|have|had|tell me|explain|describe|define|calculate|solve)\b",
        )
        .expect("lead-in regex should compile")
    })
}

fn sentence_regex() -> &'static Regex {
    static SENTENCE_RE: OnceLock<Regex> = OnceLock::new();
    // Each match is one sentence including its terminal punctuation run.
    SENTENCE_RE
        .get_or_init(|| Regex::new(r"[^.!?]+[.!?]*").expect("sentence regex should compile"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> Option<DetectedQuestion> {
        QuestionDetector::new().detect(text)
    }

    #[test]
    fn interrogative_lead_in_is_detected_and_normalized() {
        let question = detect("what is the capital of France").expect("should detect");
        assert_eq!(question.text, "what is the capital of france");
        assert_eq!(question.kind, QuestionKind::What);
    }

    #[test]
    fn statements_are_not_questions() {
        assert_eq!(detect("the sky is blue today"), None);
        assert_eq!(detect("he went home after lunch"), None);
    }

    #[test]
    fn trailing_question_mark_always_counts() {
        let question = detect("you saw the eclipse?").expect("should detect");
        assert_eq!(question.text, "you saw the eclipse");
        assert_eq!(question.kind, QuestionKind::Other);
    }

    #[test]
    fn empty_and_tiny_snippets_never_match() {
        assert_eq!(detect(""), None);
        assert_eq!(detect("   "), None);
        assert_eq!(detect("a?"), None);
    }

    #[test]
    fn auxiliary_lead_in_classifies_as_yes_no() {
        let question = detect("is photosynthesis endothermic").expect("should detect");
        assert_eq!(question.kind, QuestionKind::YesNo);
    }

    #[test]
    fn command_lead_ins_classify_by_intent() {
        assert_eq!(
            detect("explain the water cycle").map(|q| q.kind),
            Some(QuestionKind::Explanation)
        );
        assert_eq!(
            detect("solve x squared equals nine").map(|q| q.kind),
            Some(QuestionKind::Calculation)
        );
    }

    #[test]
    fn normalization_collapses_whitespace_and_punctuation() {
        assert_eq!(normalize("  How   do Plants\tGrow??  "), "how do plants grow");
        assert_eq!(normalize("WHY?!"), "why");
    }

    #[test]
    fn extract_finds_questions_inside_longer_snippets() {
        let detector = QuestionDetector::new();
        let found =
            detector.extract("we covered cells today. what is mitosis? then we went to lunch.");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "what is mitosis");
    }

    #[test]
    fn extract_keeps_question_order() {
        let detector = QuestionDetector::new();
        let found = detector.extract("what is gravity? how do magnets work?");
        let texts: Vec<_> = found.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, ["what is gravity", "how do magnets work"]);
    }

    #[test]
    fn mid_sentence_fragment_without_lead_in_is_a_false_negative() {
        // Known limitation: the fragment never starts a sentence, so no rule fires.
        let detector = QuestionDetector::new();
        assert!(detector
            .extract("I wonder sometimes about whether light bends")
            .is_empty());
    }

    #[test]
    fn lead_in_requires_word_boundary() {
        assert_eq!(detect("iston was a greek city"), None);
        assert_eq!(detect("doodles cover the page"), None);
    }
}
