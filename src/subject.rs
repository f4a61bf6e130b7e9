//! Subject context for a Q&A session.
//!
//! Picked once at startup and never changed afterwards; every answer dispatch
//! receives it explicitly so no global state is involved.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Closed set of subjects a session can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Mathematics,
    Physics,
    Chemistry,
    Biology,
    ComputerScience,
    History,
    EnglishLiterature,
    Geography,
    Economics,
    Psychology,
    General,
}

impl Subject {
    /// Human-readable name used in prompts and UI output.
    pub fn label(self) -> &'static str {
        match self {
            Subject::Mathematics => "Mathematics",
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
            Subject::Biology => "Biology",
            Subject::ComputerScience => "Computer Science",
            Subject::History => "History",
            Subject::EnglishLiterature => "English Literature",
            Subject::Geography => "Geography",
            Subject::Economics => "Economics",
            Subject::Psychology => "Psychology",
            Subject::General => "General",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_human_readable() {
        assert_eq!(Subject::ComputerScience.label(), "Computer Science");
        assert_eq!(Subject::General.label(), "General");
    }

    #[test]
    fn subject_parses_from_cli_value() {
        let parsed = Subject::from_str("computer-science", true);
        assert_eq!(parsed, Ok(Subject::ComputerScience));
    }
}
