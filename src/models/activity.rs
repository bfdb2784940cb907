// src/models/activity.rs

use serde::{Deserialize, Serialize};

/// Which kind of attempt an activity accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Quiz,
    Text,
    File,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Quiz => "quiz",
            ActivityKind::Text => "text",
            ActivityKind::File => "file",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "quiz" => Some(ActivityKind::Quiz),
            "text" => Some(ActivityKind::Text),
            "file" => Some(ActivityKind::File),
            _ => None,
        }
    }
}

/// One selectable answer of a quiz question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub id: i64,
    pub content: String,
    /// Exactly one alternative per question carries this flag.
    #[serde(skip_serializing, default)]
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub statement: String,
    pub alternatives: Vec<Alternative>,
}

impl Question {
    /// Id of the alternative flagged as correct, if the question has one.
    pub fn correct_alternative(&self) -> Option<i64> {
        self.alternatives.iter().find(|a| a.correct).map(|a| a.id)
    }
}

/// Kind-specific grading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActivityConfig {
    Quiz {
        questions: Vec<Question>,
        /// Per-student attempt ceiling; `None` means unlimited.
        max_attempts: Option<u32>,
    },
    Text {
        max_chars: Option<u32>,
    },
    File {
        /// Lowercase extensions without the leading dot. Empty accepts any file.
        allowed_extensions: Vec<String>,
    },
}

/// An assignment definition, read-only to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub topic_id: i64,
    pub title: String,
    pub tags: Vec<String>,
    pub config: ActivityConfig,
}

impl Activity {
    pub fn kind(&self) -> ActivityKind {
        match self.config {
            ActivityConfig::Quiz { .. } => ActivityKind::Quiz,
            ActivityConfig::Text { .. } => ActivityKind::Text,
            ActivityConfig::File { .. } => ActivityKind::File,
        }
    }

    /// Maximum number of attempts one student may create, if bounded.
    /// Text and file activities carry no ceiling today but go through the same check.
    pub fn attempt_ceiling(&self) -> Option<u32> {
        match self.config {
            ActivityConfig::Quiz { max_attempts, .. } => max_attempts,
            ActivityConfig::Text { .. } | ActivityConfig::File { .. } => None,
        }
    }

    /// Whether `file_name` has an extension this activity accepts.
    pub fn accepts_file(&self, file_name: &str) -> bool {
        let ActivityConfig::File { allowed_extensions } = &self.config else {
            return false;
        };
        if allowed_extensions.is_empty() {
            return true;
        }
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_activity(exts: &[&str]) -> Activity {
        Activity {
            id: 1,
            topic_id: 1,
            title: "Essay upload".to_string(),
            tags: vec![],
            config: ActivityConfig::File {
                allowed_extensions: exts.iter().map(|e| e.to_string()).collect(),
            },
        }
    }

    #[test]
    fn test_accepts_file_is_case_insensitive() {
        let activity = file_activity(&["pdf", ".docx"]);
        assert!(activity.accepts_file("report.PDF"));
        assert!(activity.accepts_file("notes.docx"));
        assert!(!activity.accepts_file("script.sh"));
        assert!(!activity.accepts_file("README"));
    }

    #[test]
    fn test_empty_extension_list_accepts_anything() {
        assert!(file_activity(&[]).accepts_file("anything.bin"));
    }

    #[test]
    fn test_only_quiz_has_ceiling() {
        let quiz = Activity {
            id: 2,
            topic_id: 1,
            title: "Limits".to_string(),
            tags: vec![],
            config: ActivityConfig::Quiz {
                questions: vec![],
                max_attempts: Some(3),
            },
        };
        assert_eq!(quiz.attempt_ceiling(), Some(3));
        assert_eq!(file_activity(&[]).attempt_ceiling(), None);
    }
}
