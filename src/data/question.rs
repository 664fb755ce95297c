use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::placeholder::Placeholder;

/// A natural-language prompt for one placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub line_num: usize,
    pub question: String,
}

/// Reasons a generated question list does not line up with the placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignmentError {
    Duplicate(String),
    Unknown(String),
    Missing(Vec<String>),
}

impl fmt::Display for AlignmentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlignmentError::Duplicate(id) => write!(f, "question for '{}' appears twice", id),
            AlignmentError::Unknown(id) => write!(f, "question for unknown placeholder '{}'", id),
            AlignmentError::Missing(ids) => write!(f, "no question for {}", ids.join(", ")),
        }
    }
}

impl std::error::Error for AlignmentError {}

/// Questions aligned 1:1 with a placeholder list, in placeholder order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub questions: Vec<Question>,
}

impl QuestionSet {
    /// One question per placeholder whose text is the placeholder's label
    pub fn fallback(placeholders: &[Placeholder]) -> Self {
        Self {
            questions: placeholders
                .iter()
                .map(|p| Question {
                    id: p.id.clone(),
                    line_num: p.line_num,
                    question: p.label.clone(),
                })
                .collect(),
        }
    }

    /// Aligns generated `(id, question)` pairs with `placeholders`.
    ///
    /// The id sets must be equal. The result follows placeholder order and takes
    /// `line_num` from the placeholders; a blank question text falls back to the
    /// placeholder's label.
    pub fn align<I>(placeholders: &[Placeholder], generated: I) -> Result<Self, AlignmentError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let known: HashSet<&str> = placeholders.iter().map(|p| p.id.as_str()).collect();
        let mut by_id: HashMap<String, String> = HashMap::new();

        for (id, question) in generated {
            if !known.contains(id.as_str()) {
                return Err(AlignmentError::Unknown(id));
            }
            if by_id.contains_key(&id) {
                return Err(AlignmentError::Duplicate(id));
            }
            by_id.insert(id, question);
        }

        let missing: Vec<String> = placeholders
            .iter()
            .filter(|p| !by_id.contains_key(&p.id))
            .map(|p| p.id.clone())
            .collect();
        if !missing.is_empty() {
            return Err(AlignmentError::Missing(missing));
        }

        let questions = placeholders
            .iter()
            .map(|p| {
                let text = by_id.remove(&p.id).unwrap_or_default();
                let question = if text.trim().is_empty() {
                    p.label.clone()
                } else {
                    text.trim().to_string()
                };
                Question {
                    id: p.id.clone(),
                    line_num: p.line_num,
                    question,
                }
            })
            .collect();

        Ok(Self { questions })
    }

    pub fn question_for(&self, id: &str) -> Option<&str> {
        self.questions
            .iter()
            .find(|q| q.id == id)
            .map(|q| q.question.as_str())
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }
}
