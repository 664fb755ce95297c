//! Resolution state machine
//!
//! A `ResolutionState` is an immutable value. Every transition borrows the current
//! state and returns the next one, or a `TransitionError` that leaves the caller's
//! state untouched. The machine is in exactly one of three phases:
//!
//! - `Active(i)`: placeholder `i` receives sequential input
//! - `Editing(id)`: an answered placeholder is being revised; the cursor is suspended
//! - `Complete`: the cursor is past the last placeholder and nothing is being edited

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::data::Placeholder;

/// Collected answers, keyed by placeholder id
pub type ValueMap = BTreeMap<String, String>;
/// Placeholder ids explicitly left blank
pub type SkipSet = BTreeSet<String>;

/// The phase a resolution state is in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Active(usize),
    Editing(String),
    Complete,
}

/// Errors for transitions that are not legal in the current phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Sequential input was given but every placeholder has been visited
    AlreadyComplete,
    /// The action needs the sequential cursor but an edit is open
    EditInProgress(String),
    /// The action needs an open edit
    NotEditing,
    /// The action named a placeholder other than the one it applies to
    WrongPlaceholder { expected: String, actual: String },
    UnknownPlaceholder(String),
    /// Only placeholders in the answered history can be edited
    NotAnswered(String),
    /// `back` at the first placeholder
    AtStart,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransitionError::AlreadyComplete => write!(f, "All placeholders have been answered"),
            TransitionError::EditInProgress(id) => {
                write!(f, "Finish or cancel the edit of '{}' first", id)
            }
            TransitionError::NotEditing => write!(f, "No placeholder is being edited"),
            TransitionError::WrongPlaceholder { expected, actual } => write!(
                f,
                "Placeholder '{}' is not the current one (expected '{}')",
                actual, expected
            ),
            TransitionError::UnknownPlaceholder(id) => write!(f, "Unknown placeholder '{}'", id),
            TransitionError::NotAnswered(id) => {
                write!(f, "Placeholder '{}' has not been answered yet", id)
            }
            TransitionError::AtStart => write!(f, "Already at the first placeholder"),
        }
    }
}

impl std::error::Error for TransitionError {}

/// An open edit of an answered placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
struct EditDraft {
    id: String,
    /// Uncommitted input; discarded by `cancel`
    input: String,
}

/// Outcome of an answered placeholder, as shown in the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer<'a> {
    Value(&'a str),
    Skipped,
}

/// One answered placeholder in sequence order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry<'a> {
    pub placeholder: &'a Placeholder,
    pub answer: Answer<'a>,
    pub editing: bool,
}

/// Complete navigation and answer state of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionState {
    placeholders: Arc<[Placeholder]>,
    values: ValueMap,
    skipped: SkipSet,
    cursor: usize,
    editing: Option<EditDraft>,
}

impl ResolutionState {
    /// Starts at `Active(0)`, or `Complete` when there is nothing to resolve
    pub fn new(placeholders: Vec<Placeholder>) -> Self {
        Self {
            placeholders: Arc::from(placeholders),
            values: ValueMap::new(),
            skipped: SkipSet::new(),
            cursor: 0,
            editing: None,
        }
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    pub fn skipped(&self) -> &SkipSet {
        &self.skipped
    }

    pub fn value(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    pub fn is_skipped(&self, id: &str) -> bool {
        self.skipped.contains(id)
    }

    /// Sequential position in `[0, N]`
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn editing_id(&self) -> Option<&str> {
        self.editing.as_ref().map(|d| d.id.as_str())
    }

    pub fn phase(&self) -> Phase {
        if let Some(draft) = &self.editing {
            Phase::Editing(draft.id.clone())
        } else if self.cursor < self.placeholders.len() {
            Phase::Active(self.cursor)
        } else {
            Phase::Complete
        }
    }

    pub fn is_complete(&self) -> bool {
        self.editing.is_none() && self.cursor >= self.placeholders.len()
    }

    /// The placeholder under the sequential cursor, ignoring any open edit
    pub fn current(&self) -> Option<&Placeholder> {
        self.placeholders.get(self.cursor)
    }

    /// The placeholder that receives input: the edited one, else the current one
    pub fn active_id(&self) -> Option<&str> {
        match &self.editing {
            Some(draft) => Some(draft.id.as_str()),
            None => self.current().map(|p| p.id.as_str()),
        }
    }

    /// Text to preload into the input box for the active placeholder
    pub fn input(&self) -> &str {
        match &self.editing {
            Some(draft) => &draft.input,
            None => self
                .current()
                .and_then(|p| self.value(&p.id))
                .unwrap_or(""),
        }
    }

    /// `(position, total)` where position is the number of placeholders passed
    pub fn progress(&self) -> (usize, usize) {
        let total = self.placeholders.len();
        (self.cursor.min(total), total)
    }

    /// Answered placeholders (those before the cursor) in sequence order
    pub fn history(&self) -> Vec<HistoryEntry<'_>> {
        let editing = self.editing_id();
        self.placeholders[..self.cursor.min(self.placeholders.len())]
            .iter()
            .map(|placeholder| {
                let answer = if self.is_skipped(&placeholder.id) {
                    Answer::Skipped
                } else {
                    Answer::Value(self.value(&placeholder.id).unwrap_or(""))
                };
                HistoryEntry {
                    placeholder,
                    answer,
                    editing: editing == Some(placeholder.id.as_str()),
                }
            })
            .collect()
    }

    /// Records `value` for the current placeholder and advances the cursor
    pub fn submit(&self, value: impl Into<String>) -> Result<Self, TransitionError> {
        let id = self.sequential_id()?.to_string();
        let mut next = self.clone();
        next.skipped.remove(&id);
        next.values.insert(id, value.into());
        next.cursor += 1;
        Ok(next)
    }

    /// Marks `id` as intentionally blank.
    ///
    /// In `Active(i)` `id` must be the current placeholder and the cursor advances.
    /// In `Editing(id)` the edit closes and the suspended phase resumes.
    pub fn skip(&self, id: &str) -> Result<Self, TransitionError> {
        let mut next = self.clone();
        match &self.editing {
            Some(draft) => {
                expect_id(&draft.id, id)?;
                next.editing = None;
            }
            None => {
                expect_id(self.sequential_id()?, id)?;
                next.cursor += 1;
            }
        }
        next.values.insert(id.to_string(), String::new());
        next.skipped.insert(id.to_string());
        Ok(next)
    }

    /// Opens an edit of an answered placeholder, preloading its recorded value.
    ///
    /// Opening a different edit while one is open replaces the draft.
    pub fn edit(&self, id: &str) -> Result<Self, TransitionError> {
        let index = self.index_of(id)?;
        if index >= self.cursor {
            return Err(TransitionError::NotAnswered(id.to_string()));
        }

        let mut next = self.clone();
        let input = if self.is_skipped(id) {
            String::new()
        } else {
            self.value(id).unwrap_or("").to_string()
        };
        next.editing = Some(EditDraft {
            id: id.to_string(),
            input,
        });
        Ok(next)
    }

    /// Replaces the uncommitted input of the open edit
    pub fn edit_input(&self, value: impl Into<String>) -> Result<Self, TransitionError> {
        if self.editing.is_none() {
            return Err(TransitionError::NotEditing);
        }
        let mut next = self.clone();
        if let Some(draft) = next.editing.as_mut() {
            draft.input = value.into();
        }
        Ok(next)
    }

    /// Commits `value` for the edited placeholder and closes the edit
    pub fn update(&self, id: &str, value: impl Into<String>) -> Result<Self, TransitionError> {
        let draft = self.editing.as_ref().ok_or(TransitionError::NotEditing)?;
        expect_id(&draft.id, id)?;

        let mut next = self.clone();
        next.values.insert(id.to_string(), value.into());
        next.skipped.remove(id);
        next.editing = None;
        Ok(next)
    }

    /// Closes the edit without touching recorded values
    pub fn cancel(&self) -> Result<Self, TransitionError> {
        if self.editing.is_none() {
            return Err(TransitionError::NotEditing);
        }
        let mut next = self.clone();
        next.editing = None;
        Ok(next)
    }

    /// Moves the cursor back one placeholder, keeping its recorded value
    pub fn back(&self) -> Result<Self, TransitionError> {
        if let Some(draft) = &self.editing {
            return Err(TransitionError::EditInProgress(draft.id.clone()));
        }
        if self.cursor == 0 {
            return Err(TransitionError::AtStart);
        }
        let mut next = self.clone();
        next.cursor = self.cursor.min(self.placeholders.len()) - 1;
        Ok(next)
    }

    /// Records in-progress input for the current placeholder without advancing
    pub fn live_update(&self, value: impl Into<String>) -> Result<Self, TransitionError> {
        let id = self.sequential_id()?.to_string();
        let mut next = self.clone();
        next.values.insert(id, value.into());
        Ok(next)
    }

    /// The current placeholder id, for actions that need sequential input
    fn sequential_id(&self) -> Result<&str, TransitionError> {
        if let Some(draft) = &self.editing {
            return Err(TransitionError::EditInProgress(draft.id.clone()));
        }
        self.current()
            .map(|p| p.id.as_str())
            .ok_or(TransitionError::AlreadyComplete)
    }

    fn index_of(&self, id: &str) -> Result<usize, TransitionError> {
        self.placeholders
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| TransitionError::UnknownPlaceholder(id.to_string()))
    }
}

fn expect_id(expected: &str, actual: &str) -> Result<(), TransitionError> {
    if expected == actual {
        Ok(())
    } else {
        Err(TransitionError::WrongPlaceholder {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}
