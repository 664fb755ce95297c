//! Session ownership and asynchronous completion handling
//!
//! A `Workspace` holds at most one live `Session`. Each session gets a fresh
//! `SessionToken`; question-generation results carry the token of the session
//! that asked for them and are dropped when that session is gone.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;

use crate::contexts::assembler::assemble;
use crate::contexts::question_generator::{CompletionClient, GenerationError, QuestionGenerator};
use crate::contexts::renderer::render_preview;
use crate::contexts::resolution::{ResolutionState, TransitionError};
use crate::contexts::upload::{DocumentExtractor, UploadPolicy, ValidationError};
use crate::data::{Document, Extraction, ExtractionError, Placeholder, QuestionSet, Template};

/// Identifies one session for the lifetime of a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(u64);

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Where the session's question texts come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionStatus {
    /// Labels are in use; generation was never requested
    NotRequested,
    /// A generation request is outstanding
    Pending,
    Generated,
    /// Generation failed and labels are in use
    FellBack(GenerationError),
}

/// Errors of workspace operations; none of them ends the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Validation(ValidationError),
    Extraction(ExtractionError),
    NoSession,
    /// A question-generation request is outstanding
    Busy,
    Transition(TransitionError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionError::Validation(e) => write!(f, "{}", e),
            SessionError::Extraction(e) => write!(f, "{}", e),
            SessionError::NoSession => write!(f, "No document has been uploaded"),
            SessionError::Busy => write!(f, "Questions are still being generated"),
            SessionError::Transition(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ValidationError> for SessionError {
    fn from(e: ValidationError) -> Self {
        SessionError::Validation(e)
    }
}

impl From<ExtractionError> for SessionError {
    fn from(e: ExtractionError) -> Self {
        SessionError::Extraction(e)
    }
}

impl From<TransitionError> for SessionError {
    fn from(e: TransitionError) -> Self {
        SessionError::Transition(e)
    }
}

/// User actions routed to the resolution state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Submit(String),
    Skip(String),
    Edit(String),
    EditInput(String),
    Update { id: String, value: String },
    Cancel,
    Back,
    LiveUpdate(String),
}

/// An outstanding question-generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRequest {
    pub token: SessionToken,
    pub placeholders: Vec<Placeholder>,
}

/// What happened to a question-generation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Generated,
    FellBack(GenerationError),
    /// The requesting session no longer exists; the result was dropped
    Stale,
}

/// One uploaded document from extraction through completion or reset
#[derive(Debug, Clone)]
pub struct Session {
    token: SessionToken,
    source: String,
    started_at: DateTime<Utc>,
    template: Template,
    questions: QuestionSet,
    question_status: QuestionStatus,
    state: ResolutionState,
}

impl Session {
    fn new(token: SessionToken, source: String, document: Document) -> Self {
        let Document {
            placeholders,
            template,
        } = document;
        Self {
            token,
            source,
            started_at: Utc::now(),
            template,
            questions: QuestionSet::fallback(&placeholders),
            question_status: QuestionStatus::NotRequested,
            state: ResolutionState::new(placeholders),
        }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Name of the uploaded document
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    pub fn question_status(&self) -> &QuestionStatus {
        &self.question_status
    }

    pub fn state(&self) -> &ResolutionState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.question_status == QuestionStatus::Pending
    }

    /// Question text for `id`, falling back to the placeholder label
    pub fn question_for<'a>(&'a self, id: &'a str) -> &'a str {
        self.questions
            .question_for(id)
            .or_else(|| {
                self.state
                    .placeholders()
                    .iter()
                    .find(|p| p.id == id)
                    .map(|p| p.label.as_str())
            })
            .unwrap_or(id)
    }

    /// Question for the placeholder currently receiving input
    pub fn current_question(&self) -> Option<&str> {
        self.state.active_id().map(|id| self.question_for(id))
    }

    pub fn preview(&self) -> String {
        render_preview(&self.template, &self.state)
    }

    pub fn assemble(&self) -> String {
        assemble(&self.template, self.state.values())
    }
}

/// Owner of the live session and its extractor
pub struct Workspace<X>
where
    X: DocumentExtractor,
{
    extractor: X,
    policy: UploadPolicy,
    last_token: u64,
    session: Option<Session>,
}

impl<X> Workspace<X>
where
    X: DocumentExtractor,
{
    pub fn new(extractor: X, policy: UploadPolicy) -> Self {
        Self {
            extractor,
            policy,
            last_token: 0,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Validates and extracts a document, replacing any current session.
    ///
    /// A validation error changes nothing. An extraction failure also ends the
    /// current session, since the upload was accepted.
    pub fn upload(&mut self, document: &Path) -> Result<SessionToken, SessionError> {
        self.policy.check(document)?;

        let source = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| document.display().to_string());

        match self.extractor.extract(document) {
            Ok(extraction) => self.open(extraction, source),
            Err(e) => {
                tracing::warn!(document = %document.display(), error = %e, "extraction failed");
                self.session = None;
                Err(e.into())
            }
        }
    }

    /// Starts a session from an extraction obtained elsewhere
    pub fn open(&mut self, extraction: Extraction, source: impl Into<String>) -> Result<SessionToken, SessionError> {
        let document = match extraction.validate() {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, "rejected extraction");
                self.session = None;
                return Err(e.into());
            }
        };

        self.last_token += 1;
        let token = SessionToken(self.last_token);
        let session = Session::new(token, source.into(), document);
        tracing::info!(
            %token,
            source = session.source(),
            placeholders = session.state().placeholders().len(),
            "session started"
        );
        self.session = Some(session);
        Ok(token)
    }

    /// Discards the session, its answers and its navigation state
    pub fn reset(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!(token = %session.token(), "session reset");
        }
    }

    /// Marks the session busy and returns what to send to the generator.
    ///
    /// Returns `Ok(None)` when the session has no placeholders, as there is
    /// nothing to ask.
    pub fn request_questions(&mut self) -> Result<Option<QuestionRequest>, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if session.is_busy() {
            return Err(SessionError::Busy);
        }
        if session.state.placeholders().is_empty() {
            session.question_status = QuestionStatus::Generated;
            return Ok(None);
        }

        session.question_status = QuestionStatus::Pending;
        Ok(Some(QuestionRequest {
            token: session.token,
            placeholders: session.state.placeholders().to_vec(),
        }))
    }

    /// Applies a generation result to the session that requested it
    pub fn complete_questions(
        &mut self,
        token: SessionToken,
        result: Result<QuestionSet, GenerationError>,
    ) -> Completion {
        let session = match self.session.as_mut() {
            Some(session) if session.token == token => session,
            _ => {
                tracing::debug!(%token, "discarding stale question response");
                return Completion::Stale;
            }
        };

        match result {
            Ok(questions) => {
                session.questions = questions;
                session.question_status = QuestionStatus::Generated;
                Completion::Generated
            }
            Err(e) => {
                tracing::warn!(%token, error = %e, "falling back to placeholder labels");
                session.questions = QuestionSet::fallback(session.state.placeholders());
                session.question_status = QuestionStatus::FellBack(e.clone());
                Completion::FellBack(e)
            }
        }
    }

    /// Requests, awaits and applies questions for the current session
    pub async fn generate_questions<C>(
        &mut self,
        generator: &QuestionGenerator<C>,
    ) -> Result<Completion, SessionError>
    where
        C: CompletionClient,
    {
        let Some(request) = self.request_questions()? else {
            return Ok(Completion::Generated);
        };
        let result = generator.generate(&request.placeholders).await;
        Ok(self.complete_questions(request.token, result))
    }

    /// Runs one state-machine transition on the current session
    pub fn apply(&mut self, action: Action) -> Result<&Session, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if session.is_busy() {
            return Err(SessionError::Busy);
        }

        let state = &session.state;
        let next = match action {
            Action::Submit(value) => state.submit(value),
            Action::Skip(id) => state.skip(&id),
            Action::Edit(id) => state.edit(&id),
            Action::EditInput(value) => state.edit_input(value),
            Action::Update { id, value } => state.update(&id, value),
            Action::Cancel => state.cancel(),
            Action::Back => state.back(),
            Action::LiveUpdate(value) => state.live_update(value),
        };

        match next {
            Ok(next) => {
                session.state = next;
                Ok(&*session)
            }
            Err(e) => {
                tracing::debug!(error = %e, "transition rejected");
                Err(e.into())
            }
        }
    }
}
