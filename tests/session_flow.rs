//! Full sessions through the public API: extraction, question generation,
//! resolution, preview and assembly.

use lexifill::contexts::{
    Action, Completion, CompletionClient, CompletionError, DocumentExtractor, GenerationError,
    GeneratorOptions, Highlight, Phase, QuestionGenerator, QuestionStatus, SessionError,
    TransitionError, UploadPolicy, Workspace, highlight,
};
use lexifill::data::{Extraction, ExtractionError, Placeholder};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct FixtureExtractor(Extraction);

impl DocumentExtractor for FixtureExtractor {
    fn extract(&self, _document: &Path) -> Result<Extraction, ExtractionError> {
        Ok(self.0.clone())
    }
}

struct CannedClient {
    reply: Result<String, CompletionError>,
    calls: AtomicUsize,
}

impl CannedClient {
    fn new(reply: Result<&str, CompletionError>) -> Self {
        Self {
            reply: reply.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }
}

impl CompletionClient for CannedClient {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

fn greeting() -> Extraction {
    Extraction {
        placeholders: vec![
            Placeholder::new("NAME", 3, "Name"),
            Placeholder::new("DATE", 7, "Date"),
        ],
        replaced_template: "Hello <<NAME>>, today is <<DATE>>.".to_string(),
    }
}

fn workspace() -> Workspace<FixtureExtractor> {
    let mut workspace = Workspace::new(FixtureExtractor(greeting()), UploadPolicy::default());
    workspace.open(greeting(), "greeting.json").unwrap();
    workspace
}

fn generator(reply: Result<&str, CompletionError>) -> QuestionGenerator<CannedClient> {
    QuestionGenerator::new(
        CannedClient::new(reply),
        GeneratorOptions {
            max_retries: 0,
            backoff: Duration::from_millis(1),
            use_cache: false,
            ..GeneratorOptions::default()
        },
    )
}

#[test]
fn submit_every_placeholder_then_assemble() {
    let mut workspace = workspace();
    workspace.apply(Action::Submit("Alice".to_string())).unwrap();
    let session = workspace.apply(Action::Submit("May 1".to_string())).unwrap();

    assert_eq!(session.state().phase(), Phase::Complete);
    assert_eq!(session.assemble(), "Hello Alice, today is May 1.");
}

#[test]
fn skipped_placeholder_assembles_blank() {
    let mut workspace = workspace();
    workspace.apply(Action::Submit("Alice".to_string())).unwrap();
    let session = workspace.apply(Action::Skip("DATE".to_string())).unwrap();

    assert_eq!(session.assemble(), "Hello Alice, today is .");
    assert!(session.state().is_skipped("DATE"));
    assert_eq!(highlight(session.state(), "DATE"), Highlight::Skipped);
    assert_eq!(highlight(session.state(), "NAME"), Highlight::Filled);
}

#[tokio::test]
async fn fenced_malformed_response_falls_back_to_labels() {
    let mut workspace = workspace();
    let generator = generator(Ok("```json\n{\"questions\": [\n```"));

    let completion = workspace.generate_questions(&generator).await.unwrap();

    assert!(matches!(completion, Completion::FellBack(GenerationError::Malformed(_))));
    let session = workspace.session().unwrap();
    assert_eq!(session.question_for("NAME"), "Name");
    assert_eq!(session.question_for("DATE"), "Date");
    assert!(matches!(session.question_status(), QuestionStatus::FellBack(_)));
}

#[tokio::test]
async fn fenced_valid_response_is_used() {
    let mut workspace = workspace();
    let generator = generator(Ok(
        "```json\n{\"questions\":[{\"id\":\"DATE\",\"line_num\":7,\"question\":\"What is today's date?\"},{\"id\":\"NAME\",\"line_num\":3,\"question\":\"Whom are you greeting?\"}]}\n```",
    ));

    let completion = workspace.generate_questions(&generator).await.unwrap();

    assert_eq!(completion, Completion::Generated);
    let session = workspace.session().unwrap();
    assert_eq!(session.current_question(), Some("Whom are you greeting?"));
    let ids: Vec<&str> = session.questions().iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["NAME", "DATE"]);
}

#[tokio::test]
async fn service_failure_falls_back_without_blocking_answers() {
    let mut workspace = workspace();
    let generator = generator(Err(CompletionError::Service {
        status: 503,
        body: "overloaded".to_string(),
    }));

    let completion = workspace.generate_questions(&generator).await.unwrap();
    assert!(matches!(completion, Completion::FellBack(GenerationError::Failure(_))));

    let session = workspace.apply(Action::Submit("Alice".to_string())).unwrap();
    assert_eq!(session.current_question(), Some("Date"));
}

#[tokio::test]
async fn document_without_placeholders_never_calls_the_service() {
    let empty = Extraction {
        placeholders: Vec::new(),
        replaced_template: "Nothing to fill.".to_string(),
    };
    let mut workspace = Workspace::new(FixtureExtractor(empty.clone()), UploadPolicy::default());
    workspace.open(empty, "empty.json").unwrap();
    let generator = generator(Ok("{\"questions\": []}"));

    workspace.generate_questions(&generator).await.unwrap();

    assert_eq!(generator.client().calls.load(Ordering::SeqCst), 0);
    let session = workspace.session().unwrap();
    assert!(session.state().is_complete());
    assert_eq!(session.assemble(), "Nothing to fill.");
}

#[test]
fn stale_question_response_is_discarded() {
    let mut workspace = workspace();
    let request = workspace.request_questions().unwrap().unwrap();

    workspace.reset();
    workspace.open(greeting(), "greeting-again.json").unwrap();

    let completion = workspace.complete_questions(request.token, Err(GenerationError::Failure("late".to_string())));
    assert_eq!(completion, Completion::Stale);
    assert_eq!(
        workspace.session().unwrap().question_status(),
        &QuestionStatus::NotRequested
    );
}

#[test]
fn transitions_wait_for_pending_questions() {
    let mut workspace = workspace();
    let _request = workspace.request_questions().unwrap();

    assert_eq!(
        workspace.apply(Action::Submit("Alice".to_string())).unwrap_err(),
        SessionError::Busy
    );
}

#[test]
fn back_edit_and_update_flow() {
    let mut workspace = workspace();
    workspace.apply(Action::Submit("Alice".to_string())).unwrap();
    workspace.apply(Action::Skip("DATE".to_string())).unwrap();

    let session = workspace.apply(Action::Back).unwrap();
    assert_eq!(session.state().phase(), Phase::Active(1));

    workspace.apply(Action::Edit("NAME".to_string())).unwrap();
    let session = workspace.apply(Action::EditInput("Bob".to_string())).unwrap();
    assert!(session.preview().contains("current-editing"));
    assert_eq!(
        workspace.apply(Action::Back).unwrap_err(),
        SessionError::Transition(TransitionError::EditInProgress("NAME".to_string()))
    );

    let session = workspace
        .apply(Action::Update {
            id: "NAME".to_string(),
            value: "Bob".to_string(),
        })
        .unwrap();
    assert_eq!(session.state().phase(), Phase::Active(1));

    let session = workspace.apply(Action::Submit("June 2".to_string())).unwrap();
    assert_eq!(session.assemble(), "Hello Bob, today is June 2.");
    assert!(!session.state().is_skipped("DATE"));
}

#[test]
fn upload_rejects_non_docx_and_keeps_session() {
    let mut workspace = workspace();
    let err = workspace.upload(Path::new("agreement.pdf")).unwrap_err();

    assert!(matches!(err, SessionError::Validation(_)));
    assert_eq!(workspace.session().unwrap().source(), "greeting.json");
}

#[test]
fn ids_with_pattern_characters_substitute_literally() {
    let extraction = Extraction {
        placeholders: vec![
            Placeholder::new("a.b", 1, "Dotted"),
            Placeholder::new("a+b", 2, "Plus"),
        ],
        replaced_template: "<<a.b>> / <<a+b>> / <<axb>>".to_string(),
    };
    let mut workspace = Workspace::new(FixtureExtractor(extraction.clone()), UploadPolicy::default());
    workspace.open(extraction, "ids.json").unwrap();
    workspace.apply(Action::Submit("dot".to_string())).unwrap();
    let session = workspace.apply(Action::Submit("plus".to_string())).unwrap();

    assert_eq!(session.assemble(), "dot / plus / <<axb>>");
}
