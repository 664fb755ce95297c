use anyhow::{bail, Context, Result};
use lexifill::contexts::{
    Completion, CompletionClient, DocumentExtractor, QuestionGenerator, QuestionStatus,
    SessionError, Workspace, DOWNLOAD_FILENAME,
};
use lexifill::data::Extraction;
use lexifill::registries::{ChatCompletionsClient, CommandExtractor, Settings};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

mod chat;
mod progress;

use chat::{print_help, run_chat, ChatOptions, ChatOutcome};
use progress::ProgressIndicator;

#[derive(Clone, Copy)]
pub struct Config {
    pub verbose: bool,
    pub dry_run: bool,
}

const PREVIEW_WIDTH: usize = 80;

/// Answers read from a file; `None` marks an explicit skip
type AnswerMap = BTreeMap<String, Option<String>>;

pub async fn fill(
    document: PathBuf,
    output: Option<PathBuf>,
    no_cache: bool,
    settings: &Settings,
    config: &Config,
) -> Result<()> {
    let mut workspace = workspace(settings)?;
    let generator = question_generator(settings, no_cache, config);
    let options = ChatOptions {
        output: output.unwrap_or_else(|| PathBuf::from(DOWNLOAD_FILENAME)),
        preview_width: PREVIEW_WIDTH,
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    let mut show_help = true;
    let mut document = document;
    load_document(&mut workspace, &document)?;

    loop {
        let total = workspace
            .session()
            .map(|s| s.state().placeholders().len())
            .unwrap_or(0);
        println!("Document: {} ({} placeholder(s))", document.display(), total);
        if config.verbose {
            if let Some(session) = workspace.session() {
                println!(
                    "{} started at {}",
                    session.token(),
                    session.started_at().format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }

        match &generator {
            Some(generator) => {
                println!("Generating questions with {}...", generator.client().model_name());
                if let Completion::FellBack(e) = workspace.generate_questions(generator).await? {
                    println!("! {}; using placeholder names as questions", e);
                }
            }
            None => println!("Dry run: using placeholder names as questions"),
        }

        if show_help {
            print_help(&mut out)?;
            show_help = false;
        }

        let mut progress = ProgressIndicator::new(total);
        let outcome = run_chat(
            &mut workspace,
            generator.as_ref(),
            &options,
            &mut progress,
            &mut input,
            &mut out,
        )
        .await?;
        progress.finish(&mut out)?;

        match outcome {
            ChatOutcome::Quit => break,
            ChatOutcome::Reset => {
                println!("\nStarting over with {}", document.display());
                load_document(&mut workspace, &document)?;
            }
            ChatOutcome::Opened(next) => {
                println!("\nSwitched to {}", next.display());
                document = next;
            }
        }
    }

    Ok(())
}

/// Prints the question set for a document as JSON
pub async fn questions(
    document: PathBuf,
    no_cache: bool,
    settings: &Settings,
    config: &Config,
) -> Result<()> {
    let mut workspace = workspace(settings)?;
    load_document(&mut workspace, &document)?;

    if let Some(generator) = question_generator(settings, no_cache, config) {
        workspace.generate_questions(&generator).await?;
    }

    let session = workspace.session().context("Document session was lost")?;
    match session.question_status() {
        QuestionStatus::FellBack(e) => eprintln!("! {}; using placeholder names", e),
        QuestionStatus::NotRequested if config.verbose => {
            eprintln!("Dry run: using placeholder names")
        }
        _ => {}
    }

    let json = serde_json::to_string_pretty(session.questions())
        .context("Failed to serialize questions")?;
    println!("{}", json);
    Ok(())
}

/// Fills a document from an answers file without prompting
pub fn assemble(
    document: PathBuf,
    answers: PathBuf,
    output: Option<PathBuf>,
    settings: &Settings,
    config: &Config,
) -> Result<()> {
    let content = fs::read_to_string(&answers)
        .with_context(|| format!("Failed to read answers file {}", answers.display()))?;
    let answer_map = parse_answers(&content, is_yaml(&answers))
        .with_context(|| format!("Failed to parse answers file {}", answers.display()))?;

    let mut workspace = workspace(settings)?;
    load_document(&mut workspace, &document)?;
    let unanswered = apply_answers(&mut workspace, &answer_map)?;

    if !unanswered.is_empty() {
        eprintln!("No answer for: {} (left blank)", unanswered.join(", "));
    }

    let session = workspace.session().context("Document session was lost")?;
    let completed = session.assemble();

    match output {
        Some(path) if !config.dry_run => {
            fs::write(&path, &completed)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved completed document to {}", path.display());
        }
        Some(path) => {
            println!("[DRY RUN] Would write {} bytes to {}", completed.len(), path.display());
        }
        None => print!("{}", completed),
    }

    Ok(())
}

fn workspace(settings: &Settings) -> Result<Workspace<CommandExtractor>> {
    let extractor = CommandExtractor::new(&settings.parser_command)?;
    Ok(Workspace::new(extractor, settings.upload_policy()))
}

fn question_generator(
    settings: &Settings,
    no_cache: bool,
    config: &Config,
) -> Option<QuestionGenerator<ChatCompletionsClient>> {
    if config.dry_run {
        return None;
    }
    Some(QuestionGenerator::new(
        ChatCompletionsClient::from_settings(settings),
        settings.generator_options(!no_cache),
    ))
}

/// Starts a session from a `.docx` upload or a pre-extracted `.json` file
fn load_document<X>(workspace: &mut Workspace<X>, document: &Path) -> Result<()>
where
    X: DocumentExtractor,
{
    let is_json = document
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let result = if is_json {
        let source = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| document.display().to_string());
        Extraction::from_json_file(document)
            .map_err(SessionError::from)
            .and_then(|extraction| workspace.open(extraction, source))
    } else {
        workspace.upload(document)
    };

    result.with_context(|| format!("Failed to load {}", document.display()))?;
    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"))
}

/// Parses a flat `id: value` map. Scalars are stringified; `null` means skip.
fn parse_answers(content: &str, yaml: bool) -> Result<AnswerMap> {
    let raw: BTreeMap<String, serde_json::Value> = if yaml {
        serde_yaml::from_str(content).context("Invalid YAML answers")?
    } else {
        serde_json::from_str(content).context("Invalid JSON answers")?
    };

    raw.into_iter()
        .map(|(id, value)| {
            let text = match value {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Bool(b) => Some(b.to_string()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                other => bail!("Answer for '{}' must be a single value, got {}", id, other),
            };
            Ok((id, text))
        })
        .collect()
}

/// Walks the session in order, submitting answers and skipping the rest.
///
/// Returns the ids that had no entry in `answers`.
fn apply_answers<X>(workspace: &mut Workspace<X>, answers: &AnswerMap) -> Result<Vec<String>>
where
    X: DocumentExtractor,
{
    use lexifill::contexts::Action;

    let ids: Vec<String> = workspace
        .session()
        .context("No document loaded")?
        .state()
        .placeholders()
        .iter()
        .map(|p| p.id.clone())
        .collect();

    for key in answers.keys().filter(|k| !ids.contains(*k)) {
        tracing::warn!(id = %key, "answer does not match any placeholder");
    }

    let mut unanswered = Vec::new();
    for id in ids {
        let action = match answers.get(&id) {
            Some(Some(value)) => Action::Submit(value.clone()),
            Some(None) => Action::Skip(id),
            None => {
                unanswered.push(id.clone());
                Action::Skip(id)
            }
        };
        workspace.apply(action)?;
    }

    Ok(unanswered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexifill::contexts::UploadPolicy;
    use lexifill::data::{ExtractionError, Placeholder};

    struct NoExtractor;

    impl DocumentExtractor for NoExtractor {
        fn extract(&self, _document: &Path) -> std::result::Result<Extraction, ExtractionError> {
            Err(ExtractionError::Parser("not used".to_string()))
        }
    }

    fn workspace_with(template: &str, ids: &[&str]) -> Workspace<NoExtractor> {
        let mut workspace = Workspace::new(NoExtractor, UploadPolicy::default());
        let placeholders = ids
            .iter()
            .enumerate()
            .map(|(i, id)| Placeholder::new(*id, i + 1, *id))
            .collect();
        workspace
            .open(
                Extraction {
                    placeholders,
                    replaced_template: template.to_string(),
                },
                "test.json",
            )
            .unwrap();
        workspace
    }

    #[test]
    fn test_parse_json_answers() {
        let answers = parse_answers(r#"{"NAME": "Ada", "AMOUNT": 1500, "DATE": null}"#, false).unwrap();
        assert_eq!(answers["NAME"].as_deref(), Some("Ada"));
        assert_eq!(answers["AMOUNT"].as_deref(), Some("1500"));
        assert_eq!(answers["DATE"], None);
    }

    #[test]
    fn test_parse_yaml_answers() {
        let answers = parse_answers("NAME: Ada Lovelace\nSIGNED: true\nDATE: ~\n", true).unwrap();
        assert_eq!(answers["NAME"].as_deref(), Some("Ada Lovelace"));
        assert_eq!(answers["SIGNED"].as_deref(), Some("true"));
        assert_eq!(answers["DATE"], None);
    }

    #[test]
    fn test_nested_answers_are_rejected() {
        assert!(parse_answers(r#"{"NAME": {"first": "Ada"}}"#, false).is_err());
    }

    #[test]
    fn test_apply_answers_submits_and_skips() {
        let mut workspace = workspace_with("<<NAME>> owes <<AMOUNT>> by <<DATE>>.", &["NAME", "AMOUNT", "DATE"]);
        let answers = parse_answers(r#"{"NAME": "Ada", "DATE": null, "EXTRA": "x"}"#, false).unwrap();

        let unanswered = apply_answers(&mut workspace, &answers).unwrap();
        let session = workspace.session().unwrap();

        assert_eq!(unanswered, vec!["AMOUNT".to_string()]);
        assert!(session.state().is_complete());
        assert!(session.state().is_skipped("DATE"));
        assert_eq!(session.assemble(), "Ada owes  by .");
    }

    #[test]
    fn test_load_json_document() {
        let path = std::env::temp_dir().join(format!("lexifill_load_{}.json", std::process::id()));
        fs::write(
            &path,
            r#"{"placeholders":[{"raw":"[Client]","label":"Client","id":"CLIENT","type":"bracket","line_num":3}],"replacedTemplate":"Client: <<CLIENT>>"}"#,
        )
        .unwrap();

        let mut workspace = Workspace::new(NoExtractor, UploadPolicy::default());
        load_document(&mut workspace, &path).unwrap();
        let session = workspace.session().unwrap();
        assert_eq!(session.state().placeholders()[0].id, "CLIENT");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_question_generator_follows_settings_and_dry_run() {
        let settings = Settings {
            model: "test-model".to_string(),
            ..Settings::default()
        };
        let live = Config {
            verbose: false,
            dry_run: false,
        };
        let dry = Config {
            verbose: false,
            dry_run: true,
        };

        let generator = question_generator(&settings, true, &live).unwrap();
        assert_eq!(generator.client().model_name(), "test-model");
        assert!(question_generator(&settings, true, &dry).is_none());
    }

    #[test]
    fn test_load_rejects_wrong_format() {
        let mut workspace = Workspace::new(NoExtractor, UploadPolicy::default());
        let err = load_document(&mut workspace, Path::new("contract.pdf")).unwrap_err();
        assert!(err.downcast_ref::<SessionError>().is_some());
    }
}
