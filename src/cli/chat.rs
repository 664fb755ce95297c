use anyhow::{Context, Result};
use lexifill::contexts::{
    preview_text, Action, Answer, Completion, CompletionClient, DocumentExtractor, Phase,
    QuestionGenerator, Session, Workspace,
};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use super::load_document;
use super::progress::ProgressIndicator;

const HELP: &str = "\
Type an answer and press Enter. An empty line keeps the shown answer.
  :skip        leave the current placeholder blank
  :back        return to the previous placeholder
  :edit <id>   change an answered placeholder
  :cancel      discard the open edit
  :preview     show the document with the answers so far
  :history     list answered placeholders
  :retry       generate the questions again
  :save        write the completed document
  :reset       discard all answers and start over
  :open <path> switch to another document
  :quit        leave without saving
Start an answer with '::' to enter a literal leading ':'.";

/// One line of user input in the fill session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Text(String),
    Skip,
    Back,
    Edit(String),
    Cancel,
    Preview,
    History,
    Retry,
    Save,
    Reset,
    Open(String),
    Quit,
    Help,
    Unknown(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("::") {
            return ChatCommand::Text(format!(":{}", rest));
        }
        let Some(command) = line.strip_prefix(':') else {
            return ChatCommand::Text(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match name {
            "skip" => ChatCommand::Skip,
            "back" | "b" => ChatCommand::Back,
            "edit" | "e" if !arg.is_empty() => ChatCommand::Edit(arg.to_string()),
            "cancel" => ChatCommand::Cancel,
            "preview" | "p" => ChatCommand::Preview,
            "history" | "h" => ChatCommand::History,
            "retry" => ChatCommand::Retry,
            "save" | "s" => ChatCommand::Save,
            "reset" => ChatCommand::Reset,
            "open" | "o" if !arg.is_empty() => ChatCommand::Open(arg.to_string()),
            "quit" | "q" | "exit" => ChatCommand::Quit,
            "help" | "?" => ChatCommand::Help,
            _ => ChatCommand::Unknown(line.to_string()),
        }
    }
}

/// How the session loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Quit,
    /// The user asked to start over with the same document
    Reset,
    /// A new session was started from this document
    Opened(PathBuf),
}

pub struct ChatOptions {
    pub output: PathBuf,
    pub preview_width: usize,
}

pub fn print_help<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", HELP)
}

/// Runs the question/answer loop over the workspace's session until the user
/// quits, resets or opens another document, or input ends.
///
/// `generator` is `None` in dry-run mode; `:retry` is then unavailable.
pub async fn run_chat<X, C, R, W>(
    workspace: &mut Workspace<X>,
    generator: Option<&QuestionGenerator<C>>,
    options: &ChatOptions,
    progress: &mut ProgressIndicator,
    input: &mut R,
    out: &mut W,
) -> Result<ChatOutcome>
where
    X: DocumentExtractor,
    C: CompletionClient,
    R: BufRead,
    W: Write,
{
    loop {
        let Some(session) = workspace.session() else {
            writeln!(out, "No document is open.")?;
            return Ok(ChatOutcome::Quit);
        };
        progress.record(session.state());
        prompt(session, progress, out)?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .context("Failed to read user input")?;
        if read == 0 {
            writeln!(out)?;
            return Ok(ChatOutcome::Quit);
        }

        let state = session.state();
        let action = match ChatCommand::parse(&line) {
            ChatCommand::Text(text) => match state.phase() {
                Phase::Active(_) => {
                    let value = if text.is_empty() { state.input().to_string() } else { text };
                    Some(Action::Submit(value))
                }
                Phase::Editing(id) => {
                    let value = if text.is_empty() { state.input().to_string() } else { text };
                    Some(Action::Update { id, value })
                }
                Phase::Complete => {
                    writeln!(out, "Every placeholder is resolved; use :edit <id> or :save.")?;
                    None
                }
            },
            ChatCommand::Skip => match state.active_id() {
                Some(id) => Some(Action::Skip(id.to_string())),
                None => {
                    writeln!(out, "! Nothing left to skip")?;
                    None
                }
            },
            ChatCommand::Back => Some(Action::Back),
            ChatCommand::Edit(id) => Some(Action::Edit(id)),
            ChatCommand::Cancel => Some(Action::Cancel),
            ChatCommand::Preview => {
                match preview_text(&session.preview(), options.preview_width) {
                    Ok(text) => writeln!(out, "\n{}", text.trim_end())?,
                    Err(e) => writeln!(out, "! Failed to render preview: {}", e)?,
                }
                None
            }
            ChatCommand::History => {
                print_history(session, out)?;
                None
            }
            ChatCommand::Retry => {
                retry_questions(workspace, generator, out).await?;
                None
            }
            ChatCommand::Save => {
                save(session, options, progress, out)?;
                None
            }
            ChatCommand::Reset => {
                workspace.reset();
                return Ok(ChatOutcome::Reset);
            }
            ChatCommand::Open(path) => {
                let path = PathBuf::from(path);
                match load_document(workspace, &path) {
                    Ok(()) => return Ok(ChatOutcome::Opened(path)),
                    Err(e) => writeln!(out, "! {:#}", e)?,
                }
                None
            }
            ChatCommand::Quit => return Ok(ChatOutcome::Quit),
            ChatCommand::Help => {
                print_help(out)?;
                None
            }
            ChatCommand::Unknown(command) => {
                writeln!(out, "! Unknown command '{}'; type :help", command)?;
                None
            }
        };

        if let Some(action) = action {
            if let Err(e) = workspace.apply(action) {
                writeln!(out, "! {}", e)?;
            }
        }
    }
}

fn prompt<W: Write>(session: &Session, progress: &ProgressIndicator, out: &mut W) -> io::Result<()> {
    let state = session.state();
    match state.phase() {
        Phase::Active(position) => {
            let id = &state.placeholders()[position].id;
            progress.show_question(out, position, id, session.question_for(id))?;
            if !state.input().is_empty() {
                writeln!(out, "  current answer: {}", state.input())?;
            }
        }
        Phase::Editing(id) => {
            writeln!(out, "\nEditing [{}] {}", id, session.question_for(&id))?;
            writeln!(out, "  current answer: {} (:cancel to keep it)", state.input())?;
        }
        Phase::Complete => {
            writeln!(
                out,
                "\nAll {} placeholder(s) resolved. :save writes the document.",
                state.placeholders().len()
            )?;
        }
    }
    write!(out, "> ")?;
    out.flush()
}

fn print_history<W: Write>(session: &Session, out: &mut W) -> io::Result<()> {
    let history = session.state().history();
    if history.is_empty() {
        return writeln!(out, "No answers yet.");
    }
    for entry in history {
        let marker = if entry.editing { '*' } else { ' ' };
        let answer = match entry.answer {
            Answer::Skipped => "(skipped)",
            Answer::Value("") => "(blank)",
            Answer::Value(value) => value,
        };
        writeln!(
            out,
            "{} [{}] {} => {}",
            marker,
            entry.placeholder.id,
            session.question_for(&entry.placeholder.id),
            answer
        )?;
    }
    Ok(())
}

async fn retry_questions<X, C, W>(
    workspace: &mut Workspace<X>,
    generator: Option<&QuestionGenerator<C>>,
    out: &mut W,
) -> io::Result<()>
where
    X: DocumentExtractor,
    C: CompletionClient,
    W: Write,
{
    let Some(generator) = generator else {
        return writeln!(out, "! Question generation is disabled in dry-run mode");
    };

    writeln!(out, "Generating questions...")?;
    match workspace.generate_questions(generator).await {
        Ok(Completion::Generated) => writeln!(out, "Questions updated."),
        Ok(Completion::FellBack(e)) => writeln!(out, "! {}; using placeholder names", e),
        Ok(Completion::Stale) => Ok(()),
        Err(e) => writeln!(out, "! {}", e),
    }
}

fn save<W: Write>(
    session: &Session,
    options: &ChatOptions,
    progress: &mut ProgressIndicator,
    out: &mut W,
) -> io::Result<()> {
    let state = session.state();
    if let Some(id) = state.editing_id() {
        return writeln!(out, "! Finish or :cancel the edit of [{}] first", id);
    }
    if !state.is_complete() {
        let (position, total) = state.progress();
        return writeln!(out, "! {} placeholder(s) still need an answer or :skip", total - position);
    }

    match fs::write(&options.output, session.assemble()) {
        Ok(()) => {
            let path = options.output.display().to_string();
            tracing::info!(path = %path, "completed document written");
            progress.record_saved(&path);
            writeln!(out, "Saved completed document to {}", path)
        }
        Err(e) => writeln!(out, "! Failed to write {}: {}", options.output.display(), e),
    }
}
