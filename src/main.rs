use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lexifill::registries::Settings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "lexifill")]
#[command(about = "Fill the placeholders of a legal document template through guided questions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Never contact the question service; use placeholder names")]
    dry_run: bool,

    #[arg(long, global = true, help = "Settings file (defaults to lexifill.yml when present)")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Answer questions interactively and save the completed document")]
    Fill {
        #[arg(help = "A .docx template or a pre-extracted .json file")]
        document: PathBuf,

        #[arg(long, short, help = "Where to write the completed document")]
        output: Option<PathBuf>,

        #[arg(long, help = "Ignore and do not write cached questions")]
        no_cache: bool,
    },

    #[command(about = "Print the questions generated for a document as JSON")]
    Questions {
        #[arg(help = "A .docx template or a pre-extracted .json file")]
        document: PathBuf,

        #[arg(long, help = "Ignore and do not write cached questions")]
        no_cache: bool,
    },

    #[command(about = "Fill a document from a JSON or YAML answers file")]
    Assemble {
        #[arg(help = "A .docx template or a pre-extracted .json file")]
        document: PathBuf,

        #[arg(long, short, help = "Answers file mapping placeholder ids to values")]
        answers: PathBuf,

        #[arg(long, short, help = "Where to write the completed document (stdout if omitted)")]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    let config = cli::Config {
        verbose: cli.verbose,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Fill {
            document,
            output,
            no_cache,
        } => {
            cli::fill(document, output, no_cache, &settings, &config).await?;
        }
        Commands::Questions { document, no_cache } => {
            cli::questions(document, no_cache, &settings, &config).await?;
        }
        Commands::Assemble {
            document,
            answers,
            output,
        } => {
            cli::assemble(document, answers, output, &settings, &config)?;
        }
    }

    Ok(())
}
