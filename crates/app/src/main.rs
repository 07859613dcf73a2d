use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_chat_core::{
    resolve_credential, ChatConfig, ChatCoordinator, ChatSession, OpenAiProvider, SourceSet,
};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file; missing files fall back to defaults
    #[arg(long, default_value = "pdfchat.toml")]
    config: PathBuf,

    /// TOML file holding the API credential
    #[arg(long, default_value = "secrets.toml")]
    secrets: PathBuf,

    /// Folder with the PDFs (overrides `data_dir` from the settings file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// API key for the model service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat over the PDF folder.
    Chat,
    /// Ask a single question and exit.
    Ask {
        /// Question to answer from the documents.
        question: String,
    },
    /// Build the index and report what was loaded.
    Index,
}

fn print_fragment(fragment: &str) {
    print!("{fragment}");
    if let Err(error) = std::io::stdout().flush() {
        warn!(error = %error, "stdout flush failed");
    }
}

fn print_history(session: &ChatSession) {
    if session.transcript().is_empty() {
        println!("(no messages yet)");
        return;
    }
    for turn in session.transcript().turns() {
        println!(
            "[{}] {}: {}",
            turn.at.format("%H:%M:%S"),
            turn.role,
            turn.content
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config =
        ChatConfig::load(&cli.config).map_err(|error| anyhow::anyhow!(error.to_string()))?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat boot"
    );

    let credential = resolve_credential(
        cli.api_key.as_deref(),
        &cli.secrets,
        &config.credential_key,
    )
    .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let sources = match SourceSet::from_dir(&config.data_dir, credential) {
        Ok(sources) => sources,
        Err(error) => {
            warn!(folder = %config.data_dir.display(), "no pdf files");
            anyhow::bail!(
                "{error}. Add at least one PDF to `{}`.",
                config.data_dir.display()
            );
        }
    };
    println!("Loaded PDF files: {}", sources.file_names().join(", "));

    let composer = config
        .composer()
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let coordinator = ChatCoordinator::new(
        OpenAiProvider::from_config(&config),
        composer,
        config.retriever_options(),
    );

    match cli.command {
        Command::Index => {
            let retriever = coordinator
                .retriever(&sources)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            for document in retriever.documents() {
                println!(
                    "indexed {} pages={} sha256={}",
                    document.file_name, document.page_count, document.checksum
                );
            }
            for skipped in retriever.skipped() {
                println!("skipped {}: {}", skipped.path.display(), skipped.reason);
            }
            println!(
                "{} chunks indexed at {}",
                retriever.chunk_count(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask { question } => {
            let mut session = ChatSession::new();
            let answer = coordinator
                .handle_turn(&mut session, &sources, &question, print_fragment)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!();
            if !answer.sources.is_empty() {
                println!("sources: {}", answer.sources.join(", "));
            }
        }
        Command::Chat => {
            let mut session = ChatSession::new();
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            println!("Ask about the documents. /history shows the conversation, /quit exits.");

            loop {
                print_fragment("> ");
                let Some(line) = lines.next_line().await? else {
                    break;
                };

                let question = line.trim();
                match question {
                    "" => continue,
                    "/quit" | "/exit" => break,
                    "/history" => {
                        print_history(&session);
                        continue;
                    }
                    _ => {}
                }

                match coordinator
                    .handle_turn(&mut session, &sources, question, print_fragment)
                    .await
                {
                    Ok(answer) => {
                        println!();
                        if !answer.sources.is_empty() {
                            println!("sources: {}", answer.sources.join(", "));
                        }
                    }
                    Err(error) => {
                        println!();
                        warn!(error = %error, "turn failed");
                        eprintln!("error: {error}");
                    }
                }
            }
        }
    }

    Ok(())
}
