mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use copyguard_ai::{OpenAiChatModel, ReviewerConfig, Screener};
use copyguard_core::RuleCatalog;
use copyguard_store::{FeedbackEvent, FeedbackProcessor, LearningStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "copyguard")]
#[command(about = "Screen marketing copy for compliance violations and learn from reviewer feedback")]
#[command(version)]
struct Cli {
    /// Learning store snapshot file
    #[arg(long, global = true, env = "COPYGUARD_STORE", default_value = "copyguard-learning.json")]
    store: PathBuf,

    /// JSON rule catalog replacing the built-in rulebook
    #[arg(long, global = true, env = "COPYGUARD_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Screen a text file ("-" for stdin) and record it for feedback
    Review {
        file: PathBuf,
        /// Reference kept with the example (usually the page URL)
        #[arg(long)]
        source_ref: Option<String>,
        /// Do not record a learning example
        #[arg(long)]
        no_record: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: String,
        #[arg(long, env = "OPENAI_MODEL", default_value = copyguard_ai::reviewer::DEFAULT_MODEL)]
        model: String,
        #[arg(long, env = "OPENAI_BASE_URL", default_value = copyguard_ai::reviewer::DEFAULT_BASE_URL)]
        base_url: String,
        #[arg(long, env = "COPYGUARD_TIMEOUT_SECS", default_value_t = 60)]
        timeout_secs: u64,
        #[arg(long, default_value_t = copyguard_ai::reviewer::DEFAULT_MAX_CHARS)]
        max_chars: usize,
    },
    /// Record a reviewer verdict on an example
    Feedback {
        example_id: String,
        /// correct, incorrect, or needs_review
        #[arg(required_unless_present = "action_id")]
        verdict: Option<String>,
        /// Chat button action id (feedback_correct_*, feedback_incorrect_*, ...)
        #[arg(long, conflicts_with = "verdict")]
        action_id: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List examples awaiting feedback, most recent first
    Pending {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Per-rule precision, recall, and F1
    Performance {
        #[arg(long)]
        json: bool,
    },
    /// Insights derived from rule performance
    Insights,
    /// Learning progress report
    Report {
        #[arg(long)]
        json: bool,
    },
    /// Export every example and performance row as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List the rules in the active catalog
    Rules,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let catalog = Arc::new(load_catalog(cli.catalog.as_deref())?);

    if let Command::Rules = cli.command {
        display::print_rules(&catalog);
        return Ok(());
    }

    let store = Arc::new(
        LearningStore::open_persistent(&cli.store)
            .with_context(|| format!("opening learning store {}", cli.store.display()))?,
    );

    let outcome = run(cli.command, catalog, &store).await;

    let store = Arc::into_inner(store).context("learning store still shared at shutdown")?;
    store.close().context("flushing learning store")?;
    outcome
}

async fn run(
    command: Command,
    catalog: Arc<RuleCatalog>,
    store: &Arc<LearningStore>,
) -> anyhow::Result<()> {
    match command {
        Command::Review {
            file,
            source_ref,
            no_record,
            json,
            api_key,
            model,
            base_url,
            timeout_secs,
            max_chars,
        } => {
            if api_key.trim().is_empty() {
                bail!("an API key is required (--api-key or OPENAI_API_KEY)");
            }
            let text = read_text(&file)?;
            let config = ReviewerConfig {
                api_key,
                model,
                base_url,
                timeout: Duration::from_secs(timeout_secs),
                max_chars,
            };
            let chat = Arc::new(OpenAiChatModel::new(&config));
            let screener = Screener::new(catalog, chat, &config).context("compiling rule catalog")?;

            let source_ref = source_ref.unwrap_or_else(|| file.display().to_string());
            let (result, example_id) = if no_record {
                (screener.screen(&text).await?, None)
            } else {
                let screened = screener.screen_and_record(&source_ref, &text, store).await?;
                (screened.result, Some(screened.example_id))
            };

            if json {
                let mut value = serde_json::to_value(&result)?;
                if let (Some(id), Some(obj)) = (&example_id, value.as_object_mut()) {
                    obj.insert("example_id".into(), id.clone().into());
                }
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                display::print_result(&result, example_id.as_deref());
            }
        }

        Command::Feedback {
            example_id,
            verdict,
            action_id,
            notes,
        } => {
            let event = match (action_id, verdict) {
                (Some(action_id), _) => {
                    let event = FeedbackEvent::from_action(&action_id, &example_id);
                    match notes {
                        Some(n) => event.with_notes(n),
                        None => event,
                    }
                }
                (None, Some(verdict)) => {
                    FeedbackEvent::parse(&example_id, &verdict, notes.as_deref())?
                }
                (None, None) => bail!("either a verdict or --action-id is required"),
            };
            let processor = FeedbackProcessor::new(Arc::clone(store));
            let receipt = processor.submit(&event)?;
            display::print_receipt(&receipt);
        }

        Command::Pending { limit } => {
            display::print_pending(&store.pending_examples(limit), store.pending_count());
        }

        Command::Performance { json } => {
            let performance = store.policy_performance();
            if json {
                println!("{}", serde_json::to_string_pretty(&performance)?);
            } else {
                display::print_performance(&performance);
            }
        }

        Command::Insights => {
            let processor = FeedbackProcessor::new(Arc::clone(store));
            let insights = processor.insights();
            if insights.is_empty() {
                println!("No insights yet.");
            }
            for insight in insights {
                println!("- {insight}");
            }
        }

        Command::Report { json } => {
            let report = store.report();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                display::print_report(&report);
            }
        }

        Command::Export { output } => {
            let json = store.export().to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing export to {}", path.display()))?;
                    tracing::info!(path = %path.display(), "exported learning data");
                }
                None => println!("{json}"),
            }
        }

        Command::Rules => display::print_rules(&catalog),
    }
    Ok(())
}

fn load_catalog(path: Option<&Path>) -> anyhow::Result<RuleCatalog> {
    match path {
        Some(path) => RuleCatalog::from_path(path)
            .with_context(|| format!("loading rule catalog {}", path.display())),
        None => Ok(RuleCatalog::builtin()),
    }
}

fn read_text(file: &Path) -> anyhow::Result<String> {
    if file == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("reading page text from stdin")
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
    }
}
