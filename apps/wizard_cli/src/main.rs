use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::{CategoryId, CategoryNode, TextField};
use taxonomy::CategoryTree;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wizard_core::{SequenceOutcome, Wizard, WizardEvent, WizardSession};

mod config;

#[derive(Parser, Debug)]
#[command(about = "Drive the category wizard from a terminal")]
struct Cli {
    /// Settings file; defaults to ./wizard.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the seed used for sample choices.
    #[arg(long)]
    seed: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill the wizard with a random sample and print the submitted draft.
    Autofill,
    /// Run the typing tutorial on the name step for a while.
    Tutorial {
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
    /// Walk the tap sequence to a category and print the visible rows.
    Walk { id: String },
    /// Tap the given ids by hand, in order, and print the visible rows.
    Rows { ids: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = config::load_settings(cli.config.as_deref())?;
    if cli.seed.is_some() {
        settings.seed = cli.seed;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let source = settings.taxonomy_source().await?;
    let wizard = Wizard::new(
        Arc::new(CategoryTree::new(source)),
        settings.session_options(),
    );
    let session = wizard.session().clone();

    match cli.command {
        Command::Autofill => {
            session.load_taxonomy().await?;
            let outcome = wizard.start_autofill().wait().await;
            info!(?outcome, "autofill finished");
            let draft = session.submit().await?;
            println!("{}", serde_json::to_string_pretty(&draft)?);
        }
        Command::Tutorial { seconds } => {
            let printer = print_text_changes(&session);
            let tutorial = wizard
                .start_tutorial()
                .await
                .context("tutorial only runs on a text step")?;
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            tutorial.cancel();
            if tutorial.wait().await == SequenceOutcome::Cancelled {
                info!("tutorial stopped");
            }
            printer.abort();
        }
        Command::Walk { id } => {
            session.load_taxonomy().await?;
            let timings = *wizard.sequencer().timings();
            let outcome = wizard
                .sequencer()
                .run_tap_sequence(CategoryId::from(id), timings.tap_initial(), timings.tap_step())
                .wait()
                .await;
            info!(?outcome, "walk finished");
            print_rows(&session).await;
        }
        Command::Rows { ids } => {
            session.load_taxonomy().await?;
            for id in ids {
                wizard.tap_by_hand(&CategoryId::from(id)).await?;
            }
            print_rows(&session).await;
        }
    }

    wizard.stop_scripts();
    Ok(())
}

fn print_text_changes(session: &Arc<WizardSession>) -> JoinHandle<()> {
    let mut events = session.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let WizardEvent::TextChanged {
                field: TextField::Name,
                text,
            } = event
            {
                println!("name: {text}");
            }
        }
    })
}

async fn print_rows(session: &WizardSession) {
    let snapshot = session.snapshot().await;
    for row in session.visible_rows().await {
        let marker = if snapshot.path.contains(&row.id) { "*" } else { " " };
        println!("{marker} {}", describe(&row));
    }
}

fn describe(row: &CategoryNode) -> String {
    format!("{}{} ({})", "  ".repeat(row.level), row.name, row.id)
}
