use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::domain::CategoryId;
use taxonomy::{CategoryTree, HttpTaxonomySource, StaticTaxonomySource, TaxonomySource};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "fixtures/taxonomy.json")]
    taxonomy_file: String,
    /// Read the taxonomy from a remote database instead of a file.
    #[arg(long)]
    taxonomy_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the taxonomy and print its size.
    Validate,
    /// Print the whole forest, indented by depth.
    Tree,
    /// Print the ids a scripted walk to `id` would tap.
    TapSequence { id: String },
    Search { query: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::TapSequence { id } = &cli.command {
        for step in CategoryId::from(id.as_str()).tap_sequence() {
            println!("{step}");
        }
        return Ok(());
    }

    let source: Arc<dyn TaxonomySource> = match &cli.taxonomy_url {
        Some(url) => Arc::new(HttpTaxonomySource::new(url)?),
        None => Arc::new(StaticTaxonomySource::from_json_file(&cli.taxonomy_file).await?),
    };
    let tree = CategoryTree::new(source);
    tree.load().await?;

    match cli.command {
        Command::Validate => {
            let stats = tree.stats();
            println!(
                "ok: nodes={} roots={} max_depth={}",
                stats.nodes, stats.roots, stats.max_depth
            );
        }
        Command::Tree => {
            let mut pending: Vec<(CategoryId, usize)> = tree
                .root_ids()
                .iter()
                .rev()
                .map(|id| (id.clone(), 0))
                .collect();
            while let Some((id, level)) = pending.pop() {
                let node = tree.node_view(&id, level);
                println!("{}{} [{}]", "  ".repeat(level), node.name, node.id);
                pending.extend(
                    tree.child_ids(&id)
                        .iter()
                        .rev()
                        .map(|child| (child.clone(), level + 1)),
                );
            }
        }
        Command::Search { query } => {
            for node in tree.search(&query) {
                println!("{} [{}] level={}", node.name, node.id, node.level);
            }
        }
        Command::TapSequence { .. } => {}
    }

    Ok(())
}
