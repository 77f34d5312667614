//! Notekeeper CLI
//!
//! Thin consumer over the note engine: every command loads the collection,
//! calls engine operations, and prints the refreshed view.

use anyhow::Result;
use clap::{Parser, Subcommand};
use notekeeper::notes::{FilterState, LifecycleCoordinator, Note, Priority, SortOption};
use notekeeper::{AppState, Config};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "notekeeper")]
#[command(about = "Note management engine CLI")]
struct Cli {
    /// Data directory (overrides config and NOTEKEEPER_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a note
    Add {
        /// Note content
        content: String,

        /// Note title
        #[arg(short, long, default_value = "")]
        title: String,

        /// Priority: low, normal, high
        #[arg(short, long, default_value = "normal")]
        priority: String,

        /// Tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List notes
    List {
        /// Show archived notes instead of active ones
        #[arg(long)]
        archived: bool,

        /// Full-text search
        #[arg(short, long, default_value = "")]
        search: String,

        /// Filter by exact tag
        #[arg(long)]
        tag: Option<String>,

        /// Only favorites
        #[arg(long)]
        favorites: bool,

        /// Filter by priority
        #[arg(short, long)]
        priority: Option<String>,

        /// Sort: modified, created, title, priority, words
        #[arg(long, default_value = "modified")]
        sort: String,
    },

    /// Toggle the favorite flag of a note
    Favorite { id: Uuid },

    /// Toggle the archived flag of a note
    Archive { id: Uuid },

    /// Delete a note
    Delete { id: Uuid },

    /// Print the plain-text export of all notes
    Export,

    /// Print collection statistics and tags
    Stats,

    /// Validate and repair the collection
    Repair,

    /// Delete every note
    Clear,

    /// Keep the engine resident with periodic cache sweeps until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,notekeeper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir.into();
    }

    let state = AppState::new(config).await?;
    let mut manager = state.manager.write().await;

    match cli.command {
        Commands::Add {
            content,
            title,
            priority,
            tags,
        } => {
            let priority = Priority::from_str(&priority).map_err(anyhow::Error::msg)?;
            let note = Note::new_full(title, content, priority, tags);
            let id = note.id;
            manager.add(note);
            manager.save_now().await;
            println!("Added note {}", id);
        }

        Commands::List {
            archived,
            search,
            tag,
            favorites,
            priority,
            sort,
        } => {
            let filter = FilterState {
                archived,
                search,
                priority: priority
                    .as_deref()
                    .map(Priority::from_str)
                    .transpose()
                    .map_err(anyhow::Error::msg)?,
                favorites_only: favorites,
                tag,
                sort: SortOption::from_str(&sort).map_err(anyhow::Error::msg)?,
            };

            let notes = manager.filtered_notes(&filter);
            if notes.is_empty() {
                println!("No notes");
            }
            for note in notes {
                let marker = if note.favorite { "*" } else { " " };
                println!(
                    "{} {}  [{}] {}  ({} words)",
                    marker,
                    note.id,
                    note.priority,
                    note.title,
                    note.word_count()
                );
            }
        }

        Commands::Favorite { id } => {
            manager.toggle_favorite(id)?;
            manager.save_now().await;
            println!("Toggled favorite on {}", id);
        }

        Commands::Archive { id } => {
            manager.toggle_archive(id)?;
            manager.save_now().await;
            println!("Toggled archive on {}", id);
        }

        Commands::Delete { id } => {
            manager.delete(id)?;
            manager.save_now().await;
            println!("Deleted {}", id);
        }

        Commands::Export => {
            print!("{}", manager.export_text());
        }

        Commands::Stats => {
            let stats = manager.statistics();
            println!(
                "Active: {} | Favorites: {} | Archived: {} | Total words: {}",
                stats.active, stats.favorites, stats.archived, stats.total_words
            );
            let tags = manager.all_tags();
            if !tags.is_empty() {
                println!("Tags: {}", tags.join(", "));
            }
        }

        Commands::Repair => {
            let repaired = manager.validate_and_repair();
            manager.save_now().await;
            println!("Repaired {} notes", repaired);
        }

        Commands::Clear => {
            let count = manager.len();
            manager.clear_all();
            manager.save_now().await;
            println!("Cleared {} notes", count);
        }

        Commands::Run => {
            drop(manager);
            run_resident(&state).await?;
        }
    }

    Ok(())
}

/// Run the engine with the lifecycle coordinator active until interrupted
async fn run_resident(state: &AppState) -> Result<()> {
    let mut coordinator =
        LifecycleCoordinator::new(state.manager.clone(), state.config.lifecycle_config());
    coordinator.start();
    tracing::info!(
        count = state.manager.read().await.len(),
        "engine resident, Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;

    // Tear down the same way an app moving to the background would: persist,
    // sweep, then stop the timer
    coordinator.on_background().await;
    coordinator.stop().await;
    Ok(())
}
