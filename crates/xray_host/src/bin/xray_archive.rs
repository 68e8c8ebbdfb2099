//! Offline inspection and cleanup of a recording directory.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use xray_forensics::{JsonFileStorage, RecordingId};
use xray_host::{archive, logging::setup_logging, LoggingSettings};

#[derive(Parser, Debug)]
#[command(name = "xray-archive")]
#[command(about = "Inspect and prune stored xray recordings")]
struct Args {
    /// Recording directory
    #[arg(short, long, default_value = "recordings")]
    dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List stored recordings, newest first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one recording (accepts `12` or `#12`)
    Show {
        id: String,
        /// Print the full timeline as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete one recording
    Delete { id: String },
    /// Delete all but the newest recordings
    Prune {
        #[arg(short, long)]
        keep: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_logging(
        &LoggingSettings {
            level: args.log_level.clone(),
            json_format: false,
        },
        false,
    )?;

    let storage = JsonFileStorage::open(&args.dir).await?;

    match args.command {
        Commands::List { json } => {
            let entries = archive::list(&storage).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No recordings in {}", storage.directory().display());
            } else {
                for entry in &entries {
                    println!("{entry}");
                }
                let bytes = storage.total_size_bytes().await?;
                println!("{} recordings, {} KiB", entries.len(), bytes / 1024);
            }
        }
        Commands::Show { id, json } => {
            let id: RecordingId = id.parse()?;
            let timeline = storage.try_load(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&timeline)?);
            } else {
                println!("{}", archive::describe(&timeline));
            }
        }
        Commands::Delete { id } => {
            let id: RecordingId = id.parse()?;
            if storage.try_delete(id).await? {
                println!("Deleted recording {id}");
            } else {
                println!("Recording {id} not found");
            }
        }
        Commands::Prune { keep } => {
            let deleted = archive::prune(&storage, keep).await?;
            println!("Deleted {} recordings", deleted.len());
        }
    }

    Ok(())
}
