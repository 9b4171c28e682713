mod commands;
mod config;
mod media;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    ExerciseAddArgs, ExerciseEditArgs, FoodAddArgs, FoodEditArgs, cmd_backend, cmd_day,
    cmd_exercise_add, cmd_exercise_delete, cmd_exercise_edit, cmd_food_add, cmd_food_delete,
    cmd_food_edit, cmd_photo_save,
};
use crate::config::{BackendChoice, Config};
use foodlog_core::models::EntryKind;
use foodlog_core::store::Store;

#[derive(Parser)]
#[command(
    name = "foodlog",
    version,
    about = "A meal and exercise diary for the terminal",
    long_about = "A meal and exercise diary for the terminal.\n\n\
        Entries are kept per day in a local SQLite database, or in a folder of\n\
        JSON files when SQLite cannot be opened. Set RUST_LOG=debug to see\n\
        what the store is doing."
)]
struct Cli {
    /// Storage backend to use (default: auto, or FOODLOG_BACKEND)
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendChoice>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show everything logged on a day (defaults to today)
    Day {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log and manage meals and drinks
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Log and manage workouts
    Exercise {
        #[command(subcommand)]
        command: ExerciseCommands,
    },
    /// Work with photos attached to entries
    Photo {
        #[command(subcommand)]
        command: PhotoCommands,
    },
    /// Show which storage backend is in use
    Backend {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Log something you ate or drank
    Add(FoodAddArgs),
    /// Change a food entry
    Edit(FoodEditArgs),
    /// Delete a food entry by ID
    Delete {
        /// Entry ID to delete
        id: i64,
        /// Date the entry is logged on (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ExerciseCommands {
    /// Log a workout
    Add(ExerciseAddArgs),
    /// Change an exercise entry
    Edit(ExerciseEditArgs),
    /// Delete an exercise entry by ID
    Delete {
        /// Entry ID to delete
        id: i64,
        /// Date the entry is logged on (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PhotoCommands {
    /// Save an entry's photo to a file
    Save {
        /// Entry kind: food or exercise
        kind: EntryKind,
        /// Entry ID
        id: i64,
        /// Where to write the image
        path: PathBuf,
        /// Date the entry is logged on (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.backend)?;
    let store = Store::new(config.capabilities(), config.store_options());

    match cli.command {
        Commands::Day { date, json } => cmd_day(&store, date, json).await,
        Commands::Food { command } => match command {
            FoodCommands::Add(args) => cmd_food_add(&store, &config, args).await,
            FoodCommands::Edit(args) => cmd_food_edit(&store, &config, args).await,
            FoodCommands::Delete { id, date, json } => {
                cmd_food_delete(&store, id, date, json).await
            }
        },
        Commands::Exercise { command } => match command {
            ExerciseCommands::Add(args) => cmd_exercise_add(&store, &config, args).await,
            ExerciseCommands::Edit(args) => cmd_exercise_edit(&store, &config, args).await,
            ExerciseCommands::Delete { id, date, json } => {
                cmd_exercise_delete(&store, id, date, json).await
            }
        },
        Commands::Photo { command } => match command {
            PhotoCommands::Save {
                kind,
                id,
                path,
                date,
                json,
            } => cmd_photo_save(&store, kind, id, &path, date, json).await,
        },
        Commands::Backend { json } => cmd_backend(&store, &config, json).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_food_add() {
        let cli = Cli::try_parse_from([
            "foodlog", "food", "add", "Oatmeal", "--meal", "breakfast", "--time", "08:30",
            "--backend", "memory",
        ])
        .unwrap();
        assert_eq!(cli.backend, Some(BackendChoice::Memory));
        let Commands::Food {
            command: FoodCommands::Add(args),
        } = cli.command
        else {
            panic!("expected food add");
        };
        assert_eq!(args.name, "Oatmeal");
        assert_eq!(args.time.as_deref(), Some("08:30"));
    }

    #[test]
    fn test_rejects_unknown_meal() {
        assert!(Cli::try_parse_from(["foodlog", "food", "add", "Pie", "--meal", "brunch"]).is_err());
    }

    #[test]
    fn test_image_conflicts_with_photo() {
        assert!(
            Cli::try_parse_from([
                "foodlog", "food", "add", "Pie", "--photo", "camera", "--image", "pie.jpg",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_parse_photo_save() {
        let cli =
            Cli::try_parse_from(["foodlog", "photo", "save", "exercise", "4", "out.jpg"]).unwrap();
        let Commands::Photo {
            command: PhotoCommands::Save { kind, id, .. },
        } = cli.command
        else {
            panic!("expected photo save");
        };
        assert_eq!(kind, EntryKind::Exercise);
        assert_eq!(id, 4);
    }
}
