mod commands;
mod config;
mod food_api;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{EnvFilter, fmt};

use crate::commands::{
    cmd_add, cmd_barcode, cmd_day, cmd_export, cmd_goals_set, cmd_goals_show, cmd_history,
    cmd_import, cmd_log, cmd_meal, cmd_prefs, cmd_remove, cmd_repair, cmd_search, parse_date,
    parse_quantity,
};
use crate::config::Config;
use crate::food_api::FoodApiClient;
use nutrik_core::Tracker;
use nutrik_core::models::{GoalsUpdate, NewFoodLogEntry};

#[derive(Parser)]
#[command(
    name = "nutrik",
    version,
    about = "Daily calorie and macro tracker",
    long_about = "Log what you eat, see today's totals against your goals.\n\
                  Everything is stored locally in a single SQLite file."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's entries, totals and remaining goals
    Today {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show entries and totals for a date
    Day {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show totals for the last N days
    History {
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search the food database
    Search {
        /// Search query
        query: String,
        /// Result page
        #[arg(long, default_value = "0")]
        page: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search for a food and log it
    Log {
        /// Food name to search for
        query: String,
        /// Number of servings (e.g. "1", "1.5", "2x")
        #[arg(short, long, default_value = "1")]
        quantity: String,
        /// Serving number as listed by the serving table (default: the food's default serving)
        #[arg(short, long)]
        serving: Option<usize>,
        /// Search result page
        #[arg(long, default_value = "0")]
        page: u32,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Look up a food by barcode and log it
    Barcode {
        /// Barcode number
        code: String,
        /// Number of servings
        #[arg(short, long, default_value = "1")]
        quantity: String,
        /// Serving number (default: the food's default serving)
        #[arg(short, long)]
        serving: Option<usize>,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a food with known nutrition values
    Add {
        /// Food name
        name: String,
        /// Calories
        #[arg(long)]
        calories: f64,
        /// Protein in grams
        #[arg(long, default_value = "0")]
        protein: f64,
        /// Carbs in grams
        #[arg(long, default_value = "0")]
        carbs: f64,
        /// Fat in grams
        #[arg(long, default_value = "0")]
        fat: f64,
        /// Serving description
        #[arg(long, default_value = "1 serving")]
        serving: String,
        /// Brand name
        #[arg(long)]
        brand: Option<String>,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Analyze a meal photo and log its ingredients
    Meal {
        /// File holding the photo as base64 text
        picture: PathBuf,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Show the recognized ingredients without logging them
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a logged entry by ID
    Remove {
        /// Entry ID
        entry_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change daily goals
    Goals {
        #[command(subcommand)]
        command: GoalsCommands,
    },
    /// Show or change display preferences
    Prefs {
        /// light, dark or system
        #[arg(long)]
        theme: Option<String>,
        /// metric or imperial
        #[arg(long)]
        units: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild a day's totals from its entries
    Repair {
        /// Date (YYYY-MM-DD, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export all data as JSON
    Export {
        /// Output file (default: stdout)
        file: Option<PathBuf>,
    },
    /// Import data from a JSON export
    Import {
        /// Export file to read
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalsCommands {
    /// Show current goals
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update one or more goals; today's targets follow
    Set {
        /// Daily calories
        #[arg(long)]
        calories: Option<f64>,
        /// Daily protein in grams
        #[arg(long)]
        protein: Option<f64>,
        /// Daily carbs in grams
        #[arg(long)]
        carbs: Option<f64>,
        /// Daily fat in grams
        #[arg(long)]
        fat: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
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
    let config = Config::load()?;
    let tracker = Tracker::open(&config.db_path)?;
    let api = FoodApiClient::new(&config.api_url)?;

    let result = match cli.command {
        Commands::Today { json } => cmd_day(&tracker, tracker.today(), json),
        Commands::Day { date, json } => cmd_day(&tracker, parse_date(Some(date))?, json),
        Commands::History { days, json } => cmd_history(&tracker, days, json),
        Commands::Search { query, page, json } => cmd_search(&api, &query, page, json).await,
        Commands::Log {
            query,
            quantity,
            serving,
            page,
            date,
            json,
        } => {
            let quantity = parse_quantity(&quantity)?;
            let date = parse_date(date)?;
            cmd_log(&tracker, &api, &query, quantity, serving, page, date, json).await
        }
        Commands::Barcode {
            code,
            quantity,
            serving,
            date,
            json,
        } => {
            let quantity = parse_quantity(&quantity)?;
            let date = parse_date(date)?;
            cmd_barcode(&tracker, &api, &code, quantity, serving, date, json).await
        }
        Commands::Add {
            name,
            calories,
            protein,
            carbs,
            fat,
            serving,
            brand,
            date,
            json,
        } => {
            let new = NewFoodLogEntry {
                date: Some(parse_date(date)?),
                food_name: name,
                brand_name: brand,
                serving_size: serving,
                calories,
                protein,
                carbs,
                fat,
                ..NewFoodLogEntry::default()
            };
            cmd_add(&tracker, new, json)
        }
        Commands::Meal {
            picture,
            date,
            dry_run,
            json,
        } => cmd_meal(&tracker, &api, &picture, parse_date(date)?, dry_run, json).await,
        Commands::Remove { entry_id, json } => cmd_remove(&tracker, &entry_id, json),
        Commands::Goals { command } => match command {
            GoalsCommands::Show { json } => cmd_goals_show(&tracker, json),
            GoalsCommands::Set {
                calories,
                protein,
                carbs,
                fat,
                json,
            } => {
                let update = GoalsUpdate {
                    calorie_goal: calories,
                    protein_goal: protein,
                    carbs_goal: carbs,
                    fat_goal: fat,
                };
                cmd_goals_set(&tracker, &update, json)
            }
        },
        Commands::Prefs { theme, units, json } => {
            cmd_prefs(&tracker, theme.as_deref(), units.as_deref(), json)
        }
        Commands::Repair { date, json } => cmd_repair(&tracker, parse_date(date)?, json),
        Commands::Export { file } => cmd_export(&tracker, file.as_deref()),
        Commands::Import { file, json } => cmd_import(&tracker, &file, json),
    };

    tracker.close()?;
    result
}
