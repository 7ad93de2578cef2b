mod api;
mod db;
mod editor;
mod error;
mod list;
mod models;
#[cfg(test)]
mod testing;
mod tui;

use anyhow::{Context, Result, anyhow};
use api::{DEFAULT_API_URL, DEFAULT_BATCH_SIZE, RandomUserClient};
use clap::{Parser, Subcommand};
use db::Database;
use list::CandidateList;
use models::{Candidate, Filter, Status};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "candidates")]
#[command(about = "Review job candidates - fetch, filter, annotate, approve or reject")]
struct Cli {
    /// Path to the candidate database
    #[arg(long, global = true, env = "CANDIDATES_DB")]
    db: Option<PathBuf>,

    /// People-generator endpoint new candidates are fetched from
    #[arg(long, global = true, env = "CANDIDATES_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Number of candidates fetched per request
    #[arg(long, global = true, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: u32,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Browse and review candidates interactively
    Browse,

    /// List candidates
    List {
        /// Filter by status (all, pending, approved, rejected)
        #[arg(short, long, default_value = "all")]
        status: Filter,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show candidate details
    Show {
        /// Candidate ID
        id: i64,
    },

    /// Fetch and store a batch of new candidates
    Fetch,

    /// Approve a candidate (approving again resets to pending)
    Approve {
        /// Candidate ID
        id: i64,
    },

    /// Reject a candidate (rejecting again resets to pending)
    Reject {
        /// Candidate ID
        id: i64,
    },

    /// Replace a candidate's note
    Note {
        /// Candidate ID
        id: i64,

        /// New note text (empty clears it)
        text: String,
    },
}

/// Settings resolved from flags, environment and platform defaults.
struct Config {
    db_path: PathBuf,
    api_url: String,
    batch_size: u32,
    verbose: bool,
}

impl Config {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            db_path: cli.db.clone().unwrap_or_else(Database::default_path),
            api_url: cli.api_url.clone(),
            batch_size: cli.batch_size,
            verbose: cli.verbose,
        }
    }

    fn log_path(&self) -> PathBuf {
        self.db_path.with_file_name("candidates.log")
    }
}

fn init_logging(config: &Config, to_file: bool) -> Result<()> {
    let default = if config.verbose { "candidates=debug" } else { "candidates=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if to_file {
        // the terminal belongs to the browser, so logs go next to the database
        let path = config.log_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .try_init()
            .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;
    } else {
        builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;
    }
    Ok(())
}

fn open_database(path: &Path) -> Result<Database> {
    let db = Database::open(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(db)
}

fn load_list(db: &Database) -> Result<CandidateList> {
    db.ensure_initialized()?;
    let mut list = CandidateList::new();
    list.load(db).context("Failed to load candidates")?;
    Ok(list)
}

/// Load the list and select candidate `id` in the unfiltered view.
fn select_by_id(db: &Database, id: i64) -> Result<CandidateList> {
    let mut list = load_list(db)?;
    let index = list
        .position_of(id)
        .ok_or_else(|| anyhow!("Candidate #{} not found", id))?;
    if list.selected_index() != Some(index) {
        list.select_candidate(index);
    }
    Ok(list)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli);
    init_logging(&config, matches!(cli.command, Commands::Browse))?;

    let db = open_database(&config.db_path)?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Browse => {
            db.ensure_initialized()?;
            let source = RandomUserClient::new(&config.api_url, config.batch_size)?;
            tui::run_browse(&db, &source)?;
        }

        Commands::List { status, json } => {
            let mut list = load_list(&db)?;
            list.select_filter(status);
            let visible: Vec<&Candidate> = list.visible().into_iter().map(|(_, c)| c).collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&visible)?);
            } else if visible.is_empty() {
                println!("No candidates found.");
            } else {
                println!("{}", list.announcement());
                println!("{:<6} {:<9} {:<26} {:<7} {:>4}  {:<30}", "ID", "STATUS", "NAME", "GENDER", "AGE", "LOCATION");
                println!("{}", "-".repeat(88));
                for candidate in visible {
                    println!(
                        "{:<6} {:<9} {:<26} {:<7} {:>4}  {:<30}",
                        candidate.id.map(|id| id.to_string()).unwrap_or_default(),
                        candidate.status.as_str(),
                        truncate(&candidate.name, 24),
                        truncate(&candidate.gender, 7),
                        candidate.age,
                        truncate(&candidate.location, 30)
                    );
                }
            }
        }

        Commands::Show { id } => {
            let list = load_list(&db)?;
            match list.position_of(id).map(|i| &list.candidates()[i]) {
                Some(candidate) => print_candidate(candidate),
                None => println!("Candidate #{} not found.", id),
            }
        }

        Commands::Fetch => {
            let mut list = load_list(&db)?;
            let before = list.candidates().len();
            let source = RandomUserClient::new(&config.api_url, config.batch_size)?;
            println!("Finding new candidates at {}...", config.api_url);
            list.find_new_candidates(&source, &db)
                .context("Failed to find new candidates")?;
            let added = &list.candidates()[before..];
            println!("Added {} candidate(s):", added.len());
            for candidate in added {
                println!("  #{} - {}", candidate.id.unwrap_or_default(), candidate.name);
            }
        }

        Commands::Approve { id } => set_status(&db, id, Status::Approved)?,

        Commands::Reject { id } => set_status(&db, id, Status::Rejected)?,

        Commands::Note { id, text } => {
            let mut list = select_by_id(&db, id)?;
            list.save_note(&text, &db)?;
            if text.is_empty() {
                println!("Cleared note for candidate #{}.", id);
            } else {
                println!("Saved note for candidate #{}.", id);
            }
        }
    }

    Ok(())
}

fn set_status(db: &Database, id: i64, status: Status) -> Result<()> {
    let mut list = select_by_id(db, id)?;
    list.save_status(status, db)?;
    let (_, candidate) = list
        .selected()
        .ok_or_else(|| anyhow!("Candidate #{} lost its selection", id))?;
    println!("Candidate #{} ({}) is now {}.", id, candidate.name, candidate.status);
    Ok(())
}

fn print_candidate(candidate: &Candidate) {
    println!("Candidate #{}", candidate.id.unwrap_or_default());
    println!("Name: {}", candidate.name);
    println!("Status: {}", candidate.status);
    println!("Gender: {}", candidate.gender);
    println!("Age: {}", candidate.age);
    if !candidate.location.is_empty() {
        println!("Location: {}", candidate.location);
    }
    println!("Applied: {}", candidate.application_date);
    if !candidate.picture.large.is_empty() {
        println!("Photo: {}", candidate.picture.large);
    }
    if !candidate.note.is_empty() {
        println!("\n--- Note ---\n{}", candidate.note);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("Abigail Carter", 20), "Abigail Carter");
        assert_eq!(truncate("Bárbara Fogaça da Silva", 10), "Bárbara...");
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["candidates", "list"]);
        assert_eq!(cli.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(cli.api_url, DEFAULT_API_URL);
        assert!(matches!(
            cli.command,
            Commands::List { status: Filter::All, json: false }
        ));

        let cli = Cli::parse_from(["candidates", "--db", "/tmp/c.db", "list", "--status", "approved"]);
        let config = Config::from_cli(&cli);
        assert_eq!(config.db_path, PathBuf::from("/tmp/c.db"));
        assert_eq!(config.log_path(), PathBuf::from("/tmp/candidates.log"));
        assert!(matches!(cli.command, Commands::List { status: Filter::Approved, .. }));
    }

    #[test]
    fn test_select_by_id_and_status_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_database(&dir.path().join("candidates.db")).unwrap();
        db.init().unwrap();
        let saved = db::CandidateStore::add_all(
            &db,
            vec![testing::candidate("A"), testing::candidate("B")],
        )
        .unwrap();
        let id = saved[1].id.unwrap();

        set_status(&db, id, Status::Rejected).unwrap();
        let list = select_by_id(&db, id).unwrap();
        assert_eq!(list.selected().unwrap().1.status, Status::Rejected);

        set_status(&db, id, Status::Rejected).unwrap();
        let list = select_by_id(&db, id).unwrap();
        assert_eq!(list.selected().unwrap().1.status, Status::Pending);

        // the first candidate is preselected on load; selecting it must not toggle it off
        let first = saved[0].id.unwrap();
        let list = select_by_id(&db, first).unwrap();
        assert_eq!(list.selected_index(), Some(0));

        assert!(select_by_id(&db, 9999).is_err());
    }
}
