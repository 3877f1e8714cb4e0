use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use std::path::PathBuf;
use todostore::{
    BackendKind, Config, FileBackend, MemoryBackend, SqliteBackend, StorageBackend, TodoItem, TodoStore,
};
use tracing::Level;

const DB_FILE: &str = "todostore.db";

#[derive(Parser)]
#[command(name = "todostore")]
#[command(about = "TodoStore CLI - a todo list persisted to a local key-value store")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the config file (default: <config dir>/todostore/config.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the stored todos (overrides the config file)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Storage backend (overrides the config file)
    #[arg(short, long, value_enum)]
    backend: Option<BackendKind>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a todo at the top of the list
    Add {
        #[arg(required = true)]
        title: Vec<String>,
    },

    /// Mark a todo done, or not done again
    Toggle {
        /// Todo id or a unique prefix of it
        id: String,
    },

    /// Delete a todo
    Delete {
        /// Todo id or a unique prefix of it
        id: String,
    },

    /// Delete every completed todo
    ClearCompleted,

    /// Show the todos visible under the current filter
    List,

    /// Show the current filter, or set it to all, active or completed
    Filter { value: Option<String> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let level = match cli.verbose {
        0 => config.level()?,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let kind = cli.backend.unwrap_or(config.backend);
    let backend = open_backend(kind, cli.store_path, &config)?;

    let mut store = TodoStore::new(backend);
    store.init();
    report_fault(&mut store);

    run(&mut store, cli.command)?;
    report_fault(&mut store);

    Ok(())
}

fn open_backend(kind: BackendKind, store_path: Option<PathBuf>, config: &Config) -> Result<Box<dyn StorageBackend>> {
    let data_dir = || match &store_path {
        Some(path) => Ok(path.clone()),
        None => config.data_dir(),
    };

    let backend: Box<dyn StorageBackend> = match kind {
        BackendKind::File => Box::new(FileBackend::open(data_dir()?)?),
        BackendKind::Sqlite => Box::new(SqliteBackend::open(data_dir()?.join(DB_FILE))?),
        BackendKind::Memory => Box::new(MemoryBackend::new()),
    };
    Ok(backend)
}

fn run<B: StorageBackend>(store: &mut TodoStore<B>, command: Commands) -> Result<()> {
    match command {
        Commands::Add { title } => match store.add_todo(&title.join(" ")) {
            Some(item) => println!("{} {} {}", "Added".green(), item.short_id().dimmed(), item.title),
            None => return Err(eyre!("Title cannot be blank")),
        },
        Commands::Toggle { id } => {
            let id = resolve_id(store, &id)?;
            store.toggle_todo(&id);
            if let Some(item) = store.get(&id) {
                let state = if item.completed { "done".green() } else { "not done".yellow() };
                println!("Marked {} as {}", item.title, state);
            }
        }
        Commands::Delete { id } => {
            let id = resolve_id(store, &id)?;
            let title = store.get(&id).map(|item| item.title.clone()).unwrap_or_default();
            store.delete_todo(&id);
            println!("{} {}", "Deleted".red(), title);
        }
        Commands::ClearCompleted => {
            let removed = store.clear_completed();
            println!("Cleared {} completed todo(s)", removed);
        }
        Commands::List => print_list(store),
        Commands::Filter { value: None } => println!("{}", store.filter()),
        Commands::Filter { value: Some(value) } => {
            if !store.set_filter_str(&value) {
                return Err(eyre!(
                    "Invalid filter: {} (expected one of: all, active, completed)",
                    value
                ));
            }
            println!("Filter set to {}", store.filter());
        }
    }

    Ok(())
}

fn print_list<B: StorageBackend>(store: &TodoStore<B>) {
    let visible = store.filtered_items();

    println!("{} ({})", "Todos".bold(), store.filter());
    if visible.is_empty() {
        println!("  {}", "nothing to show".dimmed());
    }
    for item in visible {
        println!("  {}", format_item(item));
    }

    let remaining = store.remaining_count();
    let noun = if remaining == 1 { "item" } else { "items" };
    println!("{} {} left", remaining, noun);
}

fn format_item(item: &TodoItem) -> String {
    let created = chrono::DateTime::from_timestamp_millis(item.created_at)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());

    if item.completed {
        format!(
            "{} {} {} {}",
            "[x]".green(),
            item.short_id().dimmed(),
            item.title.strikethrough().dimmed(),
            created.dimmed()
        )
    } else {
        format!("[ ] {} {} {}", item.short_id().dimmed(), item.title, created.dimmed())
    }
}

/// Expand a full id or unique id prefix to the stored id
fn resolve_id<B: StorageBackend>(store: &TodoStore<B>, prefix: &str) -> Result<String> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(eyre!("Todo id cannot be empty"));
    }
    if store.get(prefix).is_some() {
        return Ok(prefix.to_string());
    }

    let matches: Vec<&TodoItem> = store
        .items()
        .iter()
        .filter(|item| item.id.starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [item] => Ok(item.id.clone()),
        [] => Err(eyre!("No todo with id {}", prefix)),
        _ => Err(eyre!("Ambiguous id {} matches {} todos", prefix, matches.len())),
    }
}

fn report_fault<B: StorageBackend>(store: &mut TodoStore<B>) {
    if let Some(fault) = store.take_fault() {
        eprintln!("{} storage problem ({})", "warning:".yellow().bold(), fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(ids: &[&str]) -> TodoStore<MemoryBackend> {
        let items: Vec<TodoItem> = ids
            .iter()
            .map(|id| TodoItem {
                id: id.to_string(),
                title: format!("Todo {}", id),
                completed: false,
                created_at: 1000,
            })
            .collect();
        let backend =
            MemoryBackend::with_entries([(todostore::ITEMS_KEY, serde_json::to_vec(&items).unwrap())]);

        let mut store = TodoStore::new(backend);
        store.init();
        store
    }

    #[test]
    fn test_resolve_full_id() {
        let store = store_with(&["abc123", "abc456"]);
        assert_eq!(resolve_id(&store, "abc123").unwrap(), "abc123");
    }

    #[test]
    fn test_resolve_unique_prefix() {
        let store = store_with(&["abc123", "def456"]);
        assert_eq!(resolve_id(&store, "de").unwrap(), "def456");
    }

    #[test]
    fn test_resolve_ambiguous_or_unknown() {
        let store = store_with(&["abc123", "abc456"]);
        assert!(resolve_id(&store, "abc").is_err());
        assert!(resolve_id(&store, "zzz").is_err());
        assert!(resolve_id(&store, "  ").is_err());
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["todostore", "-b", "sqlite", "add", "Buy", "milk"]).unwrap();
        assert_eq!(cli.backend, Some(BackendKind::Sqlite));
        match cli.command {
            Commands::Add { title } => assert_eq!(title, vec!["Buy", "milk"]),
            _ => panic!("expected add"),
        }

        assert!(Cli::try_parse_from(["todostore", "add"]).is_err());
    }

    #[test]
    fn test_run_against_memory_store() {
        let mut store = store_with(&[]);

        run(&mut store, Commands::Add { title: vec!["Buy".into(), "milk".into()] }).unwrap();
        let id = store.items()[0].id.clone();
        assert_eq!(store.items()[0].title, "Buy milk");

        run(&mut store, Commands::Toggle { id: id[..8].to_string() }).unwrap();
        assert!(store.items()[0].completed);

        assert!(run(&mut store, Commands::Filter { value: Some("done".into()) }).is_err());
        run(&mut store, Commands::Filter { value: Some("completed".into()) }).unwrap();
        assert_eq!(store.filter(), todostore::Filter::Completed);

        run(&mut store, Commands::ClearCompleted).unwrap();
        assert!(store.is_empty());
    }
}
