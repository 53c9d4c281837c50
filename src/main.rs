//! Scan Inventory - command line front end
//!
//! Reads decoded symbols from stdin (one per line) and records them, or runs
//! a single editing/reporting command against the stored inventory.

use clap::{Parser, Subcommand};
use scan_inventory::{
    Category, CategoryId, Config, ConsistencyCoordinator, CoreEvent, DecodeEvent, EntryId,
    InventoryError, ScanDebouncer, ScanOutcome, Storage,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Barcode scan inventory - counts scans per category and keeps them on disk
#[derive(Parser, Debug)]
#[command(name = "scan_inventory")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding the key-value store, data files and exports
    #[arg(short, long, default_value_os_t = scan_inventory::config::default_data_dir())]
    data_dir: PathBuf,

    /// Milliseconds before the scanner accepts the next code
    #[arg(long, default_value_t = 200)]
    cooldown_ms: u64,

    /// Milliseconds an accepted code stays highlighted
    #[arg(long, default_value_t = 2000)]
    display_ms: u64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read decoded codes from stdin and record them (default)
    Scan {
        /// Category id or name to file scans under
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List categories
    Categories,
    /// Create a category
    AddCategory { name: String },
    /// Rename a category
    RenameCategory { category: String, name: String },
    /// Remove a category; its entries become uncategorized
    RemoveCategory { category: String },
    /// List entries
    List {
        /// Only entries in this category (id or name)
        #[arg(short, long, conflicts_with = "uncategorized")]
        category: Option<String>,
        /// Only entries without a category
        #[arg(long)]
        uncategorized: bool,
    },
    /// Replace an entry's count
    SetCount { entry: String, count: u32 },
    /// Move an entry to another category, or to none if omitted
    SetCategory {
        entry: String,
        category: Option<String>,
    },
    /// Remove an entry
    Remove { entry: String },
    /// Print all entries grouped by category
    Report,
    /// Print the given categories with their entries
    Share {
        #[arg(required = true)]
        categories: Vec<String>,
    },
    /// Write all entries to a timestamped file in the exports folder
    Export {
        #[arg(long, default_value = "barcodes")]
        prefix: String,
    },
    /// List export files
    Exports,
    /// Delete one export file by name
    DeleteExport { name: String },
    /// Delete all export files
    ClearExports,
    /// Delete all categories and entries
    Clear,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config {
        data_dir: args.data_dir,
        rearm_cooldown: Duration::from_millis(args.cooldown_ms),
        display_window: Duration::from_millis(args.display_ms),
    };

    log::info!("Starting scan_inventory...");
    log::info!("Data directory: {}", config.data_dir.display());

    let storage = match Storage::open(&config) {
        Ok(storage) => storage,
        Err(e) => {
            log::error!("Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };

    let mut coordinator = ConsistencyCoordinator::open(storage.store.clone()).await;
    for warning in coordinator.startup_warnings() {
        eprintln!("warning: {}", warning);
    }

    let command = args.command.unwrap_or(Command::Scan { category: None });
    let result = run(command, &mut coordinator, &storage, &config).await;

    // Final save happens on every exit path
    let saved = coordinator.shutdown().await;

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
    if saved.is_err() {
        std::process::exit(1);
    }
}

async fn run(
    command: Command,
    coordinator: &mut ConsistencyCoordinator,
    storage: &Storage,
    config: &Config,
) -> scan_inventory::Result<()> {
    match command {
        Command::Scan { category } => {
            let category = match category {
                Some(key) => Some(find_category(coordinator, &key)?.id),
                None => None,
            };
            run_scanner(coordinator, category, config).await?;
        }
        Command::Categories => {
            for category in coordinator.categories() {
                let count = coordinator.entries_in(Some(&category.id)).len();
                println!("{}\t{}\t({} entries)", category.id, category.name, count);
            }
        }
        Command::AddCategory { name } => {
            let category = coordinator.add_category(&name).await?;
            println!("{}\t{}", category.id, category.name);
        }
        Command::RenameCategory { category, name } => {
            let id = find_category(coordinator, &category)?.id;
            let category = coordinator.rename_category(&id, &name).await?;
            println!("{}\t{}", category.id, category.name);
        }
        Command::RemoveCategory { category } => {
            let id = find_category(coordinator, &category)?.id;
            let detached = coordinator.remove_category(&id).await?;
            println!("Removed category, {} entries now uncategorized", detached);
        }
        Command::List {
            category,
            uncategorized,
        } => {
            let names = coordinator.category_snapshot();
            let entries = if uncategorized {
                coordinator.entries_in(None)
            } else if let Some(key) = category {
                let id = find_category(coordinator, &key)?.id;
                coordinator.entries_in(Some(&id))
            } else {
                coordinator.entries().to_vec()
            };
            for entry in entries {
                let name = names
                    .name_of(entry.category_id.as_ref())
                    .unwrap_or(scan_inventory::export::UNCATEGORIZED_LABEL);
                println!("{}\t{}\tx{}\t{}", entry.id, entry.value, entry.count, name);
            }
        }
        Command::SetCount { entry, count } => {
            coordinator.set_count(&EntryId::from(entry), count).await?;
        }
        Command::SetCategory { entry, category } => {
            let category = match category {
                Some(key) => Some(find_category(coordinator, &key)?.id),
                None => None,
            };
            coordinator
                .set_category(&EntryId::from(entry), category)
                .await?;
        }
        Command::Remove { entry } => {
            if !coordinator.remove_entry(&EntryId::from(entry.as_str())).await {
                println!("No entry {}", entry);
            }
        }
        Command::Report => print!("{}", coordinator.report()),
        Command::Share { categories } => {
            let ids = categories
                .iter()
                .map(|key| find_category(coordinator, key).map(|c| c.id))
                .collect::<scan_inventory::Result<Vec<CategoryId>>>()?;
            print!("{}", coordinator.category_share(&ids)?);
        }
        Command::Export { prefix } => {
            let path = storage
                .files
                .save_export_file(&coordinator.export_text(), &prefix)?;
            println!("Saved to {}", path.display());
        }
        Command::Exports => {
            for path in storage.files.export_files()? {
                println!("{}", path.display());
            }
        }
        Command::DeleteExport { name } => {
            if !storage.files.delete_export_file(&name)? {
                println!("No export named {}", name);
            }
        }
        Command::ClearExports => {
            let removed = storage.files.clear_exports()?;
            println!("Removed {} export file(s)", removed);
        }
        Command::Clear => coordinator.clear_all().await?,
    }
    Ok(())
}

/// Feed stdin lines through the debouncer until EOF or Ctrl-C
async fn run_scanner(
    coordinator: &mut ConsistencyCoordinator,
    category: Option<CategoryId>,
    config: &Config,
) -> scan_inventory::Result<()> {
    let mut events = coordinator.subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                CoreEvent::Warning(warning) => eprintln!("warning: {}", warning),
                CoreEvent::Inventory(snapshot) => log::debug!(
                    "Inventory: {} entries, {} scans",
                    snapshot.entries.len(),
                    snapshot.total_count()
                ),
                CoreEvent::Categories(snapshot) => {
                    log::debug!("Categories: {}", snapshot.categories.len())
                }
            }
        }
    });

    let (display_tx, mut display_rx) = unbounded_channel();
    let mut debouncer = ScanDebouncer::new(config.rearm_cooldown, config.display_window)
        .with_display_channel(display_tx);
    debouncer.select_category(category);

    let mut lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    log::info!("Reading codes from stdin (Ctrl-D or Ctrl-C to stop)");

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                let line = line?;
                let Some(scan) = debouncer.on_decode(DecodeEvent::now(line)) else {
                    continue;
                };
                match coordinator.record_accepted(&scan).await? {
                    ScanOutcome::Incremented { count, .. } => println!("{} x{}", scan.value, count),
                    ScanOutcome::Created { .. } => println!("{} (new)", scan.value),
                }
            }
            Some(expired) = display_rx.recv() => {
                log::debug!("Display expired for {}", expired.value);
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping scanner");
                break;
            }
        }
    }
    Ok(())
}

/// Forward lines from `reader` on a plain thread.
///
/// A read blocked on the terminal never holds up runtime shutdown; the thread
/// is simply abandoned when the process exits.
fn spawn_line_reader<R>(reader: R) -> UnboundedReceiver<std::io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = unbounded_channel();
    std::thread::spawn(move || {
        for line in reader.lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Resolve a category by id, or by case-insensitive name
fn find_category(coordinator: &ConsistencyCoordinator, key: &str) -> scan_inventory::Result<Category> {
    coordinator
        .categories()
        .iter()
        .find(|c| c.id.as_str() == key)
        .or_else(|| {
            coordinator
                .categories()
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(key.trim()))
        })
        .cloned()
        .ok_or_else(|| InventoryError::NotFound {
            kind: "Category",
            id: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn line_reader_forwards_lines_then_closes() {
        let mut lines = spawn_line_reader(Cursor::new(" AB\r\n0012345\n\n"));

        assert_eq!(lines.recv().await.unwrap().unwrap(), " AB");
        assert_eq!(lines.recv().await.unwrap().unwrap(), "0012345");
        assert_eq!(lines.recv().await.unwrap().unwrap(), "");
        assert!(lines.recv().await.is_none());
    }

    /// Reader that blocks until its sender goes away, like an idle terminal
    struct IdleInput(std::sync::mpsc::Receiver<Vec<u8>>);

    impl std::io::Read for IdleInput {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn blocked_reader_does_not_hold_up_runtime_shutdown() {
        let (keep_open, pipe) = std::sync::mpsc::channel();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let _lines = spawn_line_reader(std::io::BufReader::new(IdleInput(pipe)));
        });

        // Returns while the read is still pending
        drop(runtime);
        drop(keep_open);
    }
}
