use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use settings_tracker::{DataStore, FileDataStore, SerializationFormat, Serializer};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "track-tool")]
#[command(about = "Inspect and edit settings_tracker state files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List stored keys
    Keys {
        file: PathBuf,
        /// Only keys starting with this prefix, e.g. `Window_main.`
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Decode and print one stored value
    Show {
        file: PathBuf,
        key: String,
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Delete one stored value
    Remove { file: PathBuf, key: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Keys { file, prefix } => list_keys(&file, prefix.as_deref()),
        Command::Show { file, key, format } => show_value(&file, &key, &format),
        Command::Remove { file, key } => remove_value(&file, &key),
    }
}

fn open_existing(path: &Path) -> Result<FileDataStore> {
    if !path.exists() {
        return Err(anyhow!("State file '{}' does not exist", path.display()));
    }
    FileDataStore::open(path)
        .with_context(|| format!("Failed to open state file '{}'", path.display()))
}

fn list_keys(path: &Path, prefix: Option<&str>) -> Result<()> {
    let store = open_existing(path)?;
    let keys = store.keys()?;
    let mut shown = 0usize;
    for key in keys
        .iter()
        .filter(|key| prefix.is_none_or(|prefix| key.starts_with(prefix)))
    {
        println!("{}", key);
        shown += 1;
    }
    println!("{} key(s)", shown);
    Ok(())
}

fn show_value(path: &Path, key: &str, format: &str) -> Result<()> {
    let format: SerializationFormat = format.parse()?;
    let store = open_existing(path)?;
    let bytes = store
        .get_data(key)?
        .ok_or_else(|| anyhow!("Key '{}' not found in '{}'", key, path.display()))?;
    let value = format
        .serializer()
        .deserialize(&bytes)
        .with_context(|| format!("Failed to decode '{}' as {}", key, format))?;

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn remove_value(path: &Path, key: &str) -> Result<()> {
    let store = open_existing(path)?;
    if store.remove_data(key)? {
        println!("Removed '{}'", key);
        Ok(())
    } else {
        Err(anyhow!("Key '{}' not found in '{}'", key, path.display()))
    }
}
