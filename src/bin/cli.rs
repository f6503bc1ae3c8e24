//! caskdb CLI
//!
//! Command-line interface for working with a caskdb data file.

use std::path::{Path, PathBuf};

use caskdb::log::{DataFile, LogReader};
use caskdb::{CaskError, Config, Engine, Result, SyncStrategy};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// caskdb CLI
#[derive(Parser, Debug)]
#[command(name = "caskdb-cli")]
#[command(about = "CLI for the caskdb key-value store")]
#[command(version)]
struct Args {
    /// Data file
    #[arg(short, long, default_value = "./caskdb.log")]
    file: PathBuf,

    /// Permission bits (octal) for a newly created data file
    #[arg(short, long, default_value = "600", value_parser = parse_mode)]
    mode: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List live keys
    Keys,

    /// Print every physical record in the log, including stale and deleted ones
    Dump,

    /// Run a short put/get/delete walkthrough
    Demo,
}

fn parse_mode(s: &str) -> std::result::Result<u32, String> {
    u32::from_str_radix(s.trim_start_matches("0o"), 8)
        .map_err(|e| format!("invalid octal mode '{}': {}", s, e))
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caskdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("caskdb-cli v{} on {}", caskdb::VERSION, args.file.display());

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    if let Commands::Dump = args.command {
        return dump(&args.file);
    }

    let config = Config::builder()
        .path(&args.file)
        .permissions(args.mode)
        .sync_strategy(SyncStrategy::EveryWrite)
        .build();
    let engine = Engine::open(config)?;

    match args.command {
        Commands::Get { key } => {
            let value = engine.get(key.as_bytes())?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Commands::Set { key, value } => {
            engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            engine.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Keys => {
            for key in engine.keys() {
                println!("{}", String::from_utf8_lossy(&key));
            }
        }
        Commands::Demo => demo(&engine)?,
        Commands::Dump => dump(&args.file)?,
    }

    engine.close()
}

/// Walk the log without building an index or touching the file
fn dump(path: &Path) -> Result<()> {
    let file = DataFile::open_read_only(path)?;

    for record in LogReader::new(&file)? {
        let (offset, entry) = record?;
        let state = if entry.is_deleted() { "deleted" } else { "live" };
        println!("{:>10} {:>7} {}", offset, state, entry);
    }

    Ok(())
}

fn demo(engine: &Engine) -> Result<()> {
    let pairs = [("hello", "world"), ("Dire", "Straits"), ("Ella", "Fitz")];

    for (key, value) in pairs {
        engine.put(key.as_bytes(), value.as_bytes())?;
    }

    for (key, _) in pairs {
        let value = engine.get(key.as_bytes())?;
        println!("Key: {}. Value: {}", key, String::from_utf8_lossy(&value));
    }

    match engine.get(b"NOTHINGATALL") {
        Err(e @ CaskError::KeyNotFound(_)) => println!("{}", e),
        Err(e) => return Err(e),
        Ok(value) => println!("unexpected value: {}", String::from_utf8_lossy(&value)),
    }

    engine.delete(b"hello")?;
    println!("Deleted hello; {} live keys remain", engine.len());

    Ok(())
}
