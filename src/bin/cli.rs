//! twinkv CLI
//!
//! Command-line access to a local twinkv store.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use twinkv::{Config, Store};

/// twinkv CLI
#[derive(Parser, Debug)]
#[command(name = "twinkv")]
#[command(about = "Inspect and edit a twinkv store")]
#[command(version)]
struct Args {
    /// Store directory
    #[arg(short, long, default_value = "./twinkv_data")]
    data_dir: String,

    /// Fail instead of creating a missing store
    #[arg(long)]
    no_create: bool,

    /// Forward engine diagnostics to the log at info level
    #[arg(long)]
    log: bool,

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
    Put {
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

    /// List entries in key order
    Scan {
        /// Start at the first key >= this one
        #[arg(short, long)]
        from: Option<String>,

        /// Stop after this many entries
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Close and reopen the store
    Flush,

    /// Show which engine serves the store
    Info,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,twinkv=info"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> twinkv::Result<()> {
    let mut builder = Config::builder()
        .path(&args.data_dir)
        .create_if_missing(!args.no_create);
    if args.log {
        builder = builder.log_sink(|message| tracing::info!("FROM DATABASE LOG: {}", message));
    }

    let store = Store::open(builder.build())?;

    match args.command {
        Commands::Get { key } => match store.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(not found)"),
        },
        Commands::Put { key, value } => {
            store.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            store.remove(key.as_bytes())?;
            println!("OK");
        }
        Commands::Scan { from, limit } => {
            let cursor = match from {
                Some(from) => store.search(from.as_bytes())?,
                None => store.load_all()?,
            };
            for entry in cursor.take(limit) {
                let entry = entry?;
                println!(
                    "{}\t{}",
                    String::from_utf8_lossy(entry.key()),
                    String::from_utf8_lossy(entry.value())
                );
            }
        }
        Commands::Flush => {
            store.flush()?;
            println!("OK");
        }
        Commands::Info => {
            let engine = store
                .engine_kind()
                .map(|kind| kind.to_string())
                .unwrap_or_else(|| "closed".to_string());
            println!("twinkv {}", twinkv::VERSION);
            println!("path:   {}", store.config().path.display());
            println!("engine: {}", engine);
            println!("native: {}", twinkv::NativeEngine::is_available());
        }
    }

    store.close()
}
