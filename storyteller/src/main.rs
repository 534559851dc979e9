//! Storyteller: play a model-narrated story from the terminal.
//!
//! ```bash
//! cargo run -p storyteller -- --store story.json --assets ./assets
//! ```
//!
//! Reads `OPENAI_API_KEY` (and optionally `OPENAI_API_BASE`) plus the
//! `STORY_*` settings from the environment or a `.env` file.

mod headless;

use std::path::PathBuf;
use std::sync::Arc;
use story_core::{JsonFileStorage, MemoryStorage, Storage, StoryConfig, StorySession};
use tracing_subscriber::EnvFilter;

/// Command-line options.
#[derive(Debug, Default)]
struct Args {
    store: Option<PathBuf>,
    assets: Option<PathBuf>,
    help: bool,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--store" => {
                let value = iter.next().ok_or("--store needs a path")?;
                parsed.store = Some(PathBuf::from(value));
            }
            "--assets" => {
                let value = iter.next().ok_or("--assets needs a directory")?;
                parsed.assets = Some(PathBuf::from(value));
            }
            "--help" | "-h" => parsed.help = true,
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    Ok(parsed)
}

fn print_help() {
    println!("storyteller - a model-narrated adventure");
    println!();
    println!("USAGE:");
    println!("    storyteller [--store <path>] [--assets <dir>]");
    println!();
    println!("OPTIONS:");
    println!("    --store <path>   Keep the storyline in a JSON file (default: memory only)");
    println!("    --assets <dir>   Directory for character portraits (default: STORY_ASSETS_DIR or ./assets)");
    println!("    -h, --help       Show this help");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw_args: Vec<String> = std::env::args().collect();
    let args = match parse_args(&raw_args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            print_help();
            std::process::exit(2);
        }
    };
    if args.help {
        print_help();
        return Ok(());
    }

    let mut config = StoryConfig::from_env();
    if let Some(dir) = args.assets {
        config = config.with_assets_dir(dir);
    }

    let storage: Arc<dyn Storage> = match args.store {
        Some(ref path) => Arc::new(JsonFileStorage::open(path).await?),
        None => Arc::new(MemoryStorage::new()),
    };
    let resuming = !storage.get_storyline().await?.is_empty();

    let session = match StorySession::from_env(&config, storage) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Set OPENAI_API_KEY in a .env file or with: export OPENAI_API_KEY=your_key_here");
            std::process::exit(1);
        }
    };

    tracing::info!(assets = %config.assets_dir.display(), resuming, "Starting storyteller");
    headless::run(session, resuming).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("storyteller")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_args() {
        let parsed = parse_args(&args(&["--store", "s.json", "--assets", "/tmp/a"])).unwrap();
        assert_eq!(parsed.store, Some(PathBuf::from("s.json")));
        assert_eq!(parsed.assets, Some(PathBuf::from("/tmp/a")));
        assert!(!parsed.help);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&args(&["--store"])).is_err());
        assert!(parse_args(&args(&["--verbose"])).is_err());
        assert!(parse_args(&args(&["-h"])).unwrap().help);
    }
}
