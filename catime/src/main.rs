//! Catime generation job.
//!
//! Runs one full cycle (select a character and styles, ideate, render,
//! append to the catalog, publish) and exits. Scheduled hourly by CI,
//! which also uploads the rendered file to the release store afterwards.
//!
//! Environment:
//! - `GEMINI_API_KEY` - generation capability credential (required)
//! - `CATIME_DATA_DIR` - catalog/registry root (default: current dir)
//! - `CATIME_OUTPUT_DIR` - where rendered images land (default: /tmp)
//! - `CATIME_RELEASE_BASE_URL` - public URL base for uploaded artifacts
//! - `RUST_LOG` - log filter

use catime_core::{run_once, GitRemote, NanobananaGenerator, RunConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let generator = match NanobananaGenerator::from_env() {
        Ok(generator) => generator,
        Err(_) => {
            eprintln!("Error: GEMINI_API_KEY environment variable not set.");
            eprintln!("Please set it in .env file or with: export GEMINI_API_KEY=your_key_here");
            std::process::exit(1);
        }
    };

    let data_dir = std::env::var("CATIME_DATA_DIR").unwrap_or_else(|_| ".".to_string());
    let mut config = RunConfig::new(&data_dir);
    if let Ok(dir) = std::env::var("CATIME_OUTPUT_DIR") {
        config = config.with_output_dir(dir);
    }
    if let Ok(base) = std::env::var("CATIME_RELEASE_BASE_URL") {
        config = config.with_release_base_url(base);
    }

    let mut remote = GitRemote::new(&data_dir).with_identity(
        "github-actions[bot]",
        "github-actions[bot]@users.noreply.github.com",
    );

    let now = chrono::Utc::now();
    println!(
        "Generating cat for {}...",
        now.format(catime_core::catalog::TIMESTAMP_FORMAT)
    );

    match run_once(&config, &generator, &mut remote, &mut rand::thread_rng(), now).await {
        Ok(report) if report.succeeded() => {
            println!("Model used: {}", report.model);
            if let Some(url) = &report.url {
                println!("Image URL: {url}");
            }
            println!("Done! Cat #{}", report.number);
        }
        Ok(report) => {
            // Failure is already recorded in the catalog; the non-zero exit
            // tells the scheduler this run produced no image.
            eprintln!(
                "Generation failed: {}",
                report.error.as_deref().unwrap_or("unknown error")
            );
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
