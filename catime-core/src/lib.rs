//! Cat image generation engine.
//!
//! This crate provides:
//! - Weighted character selection with cooldown and seasonal windows
//! - Randomized style picks and prompt assembly
//! - Tolerant parsing of free-form model replies
//! - A two-tier published catalog (index + monthly detail shards) with
//!   conflict-retried publishing
//!
//! # Quick Start
//!
//! ```ignore
//! use catime_core::{run_once, GitRemote, NanobananaGenerator, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig::new(".").with_release_base_url(
//!         "https://github.com/yazelin/catime/releases/download/cats",
//!     );
//!     let generator = NanobananaGenerator::from_env()?;
//!     let mut remote = GitRemote::new(".");
//!
//!     let report = run_once(
//!         &config,
//!         &generator,
//!         &mut remote,
//!         &mut rand::thread_rng(),
//!         chrono::Utc::now(),
//!     )
//!     .await?;
//!     println!("Cat #{}", report.number);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod character;
pub mod generate;
pub mod parse;
pub mod prompt;
pub mod publish;
pub mod run;
pub mod select;
pub mod style;
pub mod testing;

// Primary public API
pub use catalog::{Catalog, CatalogError, CatalogIndexEntry, EntryStatus, NewCatalogEntry};
pub use character::{CharacterProfile, CharacterRegistry, Season};
pub use generate::{Generator, NanobananaGenerator};
pub use parse::{parse_ai_response, parse_ai_response_generic, ParsedReply};
pub use publish::{GitRemote, PublishError, Remote};
pub use run::{run_once, RunConfig, RunError, RunReport};
pub use select::{SelectedCharacter, Selector};
pub use style::{StylePreset, StyleReference};
