//! Fallback-chain resource selection.
//!
//! Used for background music: ask an optional external catalog, then the
//! internal catalog with progressively looser queries, then an optional
//! generator. An empty chain is a normal outcome ("no music"), never an error.
//!
//! # Example
//!
//! ```ignore
//! use reelforge::selection::{InMemoryCatalog, MusicSelector, SelectionRequest};
//!
//! let selector = MusicSelector::new(retrier)
//!     .with_internal_catalog(Arc::new(InMemoryCatalog::from_file("music.yaml")?))
//!     .with_seed(7);
//!
//! let request = SelectionRequest::new(60.0).with_tags(["calm", "piano"]);
//! if let Some(result) = selector.select(&request).await {
//!     println!("{} from {}", result.track.url, result.source);
//! }
//! ```

pub mod catalog;
pub mod scoring;
pub mod selector;

pub use crate::jobs::SelectionSource;
pub use catalog::{CatalogError, InMemoryCatalog};
pub use scoring::{duration_score, pick_top, score, tag_score, DurationWindow};
pub use selector::{MusicSelector, SelectionRequest, SelectionResult};
