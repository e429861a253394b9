//! # Data Loader Crate
//!
//! This crate reads raw interaction logs: one line per event, naming a user
//! and an item, optionally followed by a timestamp.
//!
//! ## Main Components
//!
//! - **types**: `RawEvent`, `EventLog` and `LogFormat`
//! - **parser**: Parse delimited log files into events
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{parse_events, EventLog, LogFormat};
//! use std::path::Path;
//!
//! let format = LogFormat::default().with_delimiter("\t");
//! let log = EventLog::new(parse_events(Path::new("data/plays.tsv"), &format)?);
//!
//! let (users, items) = log.counts();
//! println!("{} events from {} users over {} items", log.len(), users, items);
//! ```

// Public modules
pub mod error;
pub mod types;
pub mod parser;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use parser::{parse_events, parse_events_from_str};
pub use types::{EventLog, ItemId, LogFormat, RawEvent, Timestamp, UserId};
