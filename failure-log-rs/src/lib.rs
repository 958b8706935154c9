//! # Failure Log
//!
//! Records failed jobs into an append-only list store and pages through them
//! for inspection.
//!
//! - Exception text is sanitized to valid UTF-8 before encoding, so any
//!   failure can be saved and read back
//! - Records are appended atomically; each gets the next ordinal
//! - [`FailureLog::each`] reads an offset/limit window in ascending or
//!   descending order with a single range read
//! - Entries that no longer decode are reported, not raised
//!
//! ```no_run
//! use std::sync::Arc;
//! use failure_log::{EachRequest, ExceptionInfo, FailureLog, InMemoryListStore, Order, Payload};
//!
//! # async fn run() -> failure_log::Result<()> {
//! let log = FailureLog::new(Arc::new(InMemoryListStore::new()));
//! log.record(
//!     &ExceptionInfo::new("Timeout", "upstream took too long"),
//!     "host:4021:reports",
//!     "reports",
//!     Payload::new("DailyReport", vec!["2024-03-09".into()]),
//! )
//! .await?;
//!
//! for (ordinal, entry) in log.each(&EachRequest::new(0, 20).order(Order::Desc)).await? {
//!     match entry {
//!         Ok(record) => println!("{ordinal}: {}", record.error),
//!         Err(malformed) => eprintln!("{malformed}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod failure_log;
pub mod logging;
pub mod record;
pub mod sanitize;
pub mod store;
pub mod window;

pub use config::{FailureLogConfig, StoreConfig};
pub use error::{FailureLogError, MalformedRecord, Result, StoreError};
pub use failure_log::{EachRequest, FailureEntry, FailureLog, Failures};
pub use logging::{init_logging, LoggingConfig};
pub use record::{ArgValue, ExceptionInfo, FailureRecord, Payload, RecordEncoder};
pub use store::{create_list_store, InMemoryListStore, ListStore, RedisListStore};
pub use window::Order;
