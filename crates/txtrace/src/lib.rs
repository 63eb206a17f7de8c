//! `txtrace` - Resolve Bitcoin transaction ids to block height and time
//!
//! This library reads transaction ids from a CSV dataset, looks each one up
//! on an Esplora-compatible block explorer, and writes the block data to a
//! resumable results file that can be joined back onto the dataset. It also
//! summarizes the amounts and labels of a traced-transaction dataset.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod enrich;
pub mod error;
pub mod esplora;
pub mod logging;
pub mod merge;
pub mod record;
pub mod results;
pub mod txid;

pub use cache::{CacheStats, LookupCache};
pub use config::Config;
pub use enrich::{EnrichReport, EnrichRequest, Enricher};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use record::LookupRecord;
pub use txid::Txid;
