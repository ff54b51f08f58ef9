//! feedsquash turns loosely-standardized calendar feeds into canonical
//! event/venue records and squashes the near-duplicates that accumulate
//! across repeated imports from overlapping sources.
//!
//! The two subsystems are independent: [`parser::parse_feed`] goes from raw
//! feed text to ordered [`AbstractEvent`]s, and [`squash::squash`] merges
//! operator-selected duplicates onto a master through the caller's
//! [`squash::RecordStore`]. [`dedup::match_duplicates`] finds the candidate
//! groups in between.

pub mod dedup;
pub mod parser;
pub mod squash;
pub mod types;

pub fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

// Re-export commonly used types
pub use dedup::{match_duplicates, DuplicateGroup, MatchSpec, Matchable};
pub use parser::{import_feed, parse_feed, FeedSource, ParseError};
pub use squash::{squash, RecordStore, SquashError, SquashRequest, SquashResult};
pub use types::{AbstractEvent, AbstractLocation, RecordId, RecordKind};
