//! Track Filter Library - Batch Transformations for Recorded GPS Tracks
//!
//! This library takes an in-memory collection of recorded GPS tracks (ordered
//! sequences of timestamped waypoints) and applies a user-selected pipeline of
//! transformations: reordering, merging, splitting, time-shifting, synthesis
//! of derived fields, segmenting, and filtering by time range, distance, or
//! point count. It is meant to sit between a format parser and a format
//! writer inside a conversion engine.
//!
//! # Architecture
//!
//! - **[`TrackStore`]**: owned, contiguous storage for tracks and waypoints
//! - **[`FilterOptions`]**: the option bag selecting which operations run
//! - **[`TrackFilter`]**: one filtering pass over a borrowed store
//! - **[`geodesy`]**: great-circle distance and bearing primitives
//! - **[`interop`]**: conversion to and from `gpx` documents
//!
//! # Example
//!
//! ```ignore
//! use track_filter_lib::{FilterOptions, TrackStore, process};
//!
//! let mut store = TrackStore::new();
//! // ... fill the store from a parsed input ...
//!
//! let options = FilterOptions {
//!     merge: Some(String::new()),
//!     title: Some("ride %Y-%m-%d".to_string()),
//!     ..FilterOptions::default()
//! };
//! process(&mut store, &options)?;
//! # Ok::<(), track_filter_lib::FilterError>(())
//! ```

mod filter;
pub mod geodesy;
pub mod interop;
mod model;
mod options;

// Public API exports
pub use filter::{process, TrackFilter};
pub use model::{Fix, Track, TrackStore, Waypoint};
pub use options::{FakeTime, FilterOptions};

use chrono::{DateTime, Utc};

/// Error types for a filtering pass.
///
/// Every variant aborts the pass; the store is left in whatever state the
/// failing operation produced. The surrounding engine decides whether that
/// is fatal.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// An option value did not match its grammar or was out of range.
    #[error("invalid value \"{value}\" for option \"{option}\": {reason}")]
    InvalidOption {
        option: &'static str,
        value: String,
        reason: String,
    },

    /// An operation that needs timestamps found a waypoint without one.
    #[error("track point at {latitude},{longitude} has no timestamp")]
    MissingTimestamp { latitude: f64, longitude: f64 },

    /// Waypoint creation times decrease within a track (and merge is off).
    #[error("track points badly ordered (timestamp {previous} > {current})")]
    BadlyOrdered {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    /// Two tracks overlap in time, so pack cannot concatenate them.
    #[error("tracks overlap in time ({previous_end} >= {next_start} at track {index})")]
    TracksOverlap {
        previous_end: DateTime<Utc>,
        next_start: DateTime<Utc>,
        index: usize,
    },

    /// Split was requested while more than one track remains.
    #[error("cannot split {count} tracks, pack or merge them into one first")]
    SplitRequiresSingleTrack { count: usize },
}

pub type Result<T> = std::result::Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that the main entry points are accessible
        let _: fn() -> TrackStore = TrackStore::new;
        let _: fn() -> FilterOptions = FilterOptions::default;
    }

    #[test]
    fn test_error_display_names_option() {
        let err = FilterError::InvalidOption {
            option: "move",
            value: "5x".to_string(),
            reason: "unknown unit".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("move"));
        assert!(text.contains("5x"));
    }
}
