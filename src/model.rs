//! Track, waypoint and store data model
//!
//! This module provides the owned storage the filter operates on: a
//! `TrackStore` holding tracks, each track holding its waypoints in
//! recorded order. Waypoints live in contiguous `Vec`s; operations address
//! them by index.

use chrono::{DateTime, Utc};

/// GPS solution quality of a waypoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Fix {
    /// No fix information recorded.
    #[default]
    Unknown,
    /// The receiver reported having no fix.
    None,
    TwoDimensional,
    ThreeDimensional,
    /// Differential GPS fix.
    Dgps,
    /// Military precise positioning service fix.
    Pps,
}

/// A single recorded track point.
///
/// Position is geodetic WGS84 in degrees. The creation time is a UTC instant
/// with millisecond resolution; `None` means the input carried no timestamp.
/// Derived scalars use `Option` as their has-value bit.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Waypoint {
    /// Latitude in degrees, north positive.
    pub latitude: f64,
    /// Longitude in degrees, east positive.
    pub longitude: f64,
    /// Elevation above the WGS84 ellipsoid in meters.
    pub elevation: Option<f64>,
    /// Creation time of the point.
    pub time: Option<DateTime<Utc>>,
    /// Fix quality.
    pub fix: Fix,
    /// Number of satellites used for the fix; 0 when unknown.
    pub sat: u32,
    /// True course over ground in degrees.
    pub course: Option<f64>,
    /// Speed over ground in meters per second.
    pub speed: Option<f64>,
    /// Heart rate in beats per minute.
    pub heart_rate: Option<u8>,
    /// Pedaling cadence in revolutions per minute.
    pub cadence: Option<u8>,
    /// Air temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// True when this point starts a new segment within its track.
    ///
    /// The first point of every track carries this flag; it is set by the
    /// store when the point is appended to an empty track and never cleared
    /// afterwards.
    pub new_segment: bool,
}

impl Waypoint {
    /// Create a waypoint at the given position with no other data.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            time: None,
            fix: Fix::Unknown,
            sat: 0,
            course: None,
            speed: None,
            heart_rate: None,
            cadence: None,
            temperature: None,
            new_segment: false,
        }
    }

    /// Create a waypoint at the given position and creation time.
    pub fn with_time(latitude: f64, longitude: f64, time: DateTime<Utc>) -> Self {
        Self {
            time: Some(time),
            ..Self::new(latitude, longitude)
        }
    }

    /// True when the point carries a creation time.
    #[inline]
    pub fn has_time(&self) -> bool {
        self.time.is_some()
    }
}

/// An ordered sequence of waypoints with a name and a numeric identifier.
///
/// The waypoint list is only mutated through the primitives below so the
/// segment-flag invariants hold: appending to an empty track marks the point
/// as a segment start, and deleting a point hands its segment flag to the
/// point that follows it.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Track {
    /// Display name; empty means unnamed.
    pub name: String,
    /// Numeric identifier from the input, 0 when absent.
    pub number: u32,
    waypoints: Vec<Waypoint>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Track {
    /// Create an empty track with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: 0,
            waypoints: Vec::new(),
        }
    }

    /// Waypoints in recorded order.
    #[inline]
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Mutable access to the waypoints for in-place field edits.
    ///
    /// The slice cannot change the list length, so the structural invariants
    /// are preserved; callers must not clear `new_segment` on the first point.
    #[inline]
    pub fn waypoints_mut(&mut self) -> &mut [Waypoint] {
        &mut self.waypoints
    }

    /// Number of waypoints.
    #[inline]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// True when the track has no waypoints.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// First waypoint, if any.
    #[inline]
    pub fn first(&self) -> Option<&Waypoint> {
        self.waypoints.first()
    }

    /// Last waypoint, if any.
    #[inline]
    pub fn last(&self) -> Option<&Waypoint> {
        self.waypoints.last()
    }

    /// Append a waypoint.
    ///
    /// The first point appended to an empty track always starts a segment.
    pub fn push_waypoint(&mut self, mut waypoint: Waypoint) {
        if self.waypoints.is_empty() {
            waypoint.new_segment = true;
        }
        self.waypoints.push(waypoint);
    }

    /// Append several waypoints, preserving their segment flags (except that
    /// the first point of a previously empty track starts a segment).
    pub fn extend_waypoints(&mut self, waypoints: impl IntoIterator<Item = Waypoint>) {
        for waypoint in waypoints {
            self.push_waypoint(waypoint);
        }
    }

    /// Detach and return all waypoints, leaving the track empty.
    pub fn take_waypoints(&mut self) -> Vec<Waypoint> {
        std::mem::take(&mut self.waypoints)
    }

    /// Detach and return the waypoints from `at` to the end.
    pub fn split_off_waypoints(&mut self, at: usize) -> Vec<Waypoint> {
        self.waypoints.split_off(at)
    }

    /// Remove and return the waypoint at `index`.
    ///
    /// If the removed point started a segment, the following point (if any)
    /// becomes the segment start.
    pub fn remove_waypoint(&mut self, index: usize) -> Waypoint {
        let removed = self.waypoints.remove(index);
        if removed.new_segment {
            if let Some(next) = self.waypoints.get_mut(index) {
                next.new_segment = true;
            }
        }
        removed
    }

    /// Keep only the waypoints for which `keep` returns true, propagating
    /// segment flags across the removed ones. Returns the number of points
    /// dropped.
    ///
    /// Equivalent to calling [`Track::remove_waypoint`] for every rejected
    /// point, but in a single pass.
    pub fn retain_waypoints<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Waypoint) -> bool,
    {
        let mut carry = false;
        let mut dropped = 0;
        self.waypoints.retain_mut(|waypoint| {
            let starts_segment = waypoint.new_segment || carry;
            if keep(waypoint) {
                waypoint.new_segment = starts_segment;
                carry = false;
                true
            } else {
                carry = starts_segment;
                dropped += 1;
                false
            }
        });
        dropped
    }
}

/// The mutable collection of tracks a filtering pass operates on.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackStore {
    tracks: Vec<Track>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TrackStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self { tracks: Vec::new() }
    }

    /// All tracks in store order.
    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of tracks.
    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// True when the store holds no tracks.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Track at `index`.
    #[inline]
    pub fn track(&self, index: usize) -> &Track {
        &self.tracks[index]
    }

    /// Mutable track at `index`.
    #[inline]
    pub fn track_mut(&mut self, index: usize) -> &mut Track {
        &mut self.tracks[index]
    }

    /// Append a track; returns its index.
    pub fn add_track(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    /// Insert a track immediately after `index`; returns the new index.
    pub fn insert_track_after(&mut self, index: usize, track: Track) -> usize {
        self.tracks.insert(index + 1, track);
        index + 1
    }

    /// Detach and return the track at `index`.
    pub fn remove_track(&mut self, index: usize) -> Track {
        self.tracks.remove(index)
    }

    /// Keep only the tracks for which `keep` returns true.
    pub fn retain_tracks<F>(&mut self, keep: F)
    where
        F: FnMut(&Track) -> bool,
    {
        self.tracks.retain(keep);
    }

    /// Total number of waypoints across all tracks.
    pub fn total_waypoints(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn create_test_waypoint(lat: f64, lon: f64) -> Waypoint {
        Waypoint::new(lat, lon)
    }

    #[test]
    fn test_first_waypoint_starts_segment() {
        let mut track = Track::new("t");
        track.push_waypoint(create_test_waypoint(51.5074, -0.1278));
        track.push_waypoint(create_test_waypoint(51.5076, -0.1276));

        assert!(track.waypoints()[0].new_segment);
        assert!(!track.waypoints()[1].new_segment);
    }

    #[test]
    fn test_remove_waypoint_propagates_segment_flag() {
        let mut track = Track::new("t");
        track.push_waypoint(create_test_waypoint(0.0, 0.0));
        track.push_waypoint(create_test_waypoint(0.1, 0.0));
        track.push_waypoint(create_test_waypoint(0.2, 0.0));
        track.waypoints_mut()[1].new_segment = true;

        // Deleting the segment-start point hands the flag to its successor.
        track.remove_waypoint(1);
        assert_eq!(track.len(), 2);
        assert!(track.waypoints()[1].new_segment);
    }

    #[test]
    fn test_remove_last_waypoint_drops_flag() {
        let mut track = Track::new("t");
        track.push_waypoint(create_test_waypoint(0.0, 0.0));
        track.push_waypoint(create_test_waypoint(0.1, 0.0));
        track.waypoints_mut()[1].new_segment = true;

        track.remove_waypoint(1);
        assert_eq!(track.len(), 1);
    }

    #[test]
    fn test_retain_waypoints_carries_flag_over_gaps() {
        let mut track = Track::new("t");
        for i in 0..5 {
            let mut wpt = create_test_waypoint(i as f64, 0.0);
            wpt.time = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, i).unwrap());
            track.push_waypoint(wpt);
        }
        track.waypoints_mut()[2].new_segment = true;

        // Drop points 2 and 3; the segment flag must land on point 4.
        let dropped = track.retain_waypoints(|w| {
            let second = w.time.map(|t| t.timestamp() % 60).unwrap_or(0);
            !(2..=3).contains(&second)
        });
        assert_eq!(dropped, 2);
        assert_eq!(track.len(), 3);
        assert!(track.waypoints()[2].new_segment);
    }

    #[test]
    fn test_extend_waypoints_preserves_interior_flags() {
        let mut source = Track::new("src");
        source.push_waypoint(create_test_waypoint(0.0, 0.0));
        source.push_waypoint(create_test_waypoint(0.1, 0.0));

        let mut dest = Track::new("dst");
        dest.push_waypoint(create_test_waypoint(9.0, 9.0));
        dest.extend_waypoints(source.take_waypoints());

        assert!(source.is_empty());
        assert_eq!(dest.len(), 3);
        // The moved track's first point keeps its segment-start flag.
        assert!(dest.waypoints()[1].new_segment);
        assert!(!dest.waypoints()[2].new_segment);
    }

    #[test]
    fn test_store_insert_after() {
        let mut store = TrackStore::new();
        store.add_track(Track::new("a"));
        store.add_track(Track::new("c"));

        let idx = store.insert_track_after(0, Track::new("b"));
        assert_eq!(idx, 1);
        let names: Vec<&str> = store.tracks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_store_counts() {
        let mut store = TrackStore::new();
        assert!(store.is_empty());

        let mut track = Track::new("t");
        track.push_waypoint(create_test_waypoint(0.0, 0.0));
        track.push_waypoint(create_test_waypoint(0.1, 0.0));
        store.add_track(track);

        assert_eq!(store.len(), 1);
        assert_eq!(store.total_waypoints(), 2);

        store.remove_track(0);
        assert!(store.is_empty());
    }
}
