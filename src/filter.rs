//! The filtering pass: index building, track operations, and the pipeline
//!
//! A [`TrackFilter`] borrows the store for the duration of one pass. It
//! builds a chronological index of the tracks, then runs the requested
//! operations in a fixed order, rebuilding the index between stages that
//! invalidate it. Which stages run, and how early the pass exits, is driven
//! by how many of the supplied options have been consumed.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use regex::Regex;
use tracing::{info, warn};

use crate::geodesy;
use crate::model::{Track, TrackStore, Waypoint};
use crate::options::{self, FilterOptions};
use crate::{FilterError, Result};

/// Gap below which consecutive points are candidates for stationary
/// denoising, in radians of arc. Empirically a few dozen feet.
const TOO_CLOSE_RAD: f64 = 0.000005;

/// Gap above which a segment break may be declared, in radians of arc.
const SEGMENT_BREAK_RAD: f64 = 0.001;

/// One track's entry in the chronological index.
struct IndexEntry {
    /// Index of the track in the store.
    track: usize,
    /// Creation time of the first waypoint.
    first_time: Option<DateTime<Utc>>,
    /// Creation time of the last waypoint.
    last_time: Option<DateTime<Utc>>,
}

/// One filtering pass over a borrowed [`TrackStore`].
///
/// The filter owns no tracks: every waypoint it removes is either destroyed
/// or reinserted into another track within the same operation.
pub struct TrackFilter<'a> {
    store: &'a mut TrackStore,
    options: &'a FilterOptions,
    index: Vec<IndexEntry>,
    need_time: bool,
    track_pts: usize,
    timeless_pts: usize,
    name_glob: Option<Regex>,
}

/// Run one filtering pass over `store` with the given options.
pub fn process(store: &mut TrackStore, options: &FilterOptions) -> Result<()> {
    TrackFilter::new(store, options)?.process()
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<'a> TrackFilter<'a> {
    /// Prepare a filtering pass. Fails if the `name` glob does not compile.
    pub fn new(store: &'a mut TrackStore, options: &'a FilterOptions) -> Result<Self> {
        let name_glob = options
            .name
            .as_deref()
            .map(options::compile_name_glob)
            .transpose()?;
        Ok(Self {
            store,
            options,
            index: Vec::new(),
            need_time: false,
            track_pts: 0,
            timeless_pts: 0,
            name_glob,
        })
    }

    /// True when any requested operation relies on waypoint timestamps.
    fn compute_need_time(&self) -> bool {
        let o = self.options;
        o.merge.is_some()
            || o.pack.is_some()
            || o.split.is_some()
            || o.sdistance.is_some()
            || o.move_by.is_some()
            || o.fix.is_some()
            || o.speed.is_some()
            // A formatted title is expanded from the first waypoint's time.
            || o.title.as_deref().map_or(false, |t| t.contains('%'))
            // No options at all means a default pack.
            || o.count() == 0
    }

    /// Build the track index: drop empty and name-filtered tracks, validate
    /// timestamps and their ordering, cache each track's time bounds, and
    /// sort chronologically when times matter.
    ///
    /// Calling this again re-validates the store after an operation that
    /// rewrote timestamps or restructured tracks.
    fn init(&mut self) -> Result<()> {
        self.index.clear();
        self.track_pts = 0;
        self.timeless_pts = 0;
        self.need_time = self.compute_need_time();

        // Segmenting runs before indexing so fresh boundaries are visible to
        // everything that follows.
        if self.options.segment.is_some() {
            for t in 0..self.store.len() {
                segment_track(self.store.track_mut(t));
            }
        }

        let tolerate_disorder = self.options.merge.is_some();
        let drop_timeless = self.options.merge.is_some() && self.options.discard.is_some();

        let mut t = 0;
        while t < self.store.len() {
            let track = self.store.track(t);
            if track.is_empty() {
                self.store.remove_track(t);
                continue;
            }
            if let Some(glob) = &self.name_glob {
                if !glob.is_match(&track.name) {
                    self.store.remove_track(t);
                    continue;
                }
            }

            let mut prev_time: Option<DateTime<Utc>> = None;
            for wpt in track.waypoints() {
                self.track_pts += 1;
                match wpt.time {
                    None => {
                        self.timeless_pts += 1;
                        if self.need_time && !drop_timeless {
                            return Err(FilterError::MissingTimestamp {
                                latitude: wpt.latitude,
                                longitude: wpt.longitude,
                            });
                        }
                    }
                    Some(time) => {
                        if self.need_time && !tolerate_disorder {
                            if let Some(previous) = prev_time {
                                if previous > time {
                                    return Err(FilterError::BadlyOrdered {
                                        previous,
                                        current: time,
                                    });
                                }
                            }
                        }
                        prev_time = Some(time);
                    }
                }
            }

            self.index.push(IndexEntry {
                track: t,
                first_time: track.first().and_then(|w| w.time),
                last_time: track.last().and_then(|w| w.time),
            });
            t += 1;
        }

        if self.need_time {
            self.index.sort_by_key(|entry| entry.first_time);
        }
        Ok(())
    }

    /// Run the pipeline.
    ///
    /// Operations run in a fixed order; each consumed option decrements the
    /// remaining-option counter, and the pass returns as soon as it reaches
    /// zero. A counter of -1 marks the zero-option case, which packs by
    /// default.
    pub fn process(&mut self) -> Result<()> {
        self.init()?;
        if self.index.is_empty() {
            return Ok(());
        }

        let mut opts = self.options.count() as i32;
        if opts == 0 {
            opts = -1; // pack by default
        }

        if self.options.name.is_some() {
            opts -= 1;
            if opts == 0 {
                return Ok(());
            }
        }

        // Correct timestamps before any other operation.
        if self.options.move_by.is_some() {
            self.op_move()?;
            opts -= 1;
            if opts == 0 {
                return Ok(());
            }
        }

        if self.options.speed.is_some()
            || self.options.course.is_some()
            || self.options.fix.is_some()
        {
            self.op_synth()?;
            if self.options.speed.is_some() {
                opts -= 1;
            }
            if self.options.course.is_some() {
                opts -= 1;
            }
            if self.options.fix.is_some() {
                opts -= 1;
            }
            if opts == 0 {
                return Ok(());
            }
        }

        if self.options.faketime.is_some() {
            opts -= 1;
            self.op_faketime()?;
            if opts == 0 {
                return Ok(());
            }
            // Synthesized times change ordering and time bounds.
            self.init()?;
            if self.index.is_empty() {
                return Ok(());
            }
        }

        if self.options.start.is_some() || self.options.stop.is_some() {
            if self.options.start.is_some() {
                opts -= 1;
            }
            if self.options.stop.is_some() {
                opts -= 1;
            }
            self.op_range()?;
            if opts == 0 {
                return Ok(());
            }
            self.init()?;
            if self.index.is_empty() {
                return Ok(());
            }
        }

        if self.options.seg2trk.is_some() {
            self.op_seg2trk();
            opts -= 1;
            if opts == 0 {
                return Ok(());
            }
            self.init()?;
        }

        if self.options.trk2seg.is_some() {
            self.op_trk2seg();
            opts -= 1;
            if opts == 0 {
                return Ok(());
            }
        }

        if self.options.title.is_some() {
            opts -= 1;
            if opts == 0 {
                self.op_title()?;
                return Ok(());
            }
        }

        let mut something_done = false;
        if self.options.pack.is_some() || opts == -1 {
            self.op_pack()?;
            something_done = true;
        } else if self.options.merge.is_some() {
            self.op_merge();
            something_done = true;
        }

        if something_done {
            opts -= 1;
            if opts <= 0 {
                // Title was deferred until the track set settled.
                if self.options.title.is_some() {
                    self.op_title()?;
                }
                return Ok(());
            }
        }

        if self.options.split.is_some() || self.options.sdistance.is_some() {
            if self.index.len() > 1 {
                return Err(FilterError::SplitRequiresSingleTrack {
                    count: self.index.len(),
                });
            }
            self.op_split()?;
        }

        // Runs last: earlier operations may have produced small tracks.
        if self.options.minpoints.is_some() {
            self.op_minpoints()?;
        }

        Ok(())
    }

    /// Shift every creation time by the `move` duration.
    fn op_move(&mut self) -> Result<()> {
        let value = self.options.move_by.as_deref().unwrap_or_default();
        let seconds = options::parse_duration("move", value)?;
        if seconds == 0 {
            return Ok(());
        }
        let delta = Duration::try_seconds(seconds).ok_or_else(|| FilterError::InvalidOption {
            option: "move",
            value: value.to_string(),
            reason: "quantity out of range".to_string(),
        })?;

        for entry in &mut self.index {
            let track = self.store.track_mut(entry.track);
            for wpt in track.waypoints_mut() {
                if let Some(time) = wpt.time {
                    wpt.time = Some(time + delta);
                }
            }
            entry.first_time = entry.first_time.map(|t| t + delta);
            entry.last_time = entry.last_time.map(|t| t + delta);
        }
        Ok(())
    }

    /// Synthesize fix quality, course and speed from positions and times.
    fn op_synth(&mut self) -> Result<()> {
        let fix = match self.options.fix.as_deref() {
            Some(value) => Some(options::parse_fix_kind(value)?),
            None => None,
        };
        let synth_course = self.options.course.is_some();
        let synth_speed = self.options.speed.is_some();

        for entry in &self.index {
            let track = self.store.track_mut(entry.track);
            let mut first = true;
            let mut course_ref = (0.0_f64, 0.0_f64);
            let mut speed_ref = (0.0_f64, 0.0_f64);
            let mut speed_ref_time: Option<DateTime<Utc>> = None;

            for wpt in track.waypoints_mut() {
                if let Some((kind, nsats)) = fix {
                    wpt.fix = kind;
                    if wpt.sat == 0 {
                        wpt.sat = nsats;
                    }
                }
                if first {
                    if synth_course {
                        wpt.course = Some(0.0);
                    }
                    if synth_speed {
                        wpt.speed = Some(0.0);
                    }
                    first = false;
                    course_ref = (wpt.latitude, wpt.longitude);
                    speed_ref = (wpt.latitude, wpt.longitude);
                    speed_ref_time = wpt.time;
                    continue;
                }

                if synth_course {
                    wpt.course = Some(geodesy::heading_true_degrees(
                        course_ref.0.to_radians(),
                        course_ref.1.to_radians(),
                        wpt.latitude.to_radians(),
                        wpt.longitude.to_radians(),
                    ));
                    course_ref = (wpt.latitude, wpt.longitude);
                }
                if synth_speed {
                    if let (Some(ref_time), Some(time)) = (speed_ref_time, wpt.time) {
                        let elapsed_ms = (time - ref_time).num_milliseconds().abs();
                        if elapsed_ms != 0 {
                            let meters = geodesy::gcdist_meters(
                                speed_ref.0.to_radians(),
                                speed_ref.1.to_radians(),
                                wpt.latitude.to_radians(),
                                wpt.longitude.to_radians(),
                            );
                            wpt.speed = Some(meters / (0.001 * elapsed_ms as f64));
                            speed_ref = (wpt.latitude, wpt.longitude);
                            speed_ref_time = Some(time);
                        } else {
                            // Truncated inputs produce runs of equal
                            // timestamps; measuring across the run from its
                            // first point would underestimate speed, so keep
                            // the reference there and leave this point
                            // without one.
                            wpt.speed = None;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Assign `base + n * step` to timeless points (or to all points when
    /// forced), in store order.
    fn op_faketime(&mut self) -> Result<()> {
        let value = self.options.faketime.as_deref().unwrap_or_default();
        let fake = options::parse_faketime(value)?;
        let step = Duration::seconds(fake.step);
        let mut next = fake.start;

        for entry in &self.index {
            let track = self.store.track_mut(entry.track);
            for wpt in track.waypoints_mut() {
                if wpt.time.is_none() || fake.force {
                    wpt.time = Some(next);
                    next += step;
                }
            }
        }
        Ok(())
    }

    /// Keep only points inside the `[start, stop]` window; delete tracks
    /// this empties.
    fn op_range(&mut self) -> Result<()> {
        let start = match self.options.start.as_deref() {
            Some(value) => Some(options::parse_partial_timestamp("start", value)?),
            None => None,
        };
        let stop = match self.options.stop.as_deref() {
            Some(value) => Some(options::parse_partial_timestamp("stop", value)?),
            None => None,
        };

        let mut dropped = 0;
        let mut emptied: Vec<usize> = Vec::new();
        for entry in &self.index {
            let track = self.store.track_mut(entry.track);
            dropped += track.retain_waypoints(|wpt| match wpt.time {
                Some(time) => {
                    start.map_or(true, |s| time >= s) && stop.map_or(true, |s| time <= s)
                }
                // A point whose time is missing or mangled never matches.
                None => false,
            });
            if track.is_empty() {
                emptied.push(entry.track);
            }
        }

        emptied.sort_unstable_by(|a, b| b.cmp(a));
        for idx in emptied {
            self.store.remove_track(idx);
        }

        if self.track_pts > 0 && dropped == self.track_pts {
            warn!("range: all {} track points have been dropped", self.track_pts);
        }
        Ok(())
    }

    /// Replace every track name with the title, expanding strftime-style
    /// templates from the track's first timestamp.
    fn op_title(&mut self) -> Result<()> {
        let title = self.options.title.as_deref().unwrap_or_default();
        if title.is_empty() {
            return Err(FilterError::InvalidOption {
                option: "title",
                value: String::new(),
                reason: "missing the title text".to_string(),
            });
        }

        for entry in &self.index {
            let track = self.store.track_mut(entry.track);
            if title.contains('%') {
                let time = track
                    .first()
                    .and_then(|w| w.time)
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                track.name = strftime_utc("title", title, time)?;
            } else {
                track.name = title.to_string();
            }
        }
        Ok(())
    }

    /// Concatenate all tracks into the first, requiring them to be strictly
    /// non-overlapping in time.
    fn op_pack(&mut self) -> Result<()> {
        for i in 1..self.index.len() {
            let prev = &self.index[i - 1];
            let next = &self.index[i];
            if let (Some(previous_end), Some(next_start)) = (prev.last_time, next.first_time) {
                if previous_end >= next_start {
                    return Err(FilterError::TracksOverlap {
                        previous_end,
                        next_start,
                        index: i,
                    });
                }
            }
        }

        let master = self.index[0].track;
        let moved: Vec<usize> = self.index[1..].iter().map(|e| e.track).collect();
        for &idx in &moved {
            let waypoints = self.store.track_mut(idx).take_waypoints();
            self.store.track_mut(master).extend_waypoints(waypoints);
        }
        self.drop_tracks_and_reindex(master, moved);
        Ok(())
    }

    /// Interleave every timestamped point into the first track in
    /// chronological order, collapsing duplicate instants to the first point
    /// encountered. Timeless points are always dropped.
    fn op_merge(&mut self) {
        if self.track_pts <= self.timeless_pts {
            return;
        }

        let master = self.index[0].track;
        let mut buffer: Vec<(Waypoint, usize)> =
            Vec::with_capacity(self.track_pts - self.timeless_pts);
        let mut sequence = 0_usize;

        for entry in &self.index {
            let track = self.store.track_mut(entry.track);
            let mut carry = false;
            for mut wpt in track.take_waypoints() {
                let starts_segment = wpt.new_segment || carry;
                if wpt.has_time() {
                    wpt.new_segment = starts_segment;
                    buffer.push((wpt, sequence));
                    sequence += 1;
                    carry = false;
                } else {
                    // Dropping a timeless point hands its segment flag to the
                    // next point, as the store's delete primitive would.
                    carry = starts_segment;
                }
            }
        }

        // The sequence number keeps points with equal timestamps in their
        // original (track, position) order.
        buffer.sort_by_key(|(wpt, seq)| (wpt.time, *seq));

        let mut dropped = self.timeless_pts;
        let mut prev_time: Option<DateTime<Utc>> = None;
        for (wpt, _) in buffer {
            if prev_time != wpt.time {
                prev_time = wpt.time;
                self.store.track_mut(master).push_waypoint(wpt);
            } else {
                dropped += 1;
            }
        }

        let moved: Vec<usize> = self.index[1..].iter().map(|e| e.track).collect();
        self.drop_tracks_and_reindex(master, moved);

        info!(
            "merge: {} track point(s) merged, {} dropped",
            self.track_pts - dropped,
            dropped
        );
    }

    /// Partition the single remaining track on calendar dates, an elapsed
    /// time threshold, a distance threshold, or both thresholds at once.
    fn op_split(&mut self) -> Result<()> {
        let master_idx = self.index[0].track;
        if self.store.track(master_idx).len() <= 1 {
            return Ok(());
        }

        let interval = match self.options.split.as_deref() {
            Some(value) if !value.is_empty() => {
                Some(options::parse_fractional_duration("split", value)?)
            }
            _ => None,
        };
        let distance = match self.options.sdistance.as_deref() {
            Some(value) if !value.is_empty() => {
                Some(options::parse_distance("sdistance", value)?)
            }
            _ => None,
        };
        let timestamped_names = interval.is_some() || distance.is_some();

        // New tracks are named after the master (or the title option) plus
        // the split point's time; the master itself keeps its name.
        let master_name = self.store.track(master_idx).name.clone();

        let mut boundaries: Vec<usize> = Vec::new();
        {
            let points = self.store.track(master_idx).waypoints();
            for j in 1..points.len() {
                let a = &points[j - 1];
                let b = &points[j];

                let new_track = if interval.is_none() && distance.is_none() {
                    local_date(a.time) != local_date(b.time)
                } else {
                    // Every enabled threshold must be exceeded for the split
                    // to fire; each one clears the flag on its own.
                    let mut split_here = true;
                    if let Some(threshold) = distance {
                        let meters = geodesy::gcdist_meters(
                            a.latitude.to_radians(),
                            a.longitude.to_radians(),
                            b.latitude.to_radians(),
                            b.longitude.to_radians(),
                        );
                        if meters <= threshold {
                            split_here = false;
                        }
                    }
                    if let Some(threshold) = interval {
                        if let (Some(ta), Some(tb)) = (a.time, b.time) {
                            let elapsed = 0.001 * (tb - ta).num_milliseconds() as f64;
                            if elapsed <= threshold {
                                split_here = false;
                            }
                        }
                    }
                    split_here
                };

                if new_track {
                    boundaries.push(j);
                }
            }
        }
        if boundaries.is_empty() {
            return Ok(());
        }

        // Carve from the back so the boundary positions stay valid.
        let mut runs: Vec<Vec<Waypoint>> = Vec::with_capacity(boundaries.len());
        for &boundary in boundaries.iter().rev() {
            runs.push(self.store.track_mut(master_idx).split_off_waypoints(boundary));
        }
        runs.reverse();

        for run in runs {
            let mut track = match run.first().and_then(|w| w.time) {
                Some(time) => Track::new(self.split_name(&master_name, time, timestamped_names)?),
                None => Track::new(""),
            };
            track.extend_waypoints(run);
            self.store.add_track(track);
        }
        Ok(())
    }

    /// Name a track produced by a split.
    ///
    /// The base is the `title` option, the master track's name, or nothing,
    /// suffixed with a UTC stamp of the split point; a `title` containing `%`
    /// is expanded as a template instead.
    fn split_name(
        &self,
        master_name: &str,
        time: DateTime<Utc>,
        timestamped: bool,
    ) -> Result<String> {
        let stamp = if timestamped {
            time.format("%Y%m%d%H%M%S").to_string()
        } else {
            time.format("%Y%m%d").to_string()
        };

        match self.options.title.as_deref() {
            Some(title) if !title.is_empty() => {
                if title.contains('%') {
                    strftime_utc("title", title, time)
                } else {
                    Ok(format!("{title}-{stamp}"))
                }
            }
            _ if !master_name.is_empty() => Ok(format!("{master_name}-{stamp}")),
            _ => Ok(stamp),
        }
    }

    /// Promote interior segments to tracks of their own, inserted right
    /// after the track they came from.
    fn op_seg2trk(&mut self) {
        let mut sources: Vec<usize> = self.index.iter().map(|e| e.track).collect();
        // Handle the highest store index first so insertions never shift a
        // source that is still pending.
        sources.sort_unstable_by(|a, b| b.cmp(a));

        for src_idx in sources {
            let boundaries: Vec<usize> = self
                .store
                .track(src_idx)
                .waypoints()
                .iter()
                .enumerate()
                .skip(1)
                .filter(|(_, w)| w.new_segment)
                .map(|(i, _)| i)
                .collect();
            if boundaries.is_empty() {
                continue;
            }

            let src_name = self.store.track(src_idx).name.clone();
            let src_number = self.store.track(src_idx).number;

            let mut runs: Vec<Vec<Waypoint>> = Vec::with_capacity(boundaries.len());
            for &boundary in boundaries.iter().rev() {
                runs.push(self.store.track_mut(src_idx).split_off_waypoints(boundary));
            }
            runs.reverse();

            let mut insert_after = src_idx;
            for (n, run) in runs.into_iter().enumerate() {
                // Segment n of the source becomes "<name> #n", counting
                // from 2.
                let name = if src_name.is_empty() {
                    String::new()
                } else {
                    format!("{} #{}", src_name, n + 2)
                };
                let mut track = Track::new(name);
                track.number = src_number;
                track.extend_waypoints(run);
                insert_after = self.store.insert_track_after(insert_after, track);
            }
        }
    }

    /// Demote all tracks to segments of the first one.
    fn op_trk2seg(&mut self) {
        let master = self.index[0].track;
        let moved: Vec<usize> = self.index[1..].iter().map(|e| e.track).collect();
        for &idx in &moved {
            let mut waypoints = self.store.track_mut(idx).take_waypoints();
            if let Some(first) = waypoints.first_mut() {
                first.new_segment = true;
            }
            self.store.track_mut(master).extend_waypoints(waypoints);
        }
        self.drop_tracks_and_reindex(master, moved);
    }

    /// Delete tracks with fewer waypoints than the threshold.
    fn op_minpoints(&mut self) -> Result<()> {
        let value = self.options.minpoints.as_deref().unwrap_or_default();
        let minimum: usize = value.parse().map_err(|_| FilterError::InvalidOption {
            option: "minpoints",
            value: value.to_string(),
            reason: "expected a non-negative integer".to_string(),
        })?;

        if minimum > 0 {
            self.store.retain_tracks(|track| track.len() >= minimum);
        }
        Ok(())
    }

    /// Remove the (now empty) `removed` tracks from the store and rebuild
    /// the index as the single surviving `master` track.
    fn drop_tracks_and_reindex(&mut self, master: usize, mut removed: Vec<usize>) {
        removed.sort_unstable_by(|a, b| b.cmp(a));
        let shift = removed.iter().filter(|&&idx| idx < master).count();
        for idx in removed {
            self.store.remove_track(idx);
        }

        let master = master - shift;
        let track = self.store.track(master);
        self.index = vec![IndexEntry {
            track: master,
            first_time: track.first().and_then(|w| w.time),
            last_time: track.last().and_then(|w| w.time),
        }];
    }
}

/// Calendar date of an instant in the local zone, for the date-split rule.
fn local_date(time: Option<DateTime<Utc>>) -> Option<NaiveDate> {
    time.map(|t| t.with_timezone(&Local).date_naive())
}

/// Expand a strftime-style template against a UTC instant, rejecting
/// templates with invalid specifiers.
fn strftime_utc(option: &'static str, template: &str, time: DateTime<Utc>) -> Result<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(template).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(FilterError::InvalidOption {
            option,
            value: template.to_string(),
            reason: "invalid strftime specifier".to_string(),
        });
    }
    Ok(time.format_with_items(items.into_iter()).to_string())
}

/// Denoise stationary runs and mark segment breaks on distance jumps.
///
/// Maintains an exponentially weighted moving average of the gap between
/// consecutive points; a gap that is both absolutely large and well above
/// the average starts a new segment. Points closer than [`TOO_CLOSE_RAD`]
/// to their neighbors are deleted when the sensor data shows no movement
/// either.
fn segment_track(track: &mut Track) {
    let mut avg_dist = 0.0_f64;
    let mut prev = 0;
    let mut cur = 1;

    while cur < track.len() {
        let points = track.waypoints();
        let (a, b) = (&points[prev], &points[cur]);
        let mut cur_dist = geodesy::gcdist(
            a.latitude.to_radians(),
            a.longitude.to_radians(),
            b.latitude.to_radians(),
            b.longitude.to_radians(),
        );
        if avg_dist == 0.0 {
            avg_dist = cur_dist;
        }

        if cur_dist < TOO_CLOSE_RAD && cur + 1 < track.len() {
            let next = &points[cur + 1];
            if points_are_same(a, b) && points_are_same(b, next) {
                // Keep the bookends of a stationary run, drop the middle.
                track.remove_waypoint(cur);
                continue;
            }
        }

        if cur_dist > SEGMENT_BREAK_RAD && cur_dist > 1.2 * avg_dist {
            avg_dist = 0.0;
            cur_dist = 0.0;
            track.waypoints_mut()[cur].new_segment = true;
        }
        avg_dist = (cur_dist + 4.0 * avg_dist) / 5.0;

        prev = cur;
        cur += 1;
    }
}

/// Coarse equality for stationary-run denoising.
///
/// A flat lat/lon comparison is enough here: .00001 degree of latitude is
/// about 27 feet, the practical limit of consumer GPS.
fn points_are_same(a: &Waypoint, b: &Waypoint) -> bool {
    (a.latitude - b.latitude).abs() < 0.00001
        && (a.longitude - b.longitude).abs() < 0.00001
        && elevation_close(a.elevation, b.elevation)
        && a.course == b.course
        && a.speed == b.speed
        && a.heart_rate == b.heart_rate
        && a.cadence == b.cadence
        && a.temperature == b.temperature
}

fn elevation_close(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() < 20.0,
        (None, None) => true,
        _ => false,
    }
}
