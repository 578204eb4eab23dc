//! Conversion between the track store and `gpx` documents
//!
//! The surrounding engine hands the filter tracks it already parsed; in the
//! Rust ecosystem that usually means a [`gpx::Gpx`] document. These adapters
//! flatten `<trkseg>` boundaries into waypoint `new_segment` flags on the way
//! in and regenerate them on the way out.
//!
//! Heart rate, cadence and temperature live in GPX extensions the `gpx`
//! crate does not model, and GPX 1.1 has no course element; those fields
//! cross this boundary unset.

use chrono::{DateTime, Utc};
use geo::Point;
use time::OffsetDateTime;

use crate::model::{Fix, Track, TrackStore, Waypoint};

/// Build a track store from a parsed GPX document.
///
/// Routes and standalone waypoints are not the filter's business and are
/// ignored; only tracks cross the boundary.
pub fn from_gpx(document: &gpx::Gpx) -> TrackStore {
    let mut store = TrackStore::new();

    for gpx_track in &document.tracks {
        let mut track = Track::new(gpx_track.name.clone().unwrap_or_default());
        track.number = gpx_track.number.unwrap_or(0);

        for segment in &gpx_track.segments {
            let mut first_in_segment = true;
            for point in &segment.points {
                let geo_point = point.point();
                let mut wpt = Waypoint::new(geo_point.y(), geo_point.x());
                wpt.elevation = point.elevation;
                wpt.time = point.time.and_then(time_from_gpx);
                wpt.speed = point.speed;
                wpt.fix = point.fix.as_ref().map(fix_from_gpx).unwrap_or_default();
                wpt.sat = point.sat.map(|s| s as u32).unwrap_or(0);
                wpt.new_segment = first_in_segment;
                first_in_segment = false;
                track.push_waypoint(wpt);
            }
        }

        store.add_track(track);
    }

    store
}

/// Render the track store back into a GPX 1.1 document, splitting each track
/// into `<trkseg>` runs at its `new_segment` flags.
pub fn to_gpx(store: &TrackStore) -> gpx::Gpx {
    let mut document = gpx::Gpx::default();
    document.version = gpx::GpxVersion::Gpx11;

    for track in store.tracks() {
        let mut gpx_track = gpx::Track::default();
        if !track.name.is_empty() {
            gpx_track.name = Some(track.name.clone());
        }
        if track.number != 0 {
            gpx_track.number = Some(track.number);
        }

        let mut segment = gpx::TrackSegment::default();
        for wpt in track.waypoints() {
            if wpt.new_segment && !segment.points.is_empty() {
                gpx_track.segments.push(segment);
                segment = gpx::TrackSegment::default();
            }

            let mut point = gpx::Waypoint::new(Point::new(wpt.longitude, wpt.latitude));
            point.elevation = wpt.elevation;
            point.time = wpt.time.and_then(time_to_gpx);
            point.speed = wpt.speed;
            point.fix = fix_to_gpx(wpt.fix);
            point.sat = (wpt.sat != 0).then(|| u64::from(wpt.sat));
            segment.points.push(point);
        }
        if !segment.points.is_empty() {
            gpx_track.segments.push(segment);
        }

        document.tracks.push(gpx_track);
    }

    document
}

fn time_from_gpx(time: gpx::Time) -> Option<DateTime<Utc>> {
    let odt: OffsetDateTime = time.into();
    DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}

fn time_to_gpx(time: DateTime<Utc>) -> Option<gpx::Time> {
    let odt = OffsetDateTime::from_unix_timestamp(time.timestamp()).ok()?
        + time::Duration::nanoseconds(i64::from(time.timestamp_subsec_nanos()));
    Some(odt.into())
}

fn fix_from_gpx(fix: &gpx::Fix) -> Fix {
    match fix {
        gpx::Fix::None => Fix::None,
        gpx::Fix::TwoDimensional => Fix::TwoDimensional,
        gpx::Fix::ThreeDimensional => Fix::ThreeDimensional,
        gpx::Fix::DGPS => Fix::Dgps,
        gpx::Fix::PPS => Fix::Pps,
        gpx::Fix::Other(_) => Fix::Unknown,
    }
}

fn fix_to_gpx(fix: Fix) -> Option<gpx::Fix> {
    match fix {
        Fix::Unknown => None,
        Fix::None => Some(gpx::Fix::None),
        Fix::TwoDimensional => Some(gpx::Fix::TwoDimensional),
        Fix::ThreeDimensional => Some(gpx::Fix::ThreeDimensional),
        Fix::Dgps => Some(gpx::Fix::DGPS),
        Fix::Pps => Some(gpx::Fix::PPS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpx::{Gpx, TrackSegment};

    fn create_test_point(lat: f64, lon: f64, secs: i64) -> gpx::Waypoint {
        let mut point = gpx::Waypoint::new(Point::new(lon, lat));
        point.time = Some(OffsetDateTime::from_unix_timestamp(secs).unwrap().into());
        point
    }

    fn create_test_gpx() -> Gpx {
        let mut gpx = Gpx::default();
        let mut track = gpx::Track::default();
        track.name = Some("Morning ride".to_string());
        track.number = Some(3);

        // Two segments of two points each (around London).
        let mut first = TrackSegment::default();
        first.points.push(create_test_point(51.5074, -0.1278, 100));
        first.points.push(create_test_point(51.5076, -0.1276, 110));
        let mut second = TrackSegment::default();
        second.points.push(create_test_point(51.5080, -0.1270, 200));
        second.points.push(create_test_point(51.5082, -0.1268, 210));

        track.segments.push(first);
        track.segments.push(second);
        gpx.tracks.push(track);
        gpx
    }

    #[test]
    fn test_from_gpx_flattens_segments_into_flags() {
        let store = from_gpx(&create_test_gpx());

        assert_eq!(store.len(), 1);
        let track = store.track(0);
        assert_eq!(track.name, "Morning ride");
        assert_eq!(track.number, 3);
        assert_eq!(track.len(), 4);

        let flags: Vec<bool> = track.waypoints().iter().map(|w| w.new_segment).collect();
        assert_eq!(flags, [true, false, true, false]);
    }

    #[test]
    fn test_from_gpx_preserves_point_data() {
        let store = from_gpx(&create_test_gpx());
        let wpt = &store.track(0).waypoints()[0];

        assert!((wpt.latitude - 51.5074).abs() < 1e-9);
        assert!((wpt.longitude - -0.1278).abs() < 1e-9);
        assert_eq!(wpt.time.unwrap().timestamp(), 100);
    }

    #[test]
    fn test_round_trip_rebuilds_segments() {
        let store = from_gpx(&create_test_gpx());
        let document = to_gpx(&store);

        assert_eq!(document.tracks.len(), 1);
        let track = &document.tracks[0];
        assert_eq!(track.name.as_deref(), Some("Morning ride"));
        assert_eq!(track.number, Some(3));
        assert_eq!(track.segments.len(), 2);
        assert_eq!(track.segments[0].points.len(), 2);
        assert_eq!(track.segments[1].points.len(), 2);

        let time = track.segments[1].points[0].time.unwrap();
        let odt: OffsetDateTime = time.into();
        assert_eq!(odt.unix_timestamp(), 200);
    }

    #[test]
    fn test_fix_maps_both_ways() {
        let kinds = [
            (gpx::Fix::None, Fix::None),
            (gpx::Fix::TwoDimensional, Fix::TwoDimensional),
            (gpx::Fix::ThreeDimensional, Fix::ThreeDimensional),
            (gpx::Fix::DGPS, Fix::Dgps),
            (gpx::Fix::PPS, Fix::Pps),
        ];
        for (theirs, ours) in kinds {
            assert_eq!(fix_from_gpx(&theirs), ours);
            assert_eq!(fix_to_gpx(ours), Some(theirs));
        }

        assert_eq!(fix_from_gpx(&gpx::Fix::Other("rtk".to_string())), Fix::Unknown);
        assert_eq!(fix_to_gpx(Fix::Unknown), None);
    }

    #[test]
    fn test_timeless_points_survive_the_boundary() {
        let mut gpx = Gpx::default();
        let mut track = gpx::Track::default();
        let mut segment = TrackSegment::default();
        segment
            .points
            .push(gpx::Waypoint::new(Point::new(-0.1278, 51.5074)));
        track.segments.push(segment);
        gpx.tracks.push(track);

        let store = from_gpx(&gpx);
        assert!(store.track(0).waypoints()[0].time.is_none());

        let back = to_gpx(&store);
        assert!(back.tracks[0].segments[0].points[0].time.is_none());
    }
}
