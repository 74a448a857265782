//! Rendering of sessions for terminal output.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, Local, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::map::MapView;
use crate::track::{Coordinate, TrackSession};

use super::OutputFormat;

/// Format a timestamp in the local time zone.
///
/// Falls back to RFC 3339 when `format` is not a valid `strftime` string.
#[must_use]
pub fn format_time(timestamp: DateTime<Utc>, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", timestamp.with_timezone(&Local).format(format)).is_err() {
        return timestamp.to_rfc3339();
    }
    out
}

/// Format an elapsed time as `1h 02m 03s`, `4m 05s` or `6s`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

fn end_time(session: &TrackSession, time_format: &str) -> String {
    session
        .end_time
        .map_or_else(|| "recording".to_string(), |t| format_time(t, time_format))
}

fn distance(session: &TrackSession) -> String {
    session
        .distance
        .map_or_else(|| "-".to_string(), |d| d.to_string())
}

fn duration(session: &TrackSession) -> String {
    session
        .duration()
        .map_or_else(|| "-".to_string(), format_duration)
}

/// Render a list of sessions.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_sessions(
    sessions: &[TrackSession],
    format: OutputFormat,
    time_format: &str,
) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(sessions)?);
    }
    if sessions.is_empty() {
        return Ok("No sessions recorded yet.".to_string());
    }

    let mut out = String::new();
    match format {
        OutputFormat::Table => {
            let _ = writeln!(
                out,
                "{:>5}  {:<20}  {:<20}  {:>11}  {:>10}",
                "ID", "STARTED", "ENDED", "DURATION", "DISTANCE"
            );
            for session in sessions {
                let _ = writeln!(
                    out,
                    "{:>5}  {:<20}  {:<20}  {:>11}  {:>10}",
                    session.id,
                    format_time(session.start_time, time_format),
                    end_time(session, time_format),
                    duration(session),
                    distance(session)
                );
            }
        }
        _ => {
            for session in sessions {
                let _ = writeln!(
                    out,
                    "#{} {} - {} {}",
                    session.id,
                    format_time(session.start_time, time_format),
                    end_time(session, time_format),
                    distance(session)
                );
            }
        }
    }
    Ok(out.trim_end().to_string())
}

#[derive(Serialize)]
struct SessionDetail<'a> {
    session: &'a TrackSession,
    coordinates: &'a [Coordinate],
    map: MapView,
}

/// Render one session with its track.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_session(
    session: &TrackSession,
    coordinates: &[Coordinate],
    format: OutputFormat,
    time_format: &str,
) -> Result<String> {
    let map = MapView::for_coordinates(coordinates);

    if format == OutputFormat::Json {
        let detail = SessionDetail {
            session,
            coordinates,
            map,
        };
        return Ok(serde_json::to_string_pretty(&detail)?);
    }

    let mut out = String::new();
    let _ = writeln!(out, "Session {}", session.id);
    let _ = writeln!(out, "  Started:   {}", format_time(session.start_time, time_format));
    let _ = writeln!(out, "  Ended:     {}", end_time(session, time_format));
    let _ = writeln!(out, "  Duration:  {}", duration(session));
    let _ = writeln!(out, "  Distance:  {}", distance(session));
    let _ = writeln!(out, "  Points:    {}", coordinates.len());
    let _ = writeln!(
        out,
        "  Map:       centre {:.6}, {:.6} zoom {}",
        map.camera.latitude, map.camera.longitude, map.camera.zoom
    );
    if let Some(bounds) = map.bounds() {
        let _ = writeln!(
            out,
            "  Bounds:    {:.6}, {:.6} .. {:.6}, {:.6}",
            bounds.min_latitude, bounds.min_longitude, bounds.max_latitude, bounds.max_longitude
        );
    }

    if format == OutputFormat::Table && !coordinates.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{:>5}  {:<20}  {:>11}  {:>11}", "#", "TIME", "LAT", "LON");
        for (i, c) in coordinates.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>5}  {:<20}  {:>11.6}  {:>11.6}",
                i + 1,
                format_time(c.timestamp, time_format),
                c.latitude,
                c.longitude
            );
        }
    }

    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::distance::Distance;
    use crate::track::SessionId;

    const ISO: &str = "%Y-%m-%d";

    fn closed_session(id: i64, meters: f64) -> TrackSession {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        TrackSession {
            id: SessionId(id),
            start_time: start,
            end_time: Some(start + Duration::seconds(3725)),
            distance: Some(Distance::from_meters(meters)),
        }
    }

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            session_id: SessionId(1),
            latitude,
            longitude,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(6)), "6s");
        assert_eq!(format_duration(Duration::seconds(245)), "4m 05s");
        assert_eq!(format_duration(Duration::seconds(3725)), "1h 02m 05s");
        assert_eq!(format_duration(Duration::seconds(-3)), "0s");
    }

    #[test]
    fn test_format_time_invalid_format_falls_back() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(format_time(ts, "%Q"), ts.to_rfc3339());
    }

    #[test]
    fn test_render_sessions_empty() {
        let out = render_sessions(&[], OutputFormat::Table, ISO).unwrap();
        assert_eq!(out, "No sessions recorded yet.");

        let json = render_sessions(&[], OutputFormat::Json, ISO).unwrap();
        assert_eq!(json, "[]");
    }

    #[test]
    fn test_render_sessions_plain() {
        let out = render_sessions(&[closed_session(3, 1234.0)], OutputFormat::Plain, ISO).unwrap();
        assert!(out.starts_with("#3 "));
        assert!(out.ends_with("1.23 km"));
    }

    #[test]
    fn test_render_sessions_table() {
        let sessions = [closed_session(1, 850.0), closed_session(2, 12_500.0)];
        let out = render_sessions(&sessions, OutputFormat::Table, ISO).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("DISTANCE"));
        assert!(lines[1].contains("850 m"));
        assert!(lines[1].contains("1h 02m 05s"));
        assert!(lines[2].contains("12.50 km"));
    }

    #[test]
    fn test_render_sessions_open_session() {
        let mut session = closed_session(1, 0.0);
        session.end_time = None;
        session.distance = None;

        let out = render_sessions(&[session], OutputFormat::Plain, ISO).unwrap();
        assert!(out.contains("recording"));
    }

    #[test]
    fn test_render_sessions_json() {
        let out = render_sessions(&[closed_session(5, 42.0)], OutputFormat::Json, ISO).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["id"], 5);
        assert_eq!(value[0]["distance"], 42.0);
    }

    #[test]
    fn test_render_session_plain() {
        let coords = [coord(48.2, 16.37), coord(48.21, 16.38)];
        let out =
            render_session(&closed_session(7, 1300.0), &coords, OutputFormat::Plain, ISO).unwrap();

        assert!(out.starts_with("Session 7"));
        assert!(out.contains("Points:    2"));
        assert!(out.contains("centre 48.200000, 16.370000"));
        assert!(out.contains("Bounds:"));
        assert!(!out.contains("LAT"));
    }

    #[test]
    fn test_render_session_table_lists_points() {
        let coords = [coord(48.2, 16.37), coord(48.21, 16.38)];
        let out =
            render_session(&closed_session(7, 1300.0), &coords, OutputFormat::Table, ISO).unwrap();

        assert!(out.contains("LAT"));
        assert!(out.contains("48.210000"));
    }

    #[test]
    fn test_render_session_json_includes_map() {
        let out = render_session(&closed_session(7, 0.0), &[], OutputFormat::Json, ISO).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["session"]["id"], 7);
        assert_eq!(value["coordinates"].as_array().unwrap().len(), 0);
        assert_eq!(value["map"]["camera"]["latitude"], 41.303_921);
        assert!(value["map"].get("polyline").is_none());
    }
}
