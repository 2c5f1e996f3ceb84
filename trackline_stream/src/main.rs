//! Trackline stream host CLI
//!
//! Reads newline-delimited JSON [`StreamEvent`]s on stdin and writes each
//! emitted trajectory event as one JSON line on stdout. Events that yield
//! no trajectory (first point of a track, stationary point, rejected
//! geometry) produce no output line.
//!
//! The literal input line `!clear` drops every track immediately - the
//! administrative cache reset.

use std::io::{self, BufRead, Write};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use trackline_core::{ProcessorConfig, StreamEvent, StreamProcessor, TimeField, TimeUnit};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimeFieldArg {
    StartTime,
    EndTime,
    ReceivedTime,
}

impl From<TimeFieldArg> for TimeField {
    fn from(arg: TimeFieldArg) -> Self {
        match arg {
            TimeFieldArg::StartTime => TimeField::StartTime,
            TimeFieldArg::EndTime => TimeField::EndTime,
            TimeFieldArg::ReceivedTime => TimeField::ReceivedTime,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimeUnitArg {
    Millis,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl From<TimeUnitArg> for TimeUnit {
    fn from(arg: TimeUnitArg) -> Self {
        match arg {
            TimeUnitArg::Millis => TimeUnit::Millis,
            TimeUnitArg::Seconds => TimeUnit::Seconds,
            TimeUnitArg::Minutes => TimeUnit::Minutes,
            TimeUnitArg::Hours => TimeUnit::Hours,
            TimeUnitArg::Days => TimeUnit::Days,
        }
    }
}

/// Trackline trajectory stream host
#[derive(Parser, Debug)]
#[command(name = "trackline-stream")]
#[command(about = "Build per-track trajectories from an NDJSON event stream", long_about = None)]
struct Args {
    /// Window by event count instead of a time span
    #[arg(short, long)]
    count_window: bool,

    /// Count limit or time span magnitude
    #[arg(short = 'w', long, default_value = "5")]
    window_value: i64,

    /// Unit of the window value in time mode
    #[arg(short = 'u', long, value_enum, default_value = "seconds")]
    window_unit: TimeUnitArg,

    /// Event timestamp that keys each track's history
    #[arg(short = 'f', long, value_enum, default_value = "start-time")]
    time_field: TimeFieldArg,

    /// Maximum number of tracks held at once
    #[arg(long, default_value = "20000")]
    track_ceiling: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            count_window: self.count_window,
            window_value: self.window_value,
            window_unit: self.window_unit.into(),
            time_field: self.time_field.into(),
            track_ceiling: self.track_ceiling,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let processor = StreamProcessor::new(args.processor_config())
        .context("invalid window configuration")?;

    if args.count_window {
        info!(limit = args.window_value, "windowing by event count");
    } else {
        info!(
            value = args.window_value,
            unit = ?args.window_unit,
            field = ?args.time_field,
            "windowing by time span"
        );
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let mut received = 0u64;
    let mut emitted = 0u64;

    for line in stdin.lock().lines() {
        let line = line.context("failed to read from stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "!clear" {
            processor.clear_tracks();
            info!("cleared all tracks");
            continue;
        }

        let event: StreamEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "skipping malformed input line");
                continue;
            }
        };
        received += 1;

        if let Some(out) = processor.process(&event) {
            let json = serde_json::to_string(&out).context("failed to serialize output event")?;
            writeln!(stdout, "{json}").context("failed to write to stdout")?;
            emitted += 1;
        }
    }

    let stats = processor.registry().stats();
    info!(
        received,
        emitted,
        tracks = stats.track_count,
        retained_points = stats.point_count,
        "stream finished"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Geometry;
    use serde_json::Value;
    use trackline_core::{EventGeometry, SpatialReference};
    use uuid::Uuid;

    fn event(track_id: &str, time: i64, x: f64, y: f64) -> StreamEvent {
        StreamEvent {
            event_id: Uuid::new_v4(),
            definition_id: "def".to_string(),
            track_id: track_id.to_string(),
            start_time: time,
            end_time: time,
            received_time: time,
            geometry: Some(EventGeometry::point(x, y, SpatialReference::WGS84)),
            attributes: Value::Null,
        }
    }

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["trackline-stream"]);
        assert!(!args.count_window);
        assert_eq!(args.window_value, 5);
        assert_eq!(args.track_ceiling, 20_000);

        let config = args.processor_config();
        assert_eq!(config.window_unit, TimeUnit::Seconds);
        assert_eq!(config.time_field, TimeField::StartTime);
    }

    #[test]
    fn test_count_window_args_drive_processor() {
        let args = Args::parse_from(["trackline-stream", "--count-window", "-w", "3"]);
        let processor = StreamProcessor::new(args.processor_config()).unwrap();

        processor.process(&event("bus", 1_000, 0.0, 0.0));
        let out = processor.process(&event("bus", 2_000, 1.0, 1.0)).unwrap();

        match out.geometry.unwrap().shape {
            Geometry::LineString(path) => assert_eq!(path.0.len(), 2),
            other => panic!("expected a line string, got {other:?}"),
        }
    }

    #[test]
    fn test_event_line_round_trip() {
        let input = serde_json::to_string(&event("bus", 1_000, 0.0, 0.0)).unwrap();
        let parsed: StreamEvent = serde_json::from_str(&input).unwrap();
        assert_eq!(parsed.track_id, "bus");
    }
}
