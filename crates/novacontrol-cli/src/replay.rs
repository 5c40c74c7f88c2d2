//! JSON-lines replay producer
//!
//! Stands in for the perception pipeline: each line is a wire-form event
//! (`{"ts":..,"type":..,"name":..,"confidence":..,"meta":{..}}`). Events are
//! published in timestamp order and paced by the gaps between timestamps.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use novacontrol_core::{Event, EventBus, RawEvent};

/// Longest pause honoured between two replayed events
const MAX_GAP: Duration = Duration::from_secs(5);

/// Parse a replay file's contents.
///
/// Blank lines and `#` comments are skipped; malformed lines are logged and
/// skipped. The result is stably sorted by timestamp.
pub fn parse(content: &str) -> Vec<Event> {
    let mut events: Vec<Event> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .filter_map(|(index, line)| match parse_line(line) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping replay line");
                None
            }
        })
        .collect();
    events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    events
}

fn parse_line(line: &str) -> Result<Event> {
    let raw: RawEvent = serde_json::from_str(line).context("invalid JSON")?;
    Ok(Event::try_from(raw)?)
}

/// Wait between two events, capped at [`MAX_GAP`]
pub fn gap(previous: f64, next: f64) -> Duration {
    let secs = next - previous;
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs).min(MAX_GAP)
    } else {
        Duration::ZERO
    }
}

/// Publish every event in `path`, returning how many were sent
pub async fn run(bus: EventBus, path: &Path, cancel: CancellationToken) -> Result<usize> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read replay file {}", path.display()))?;
    let events = parse(&content);
    info!(path = %path.display(), events = events.len(), "Replay started");

    let mut previous: Option<f64> = None;
    let mut sent = 0;
    for event in events {
        if let Some(previous) = previous {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(gap(previous, event.timestamp)) => {}
            }
        }
        if cancel.is_cancelled() {
            break;
        }
        previous = Some(event.timestamp);
        debug!(kind = %event.kind(), name = event.name(), ts = event.timestamp, "Replaying");
        bus.publish(event);
        sent += 1;
    }
    info!(sent, "Replay finished");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use novacontrol_core::event::Gesture;
    use novacontrol_core::{EventKind, Payload};
    use std::io::Write;

    const SAMPLE: &str = r#"
# pinch and release
{"ts": 0.5, "type": "gesture", "name": "PINCH", "confidence": 0.9}
{"ts": 0.0, "type": "mode", "name": "ARMED"}
{"ts": 0.25, "type": "point", "name": "CURSOR", "meta": {"x_norm": 0.5, "y_norm": 0.25}}
not json
{"ts": 0.75, "type": "telemetry", "name": "FPS"}
{"ts": 1.0, "type": "gesture", "name": "NONE", "confidence": 0.9}
"#;

    #[test]
    fn test_parse_sorts_and_skips_bad_lines() {
        let events = parse(SAMPLE);
        let summary: Vec<_> = events
            .iter()
            .map(|e| (e.timestamp, e.kind(), e.name().to_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0.0, EventKind::Mode, "ARMED".to_string()),
                (0.25, EventKind::Point, "CURSOR".to_string()),
                (0.5, EventKind::Gesture, "PINCH".to_string()),
                (1.0, EventKind::Gesture, "NONE".to_string()),
            ]
        );
        assert_eq!(
            events[2].payload,
            Payload::Gesture {
                gesture: Gesture::Pinch,
                handedness: None
            }
        );
    }

    #[test]
    fn test_gap_is_clamped() {
        assert_eq!(gap(1.0, 1.5), Duration::from_millis(500));
        assert_eq!(gap(2.0, 1.0), Duration::ZERO);
        assert_eq!(gap(0.0, 60.0), MAX_GAP);
        assert_eq!(gap(0.0, f64::NAN), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_run_publishes_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"ts": 0.01, "type": "system", "name": "TRACKING_LOST"}}"#).unwrap();
        writeln!(file, r#"{{"ts": 0.0, "type": "mode", "name": "SAFE"}}"#).unwrap();

        let bus = EventBus::new(8);
        let mut all = bus.subscribe(novacontrol_core::Topic::All);
        let sent = run(bus.clone(), file.path(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sent, 2);
        assert_eq!(all.try_recv().map(|e| e.kind()), Some(EventKind::Mode));
        assert_eq!(all.try_recv().map(|e| e.kind()), Some(EventKind::System));
    }

    #[tokio::test]
    async fn test_run_missing_file_fails() {
        let bus = EventBus::new(8);
        let result = run(bus, Path::new("/nonexistent/replay.jsonl"), CancellationToken::new()).await;
        assert!(result.is_err());
    }
}
