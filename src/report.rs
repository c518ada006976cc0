use std::fmt::Write;

use serde::Serialize;

use crate::count::ChartCounts;
use crate::engine::SongTime;
use crate::timed::TimedNote;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteTiming {
    pub beat: f64,
    pub column: usize,
    pub time: SongTime,
}

impl From<&TimedNote> for NoteTiming {
    fn from(timed: &TimedNote) -> Self {
        Self {
            beat: timed.note.beat.to_f64(),
            column: timed.note.column,
            time: timed.time.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartReport {
    pub columns: usize,
    pub bpms: String,
    /// As a song wheel would show it.
    pub display_bpm: String,
    pub min_bpm: f64,
    pub max_bpm: f64,
    pub counts: ChartCounts,
    /// Notes that came through flagged as unhittable.
    pub unhittable: u32,
    pub first_note: Option<NoteTiming>,
    pub last_note: Option<NoteTiming>,
    pub duration: Option<SongTime>,
    pub issues: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Pretty,
    Json,
}

pub fn render_report(report: &ChartReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Pretty => render_pretty(report),
        OutputMode::Json => render_json(report),
    }
}

fn format_duration(seconds: f64) -> String {
    let millis = (seconds * 1000.0).round() as i64;
    let minutes = millis / 60_000;
    let seconds = (millis % 60_000) as f64 / 1000.0;
    format!("{}m {:06.3}s", minutes, seconds)
}

fn format_bpm(bpm: f64) -> String {
    if bpm.fract().abs() < f64::EPSILON {
        format!("{bpm:.0}")
    } else {
        format!("{bpm:.2}")
    }
}

fn render_pretty(report: &ChartReport) -> String {
    let c = &report.counts;
    let mut out = String::new();

    let _ = writeln!(out, "--- Chart ---");
    let _ = writeln!(out, "Columns: {}", report.columns);
    if (report.max_bpm - report.min_bpm).abs() < f64::EPSILON {
        let _ = writeln!(out, "BPM: {}", format_bpm(report.min_bpm));
    } else {
        let _ = writeln!(out, "BPM: {}-{}", format_bpm(report.min_bpm), format_bpm(report.max_bpm));
    }
    let _ = writeln!(out, "Display BPM: {}", report.display_bpm);
    if let Some(duration) = &report.duration {
        let _ = writeln!(out, "Length: {}", format_duration(duration.as_f64()));
    }
    if let (Some(first), Some(last)) = (&report.first_note, &report.last_note) {
        let _ = writeln!(out, "First note: beat {:.3} at {}s", first.beat, first.time);
        let _ = writeln!(out, "Last note: beat {:.3} at {}s", last.beat, last.time);
    }

    let _ = writeln!(out, "\n--- Counts ---");
    let _ = writeln!(out, "Steps: {}  Arrows: {}  Taps: {}", c.steps, c.arrows, c.taps);
    let _ = writeln!(out, "Jumps: {}  Hands: {}", c.jumps, c.hands);
    let _ = writeln!(out, "Holds: {}  Rolls: {}  Lifts: {}", c.holds, c.rolls, c.lifts);
    let _ = writeln!(out, "Mines: {}  Fakes: {}", c.mines, c.fakes);
    if report.unhittable > 0 {
        let _ = writeln!(out, "Unhittable: {}", report.unhittable);
    }

    if !report.issues.is_empty() {
        let _ = writeln!(out, "\n--- Timing issues ---");
        for issue in &report.issues {
            let _ = writeln!(out, "{issue}");
        }
    }
    out
}

fn render_json(report: &ChartReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use num_rational::BigRational;

    fn time(numer: i64, denom: i64) -> SongTime {
        SongTime::new(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    fn report() -> ChartReport {
        ChartReport {
            columns: 4,
            bpms: "0.000=150.000".to_owned(),
            display_bpm: "*".to_owned(),
            min_bpm: 150.0,
            max_bpm: 150.0,
            counts: ChartCounts {
                steps: 3,
                arrows: 4,
                jumps: 1,
                taps: 4,
                ..ChartCounts::default()
            },
            unhittable: 0,
            first_note: Some(NoteTiming {
                beat: 0.0,
                column: 0,
                time: time(0, 1),
            }),
            last_note: Some(NoteTiming {
                beat: 200.0,
                column: 3,
                time: time(80, 1),
            }),
            duration: Some(time(80, 1)),
            issues: vec!["warps overlap at beat 3.000".to_owned()],
        }
    }

    #[test]
    fn pretty_lists_counts_and_issues() {
        let text = render_report(&report(), OutputMode::Pretty);
        assert!(text.contains("\nBPM: 150\n"));
        assert!(text.contains("Display BPM: *\n"));
        assert!(text.contains("Length: 1m 20.000s"));
        assert!(text.contains("Steps: 3  Arrows: 4  Taps: 4"));
        assert!(text.contains("Jumps: 1  Hands: 0"));
        assert!(text.contains("warps overlap at beat 3.000"));
        assert!(!text.contains("Unhittable"));
    }

    #[test]
    fn json_keeps_field_order() {
        let text = render_report(&report(), OutputMode::Json);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys[0], "columns");
        assert_eq!(keys.last().unwrap(), "issues");
        assert_eq!(value["counts"]["steps"], 3);
        assert_eq!(value["last_note"]["time"], 80.0);
        assert_eq!(value["duration"], 80.0);
    }

    #[test]
    fn durations_format_as_minutes() {
        assert_eq!(format_duration(0.0), "0m 00.000s");
        assert_eq!(format_duration(61.5), "1m 01.500s");
    }
}
