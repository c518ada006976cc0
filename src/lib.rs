pub mod beat;
pub mod count;
pub mod decimal;
pub mod engine;
pub mod error;
pub mod group;
pub mod notes;
pub mod report;
pub mod timed;
pub mod timing;

// Re-export the primary data structures for library users
pub use beat::Beat;
pub use count::{ChartCounts, JumpCounting};
pub use decimal::Decimal;
pub use engine::{EngineOptions, Hittability, SongTime, TimingEngine, TimingIssue};
pub use error::{Error, Result};
pub use group::{GroupOptions, GroupedNote, GroupedNotes, NoteWithTail, OrphanPolicy, SameBeatNotes, group_notes, ungroup_notes};
pub use notes::{Note, NoteData, NoteType, NoteTypes};
pub use report::{ChartReport, NoteTiming, OutputMode};
pub use timed::{TimedNote, UnhittableNotes, time_notes};
pub use timing::{BeatValues, DisplayBpm, TimingData};

use std::time::Instant;

use log::debug;

/// Options for controlling chart analysis.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalysisOptions {
    pub engine: EngineOptions,
    pub jump_counting: JumpCounting,
    pub unhittable: UnhittableNotes,
}

/// Times and counts one chart in a single pass over its notes.
///
/// Counts cover the notes left after `options.unhittable` is applied, so
/// `Drop` leaves warped and faked notes out of every count.
pub fn analyze(notes: &NoteData, timing: &TimingData, options: AnalysisOptions) -> Result<ChartReport> {
    let start = Instant::now();
    let engine = TimingEngine::with_options(timing, options.engine);

    let mut first: Option<NoteTiming> = None;
    let mut last: Option<NoteTiming> = None;
    let mut unhittable = 0;
    let stream = time_notes(notes, &engine, options.unhittable).map(|timed| -> Result<Note> {
        let timed = timed?;
        if !timed.hittable {
            unhittable += 1;
        }
        let timing = NoteTiming::from(&timed);
        if first.is_none() {
            first = Some(timing.clone());
        }
        last = Some(timing);
        Ok(timed.note)
    });
    let counts = ChartCounts::tally(stream, options.jump_counting)?;

    let duration = match (&first, &last) {
        (Some(first), Some(last)) => Some(&last.time - &first.time),
        _ => None,
    };
    let display_bpm = DisplayBpm::parse(timing.display_bpm.as_deref(), timing);
    debug!("Analyzed chart in {:?}", start.elapsed());

    Ok(ChartReport {
        columns: notes.columns(),
        bpms: timing.bpms.to_string(),
        display_bpm: display_bpm.to_string(),
        min_bpm: display_bpm.min().to_f64(),
        max_bpm: display_bpm.max().to_f64(),
        counts,
        unhittable,
        first_note: first,
        last_note: last,
        duration,
        issues: engine.issues().iter().map(ToString::to_string).collect(),
    })
}
