use log::trace;

use crate::engine::{SongTime, TimingEngine};
use crate::error::Result;
use crate::notes::{IntoNote, Note, NoteType};

/// What happens to notes the player can't hit, such as notes in warps or
/// fake segments.
///
/// The default is `Keep`, so nothing is rewritten or lost unless asked for.
/// Pick `TapToFake` to get the usual simfile-library treatment, where warped
/// taps turn into fakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnhittableNotes {
    /// Pass them through with `hittable` unset.
    #[default]
    Keep,
    Drop,
    /// Taps become fakes. Other unhittable notes are dropped.
    TapToFake,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedNote {
    pub time: SongTime,
    pub note: Note,
    pub hittable: bool,
}

/// Pairs each note with the time it has to be hit.
pub fn time_notes<I>(notes: I, engine: &TimingEngine, unhittable: UnhittableNotes) -> TimedNotes<'_, I::IntoIter>
where
    I: IntoIterator,
    I::Item: IntoNote,
{
    TimedNotes {
        notes: notes.into_iter(),
        engine,
        unhittable,
    }
}

#[derive(Debug)]
pub struct TimedNotes<'a, I> {
    notes: I,
    engine: &'a TimingEngine,
    unhittable: UnhittableNotes,
}

impl<I> Iterator for TimedNotes<'_, I>
where
    I: Iterator,
    I::Item: IntoNote,
{
    type Item = Result<TimedNote>;

    fn next(&mut self) -> Option<Result<TimedNote>> {
        loop {
            let mut note = match self.notes.next()?.into_note() {
                Ok(note) => note,
                Err(e) => return Some(Err(e)),
            };
            let hittable = self.engine.hittable(note.beat);
            if !hittable {
                match self.unhittable {
                    UnhittableNotes::Keep => {}
                    UnhittableNotes::Drop => {
                        trace!("Dropping unhittable note at beat {}", note.beat);
                        continue;
                    }
                    UnhittableNotes::TapToFake if note.note_type == NoteType::Tap => {
                        note = note.with_type(NoteType::Fake);
                    }
                    UnhittableNotes::TapToFake => continue,
                }
            }
            return Some(Ok(TimedNote {
                time: self.engine.time_at(note.beat),
                note,
                hittable,
            }));
        }
    }
}
