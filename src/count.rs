use serde::Serialize;

use crate::beat::Beat;
use crate::error::Result;
use crate::group::IntoGroupedNotes;
use crate::notes::{IntoNote, Note, NoteType};

/// How a row with several presses adds to the step count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JumpCounting {
    /// One step per row, the way StepMania counts.
    #[default]
    Once,
    /// One step per press.
    PerNote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChartCounts {
    pub steps: u32,
    /// Taps, hold heads, roll heads and lifts.
    pub arrows: u32,
    pub jumps: u32,
    pub hands: u32,
    pub holds: u32,
    pub rolls: u32,
    pub mines: u32,
    pub taps: u32,
    pub lifts: u32,
    pub fakes: u32,
}

#[derive(Debug, Default)]
struct Row {
    key: Option<(usize, Beat)>,
    pressed: Vec<usize>,
    heads: Vec<usize>,
    tails: Vec<usize>,
}

impl ChartCounts {
    /// Counts everything in a single pass over a note stream.
    ///
    /// Hands count rows where presses plus the columns still held by an
    /// earlier hold or roll reach three. A hold is still held on its tail
    /// row.
    pub fn tally<I>(notes: I, jumps: JumpCounting) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: IntoNote,
    {
        let mut counts = Self::default();
        let mut row = Row::default();
        // (player, column) of holds and rolls whose tail row hasn't passed
        let mut held: Vec<(usize, usize)> = Vec::new();

        for note in notes {
            let note = note.into_note()?;
            let key = (note.player, note.beat);
            if row.key != Some(key) {
                counts.close_row(&row, &mut held, jumps);
                row = Row {
                    key: Some(key),
                    ..Row::default()
                };
            }
            counts.add(&note, &mut row);
        }
        counts.close_row(&row, &mut held, jumps);
        Ok(counts)
    }

    fn add(&mut self, note: &Note, row: &mut Row) {
        match note.note_type {
            NoteType::Tap => self.taps += 1,
            NoteType::HoldHead => self.holds += 1,
            NoteType::RollHead => self.rolls += 1,
            NoteType::Lift => self.lifts += 1,
            NoteType::Mine => self.mines += 1,
            NoteType::Fake => self.fakes += 1,
            NoteType::Tail => row.tails.push(note.column),
            NoteType::Keysound | NoteType::Attack => {}
        }
        if note.note_type.is_press() {
            self.arrows += 1;
            row.pressed.push(note.column);
        }
        if note.note_type.is_head() {
            row.heads.push(note.column);
        }
    }

    fn close_row(&mut self, row: &Row, held: &mut Vec<(usize, usize)>, jumps: JumpCounting) {
        let Some((player, _)) = row.key else {
            return;
        };

        let presses = row.pressed.len() as u32;
        if presses > 0 {
            self.steps += match jumps {
                JumpCounting::Once => 1,
                JumpCounting::PerNote => presses,
            };
            if presses >= 2 {
                self.jumps += 1;
            }
            let holding = held
                .iter()
                .filter(|(p, column)| *p == player && !row.pressed.contains(column))
                .count() as u32;
            if presses + holding >= 3 {
                self.hands += 1;
            }
        }

        held.retain(|(p, column)| *p != player || !row.tails.contains(column));
        held.extend(row.heads.iter().map(|column| (player, *column)));
    }
}

/// Rows with at least one press.
pub fn count_steps<I>(notes: I, jumps: JumpCounting) -> Result<u32>
where
    I: IntoIterator,
    I::Item: IntoNote,
{
    ChartCounts::tally(notes, jumps).map(|c| c.steps)
}

/// Rows with two or more presses.
pub fn count_jumps<I>(notes: I) -> Result<u32>
where
    I: IntoIterator,
    I::Item: IntoNote,
{
    ChartCounts::tally(notes, JumpCounting::Once).map(|c| c.jumps)
}

pub fn count_hands<I>(notes: I) -> Result<u32>
where
    I: IntoIterator,
    I::Item: IntoNote,
{
    ChartCounts::tally(notes, JumpCounting::Once).map(|c| c.hands)
}

pub fn count_holds<I>(notes: I) -> Result<u32>
where
    I: IntoIterator,
    I::Item: IntoNote,
{
    count_type(notes, NoteType::HoldHead)
}

pub fn count_rolls<I>(notes: I) -> Result<u32>
where
    I: IntoIterator,
    I::Item: IntoNote,
{
    count_type(notes, NoteType::RollHead)
}

pub fn count_mines<I>(notes: I) -> Result<u32>
where
    I: IntoIterator,
    I::Item: IntoNote,
{
    count_type(notes, NoteType::Mine)
}

pub fn count_taps<I>(notes: I) -> Result<u32>
where
    I: IntoIterator,
    I::Item: IntoNote,
{
    count_type(notes, NoteType::Tap)
}

pub fn count_lifts<I>(notes: I) -> Result<u32>
where
    I: IntoIterator,
    I::Item: IntoNote,
{
    count_type(notes, NoteType::Lift)
}

pub fn count_fakes<I>(notes: I) -> Result<u32>
where
    I: IntoIterator,
    I::Item: IntoNote,
{
    count_type(notes, NoteType::Fake)
}

fn count_type<I>(notes: I, note_type: NoteType) -> Result<u32>
where
    I: IntoIterator,
    I::Item: IntoNote,
{
    let mut count = 0;
    for note in notes {
        if note.into_note()?.note_type == note_type {
            count += 1;
        }
    }
    Ok(count)
}

/// Counts groups holding at least `same_beat_minimum` notes.
pub fn count_grouped<I>(groups: I, same_beat_minimum: usize) -> Result<u32>
where
    I: IntoIterator,
    I::Item: IntoGroupedNotes,
{
    let mut count = 0;
    for group in groups {
        if group.into_grouped()?.len() >= same_beat_minimum {
            count += 1;
        }
    }
    Ok(count)
}
