use std::cmp::Ordering;
use std::fmt;
use std::ops::BitOr;

use log::debug;
use num_integer::Integer;

use crate::beat::{BEATS_PER_MEASURE, Beat};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NoteType {
    Tap,
    HoldHead,
    Tail,
    RollHead,
    Attack,
    Fake,
    Keysound,
    Lift,
    Mine,
}

impl NoteType {
    pub const ALL: [Self; 9] = [
        Self::Tap,
        Self::HoldHead,
        Self::Tail,
        Self::RollHead,
        Self::Attack,
        Self::Fake,
        Self::Keysound,
        Self::Lift,
        Self::Mine,
    ];

    pub const fn code(self) -> char {
        match self {
            Self::Tap => '1',
            Self::HoldHead => '2',
            Self::Tail => '3',
            Self::RollHead => '4',
            Self::Attack => 'A',
            Self::Fake => 'F',
            Self::Keysound => 'K',
            Self::Lift => 'L',
            Self::Mine => 'M',
        }
    }

    /// Letter codes are accepted in either case.
    pub const fn from_code(code: char) -> Option<Self> {
        Some(match code.to_ascii_uppercase() {
            '1' => Self::Tap,
            '2' => Self::HoldHead,
            '3' => Self::Tail,
            '4' => Self::RollHead,
            'A' => Self::Attack,
            'F' => Self::Fake,
            'K' => Self::Keysound,
            'L' => Self::Lift,
            'M' => Self::Mine,
            _ => return None,
        })
    }

    pub const fn is_head(self) -> bool {
        matches!(self, Self::HoldHead | Self::RollHead)
    }

    /// Types the player has to step on.
    pub const fn is_press(self) -> bool {
        matches!(self, Self::Tap | Self::HoldHead | Self::RollHead | Self::Lift)
    }

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A set of note types.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NoteTypes(u16);

impl NoteTypes {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self::of(&NoteType::ALL);
    pub const HEADS: Self = Self::of(&[NoteType::HoldHead, NoteType::RollHead]);
    pub const HEADS_AND_TAILS: Self = Self::of(&[NoteType::HoldHead, NoteType::RollHead, NoteType::Tail]);
    pub const PRESSES: Self = Self::of(&[
        NoteType::Tap,
        NoteType::HoldHead,
        NoteType::RollHead,
        NoteType::Lift,
    ]);

    pub const fn of(types: &[NoteType]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < types.len() {
            bits |= types[i].bit();
            i += 1;
        }
        Self(bits)
    }

    pub const fn contains(self, note_type: NoteType) -> bool {
        self.0 & note_type.bit() != 0
    }

    #[must_use]
    pub const fn with(self, note_type: NoteType) -> Self {
        Self(self.0 | note_type.bit())
    }

    #[must_use]
    pub const fn without(self, note_type: NoteType) -> Self {
        Self(self.0 & !note_type.bit())
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = NoteType> {
        NoteType::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl BitOr for NoteTypes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<NoteType> for NoteTypes {
    type Output = Self;

    fn bitor(self, rhs: NoteType) -> Self {
        self.with(rhs)
    }
}

impl From<NoteType> for NoteTypes {
    fn from(note_type: NoteType) -> Self {
        Self(note_type.bit())
    }
}

impl FromIterator<NoteType> for NoteTypes {
    fn from_iter<I: IntoIterator<Item = NoteType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Debug for NoteTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// One non-empty cell of the step grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Note {
    pub beat: Beat,
    pub column: usize,
    pub note_type: NoteType,
    /// Second performer in routine charts is player 1.
    pub player: usize,
    pub keysound_index: Option<u32>,
}

impl Note {
    pub fn new(beat: Beat, column: usize, note_type: NoteType) -> Self {
        Self {
            beat,
            column,
            note_type,
            player: 0,
            keysound_index: None,
        }
    }

    #[must_use]
    pub fn with_type(self, note_type: NoteType) -> Self {
        Self { note_type, ..self }
    }

    fn position(&self) -> (usize, Beat, usize) {
        (self.player, self.beat, self.column)
    }
}

/// Grid order: player, then beat, then column.
impl Ord for Note {
    fn cmp(&self, other: &Self) -> Ordering {
        self.position()
            .cmp(&other.position())
            .then_with(|| self.note_type.cmp(&other.note_type))
            .then_with(|| self.keysound_index.cmp(&other.keysound_index))
    }
}

impl PartialOrd for Note {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The cell as it appears in the grid, e.g. `1` or `2[14]`.
impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.note_type)?;
        if let Some(index) = self.keysound_index {
            write!(f, "[{index}]")?;
        }
        Ok(())
    }
}

/// Anything a note stream can carry: plain notes, borrowed notes, or the
/// results of a fallible stream such as [`NoteIter`].
pub trait IntoNote {
    fn into_note(self) -> Result<Note>;
}

impl IntoNote for Note {
    #[inline(always)]
    fn into_note(self) -> Result<Note> {
        Ok(self)
    }
}

impl IntoNote for &Note {
    #[inline(always)]
    fn into_note(self) -> Result<Note> {
        Ok(*self)
    }
}

impl IntoNote for Result<Note> {
    #[inline(always)]
    fn into_note(self) -> Result<Note> {
        self
    }
}

/// A chart's step grid.
///
/// Holds the grid text as given; notes are produced on demand by
/// [`NoteData::iter`], one measure at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteData {
    text: String,
    columns: usize,
}

impl NoteData {
    pub fn new(text: impl Into<String>, columns: usize) -> Self {
        Self {
            text: text.into(),
            columns,
        }
    }

    /// Takes the column count from the first row.
    pub fn detect(text: impl Into<String>) -> Self {
        let text = text.into();
        let columns = detect_columns(&text);
        Self { text, columns }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn iter(&self) -> NoteIter<'_> {
        NoteIter::new(&self.text, self.columns)
    }

    /// Writes notes back out as a grid.
    ///
    /// Notes must be sorted, on non-negative beats and inside `columns`.
    /// Each measure gets as many rows as its finest note needs.
    pub fn from_notes<I>(notes: I, columns: usize) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: IntoNote,
    {
        let mut out = String::new();
        let mut measure: Vec<Note> = Vec::new();
        let mut last_player: Option<usize> = None;
        let mut last_measure: Option<i64> = None;
        let mut previous: Option<Note> = None;

        for item in notes {
            let note = item.into_note()?;
            if note.beat.is_negative() {
                return Err(Error::format_at(note.beat, Some(note.column), "note on a negative beat"));
            }
            if note.column >= columns {
                return Err(Error::format_at(
                    note.beat,
                    Some(note.column),
                    format!("column out of range for {columns} columns"),
                ));
            }
            if previous.is_some_and(|p| p.position() > note.position()) {
                return Err(Error::format_at(note.beat, Some(note.column), "notes are not sorted"));
            }
            previous = Some(note);

            if last_player != Some(note.player) {
                let skipped = match last_player {
                    Some(player) => {
                        write_measure(&mut out, &measure, columns);
                        measure.clear();
                        out.push_str("&\n");
                        player + 1
                    }
                    None => 0,
                };
                for _ in skipped..note.player {
                    write_measure(&mut out, &[], columns);
                    out.push_str("&\n");
                }
                last_player = Some(note.player);
                last_measure = None;
            }

            let m = note.beat.measure();
            if last_measure != Some(m) {
                let skipped = match last_measure {
                    Some(last) => {
                        write_measure(&mut out, &measure, columns);
                        measure.clear();
                        out.push_str(",\n");
                        last + 1
                    }
                    None => 0,
                };
                for _ in skipped..m {
                    write_measure(&mut out, &[], columns);
                    out.push_str(",\n");
                }
                last_measure = Some(m);
            }
            measure.push(note);
        }
        write_measure(&mut out, &measure, columns);

        Ok(Self::new(out, columns))
    }
}

/// The grid text, unchanged.
impl fmt::Display for NoteData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl<'a> IntoIterator for &'a NoteData {
    type Item = Result<Note>;
    type IntoIter = NoteIter<'a>;

    fn into_iter(self) -> NoteIter<'a> {
        self.iter()
    }
}

fn detect_columns(text: &str) -> usize {
    text.split(['&', ','])
        .flat_map(str::lines)
        .map(str::trim)
        .find(|line| is_row(line))
        .map_or(0, |line| strip_keysounds(line).chars().count())
}

fn is_row(line: &str) -> bool {
    !line.is_empty() && !line.starts_with("//")
}

fn strip_keysounds(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut depth = 0usize;
    for ch in line.chars() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Rows for a measure, as a multiple of 4, fine enough for every note in it.
fn measure_rows(notes: &[Note]) -> i64 {
    let per_beat = notes.iter().fold(1i64, |acc, n| acc.lcm(&n.beat.denom()));
    per_beat * BEATS_PER_MEASURE
}

fn write_measure(out: &mut String, notes: &[Note], columns: usize) {
    let rows = measure_rows(notes);
    let per_beat = rows / BEATS_PER_MEASURE;
    let mut cells: Vec<Option<Note>> = vec![None; columns];
    let mut pending = notes.iter().peekable();

    for row in 0..rows {
        cells.fill(None);
        while let Some(note) = pending.peek() {
            let offset = note.beat.beat_in_measure();
            let note_row = offset.numer() * (per_beat / offset.denom());
            if note_row != row {
                break;
            }
            cells[note.column] = Some(**note);
            pending.next();
        }
        for cell in &cells {
            match cell {
                Some(note) => out.push_str(&note.to_string()),
                None => out.push('0'),
            }
        }
        out.push('\n');
    }
}

/// Lazy note stream over a grid, in (player, beat, column) order.
///
/// Parses one measure at a time. After an error the iterator is exhausted.
#[derive(Debug)]
pub struct NoteIter<'a> {
    columns: usize,
    players: std::iter::Enumerate<std::str::Split<'a, char>>,
    measures: Option<(usize, std::iter::Enumerate<std::str::Split<'a, char>>)>,
    buffer: std::vec::IntoIter<Note>,
    failed: bool,
}

impl<'a> NoteIter<'a> {
    fn new(text: &'a str, columns: usize) -> Self {
        Self {
            columns,
            players: text.split('&').enumerate(),
            measures: None,
            buffer: Vec::new().into_iter(),
            failed: false,
        }
    }

    fn next_measure(&mut self) -> Option<Result<Vec<Note>>> {
        loop {
            if let Some((player, measures)) = &mut self.measures {
                if let Some((index, measure)) = measures.next() {
                    let player = *player;
                    return Some(parse_measure(measure, player, index as i64, self.columns));
                }
            }
            let (player, text) = self.players.next()?;
            self.measures = Some((player, text.split(',').enumerate()));
        }
    }
}

impl Iterator for NoteIter<'_> {
    type Item = Result<Note>;

    fn next(&mut self) -> Option<Result<Note>> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(note) = self.buffer.next() {
                return Some(Ok(note));
            }
            match self.next_measure()? {
                Ok(notes) => self.buffer = notes.into_iter(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn parse_measure(measure: &str, player: usize, index: i64, columns: usize) -> Result<Vec<Note>> {
    let rows: Vec<&str> = measure.trim().lines().map(str::trim).filter(|l| is_row(l)).collect();
    let subdivision = rows.len() as i64;
    let mut notes = Vec::new();
    for (l, row) in rows.iter().enumerate() {
        let beat = Beat::new(
            index * BEATS_PER_MEASURE * subdivision + l as i64 * BEATS_PER_MEASURE,
            subdivision,
        );
        parse_row(row, beat, player, columns, &mut notes)?;
    }
    Ok(notes)
}

fn parse_row(row: &str, beat: Beat, player: usize, columns: usize, out: &mut Vec<Note>) -> Result<()> {
    let mut cells = row.char_indices().peekable();
    let mut column = 0usize;

    while let Some((_, code)) = cells.next() {
        let mut keysound_index = None;
        if let Some(&(open, '[')) = cells.peek() {
            let close = row[open..]
                .find(']')
                .map(|i| open + i)
                .ok_or_else(|| Error::format_at(beat, Some(column), "unterminated keysound index"))?;
            let digits = &row[open + 1..close];
            keysound_index = Some(digits.parse::<u32>().map_err(|_| {
                Error::format_at(beat, Some(column), format!("invalid keysound index {digits:?}"))
            })?);
            while cells.next_if(|&(i, _)| i <= close).is_some() {}
        }

        if column >= columns {
            debug!("Ignoring cells past column {columns} at beat {beat}");
            break;
        }
        if code != '0' {
            let note_type = NoteType::from_code(code).ok_or_else(|| {
                Error::format_at(beat, Some(column), format!("unknown note type {code:?}"))
            })?;
            out.push(Note {
                beat,
                column,
                note_type,
                player,
                keysound_index,
            });
        }
        column += 1;
    }
    Ok(())
}
