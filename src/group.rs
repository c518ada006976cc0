use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::iter::Fuse;
use std::mem;

use log::debug;

use crate::beat::Beat;
use crate::error::{Error, Result};
use crate::notes::{IntoNote, Note, NoteType, NoteTypes};

/// A hold or roll head joined to its tail. The tail always comes after the
/// head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteWithTail {
    pub note: Note,
    pub tail_beat: Beat,
    pub tail_keysound_index: Option<u32>,
}

impl NoteWithTail {
    pub fn new(note: Note, tail: &Note) -> Self {
        Self {
            note,
            tail_beat: tail.beat,
            tail_keysound_index: tail.keysound_index,
        }
    }

    /// The tail as a plain note.
    pub fn tail(&self) -> Note {
        Note {
            beat: self.tail_beat,
            note_type: NoteType::Tail,
            keysound_index: self.tail_keysound_index,
            ..self.note
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupedNote {
    Single(Note),
    Tailed(NoteWithTail),
}

impl GroupedNote {
    pub fn note(&self) -> &Note {
        match self {
            Self::Single(note) => note,
            Self::Tailed(with_tail) => &with_tail.note,
        }
    }

    pub fn tail_beat(&self) -> Option<Beat> {
        match self {
            Self::Single(_) => None,
            Self::Tailed(with_tail) => Some(with_tail.tail_beat),
        }
    }

    fn row_key(&self) -> (usize, Beat) {
        let note = self.note();
        (note.player, note.beat)
    }
}

/// One unit of grouped output; never empty.
pub type GroupedNotes = Vec<GroupedNote>;

/// What to do when several notes land on the same beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameBeatNotes {
    /// Each note is its own group.
    #[default]
    KeepSeparate,
    /// Notes of the same type share a group.
    JoinByNoteType,
    /// All notes on the beat share a group.
    JoinAll,
}

/// What to do with a head that never gets a tail, or a tail with no head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    #[default]
    Fail,
    Drop,
    /// Emit the orphan as a plain note.
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupOptions {
    /// Notes of other types are filtered out before grouping.
    pub include: NoteTypes,
    pub join_heads_to_tails: bool,
    pub same_beat: SameBeatNotes,
    pub orphaned_head: OrphanPolicy,
    pub orphaned_tail: OrphanPolicy,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            include: NoteTypes::ALL,
            join_heads_to_tails: false,
            same_beat: SameBeatNotes::KeepSeparate,
            orphaned_head: OrphanPolicy::Fail,
            orphaned_tail: OrphanPolicy::Fail,
        }
    }
}

impl GroupOptions {
    /// Same policy for orphaned heads and tails.
    #[must_use]
    pub fn with_orphans(self, policy: OrphanPolicy) -> Self {
        Self {
            orphaned_head: policy,
            orphaned_tail: policy,
            ..self
        }
    }
}

/// Groups a note stream into holds/rolls with their tails, same-beat
/// clusters, or both.
///
/// Heads and tails pair up per player and column. A tail on a column that
/// isn't holding is an orphaned tail; any other note arriving on a holding
/// column, or the end of the stream, orphans the pending head. Joined heads
/// are emitted at the head's position, so notes that arrive while a hold is
/// open are buffered until it resolves.
pub fn group_notes<I>(notes: I, options: GroupOptions) -> GroupNotes<I::IntoIter>
where
    I: IntoIterator,
    I::Item: IntoNote,
{
    GroupNotes {
        notes: notes.into_iter(),
        options,
        held: Vec::new(),
        buffer: VecDeque::new(),
        joined: VecDeque::new(),
        row: Vec::new(),
        out: VecDeque::new(),
        exhausted: false,
        failed: false,
    }
}

#[derive(Debug)]
pub struct GroupNotes<I> {
    notes: I,
    options: GroupOptions,
    held: Vec<Note>,
    buffer: VecDeque<GroupedNote>,
    joined: VecDeque<GroupedNote>,
    row: Vec<GroupedNote>,
    out: VecDeque<GroupedNotes>,
    exhausted: bool,
    failed: bool,
}

impl<I> GroupNotes<I> {
    fn push(&mut self, note: Note) -> Result<()> {
        if !self.options.join_heads_to_tails {
            self.joined.push_back(GroupedNote::Single(note));
            return Ok(());
        }

        let is_tail = note.note_type == NoteType::Tail;
        let held = self
            .held
            .iter()
            .position(|h| h.player == note.player && h.column == note.column);
        if held.is_some() || is_tail {
            let head = held.map(|i| self.held.remove(i));
            self.resolve(head, Some(note))?;
            self.flush_until_held();
        }
        if note.note_type.is_head() {
            self.held.push(note);
        }
        if !is_tail {
            if self.held.is_empty() {
                self.flush();
                self.joined.push_back(GroupedNote::Single(note));
            } else {
                self.buffer.push_back(GroupedNote::Single(note));
            }
        }
        Ok(())
    }

    fn resolve(&mut self, head: Option<Note>, next: Option<Note>) -> Result<()> {
        let tail = next.filter(|n| n.note_type == NoteType::Tail);
        let Some(head) = head else {
            return match tail {
                Some(tail) => self.orphan_tail(tail),
                None => Ok(()),
            };
        };
        match tail {
            Some(tail) if tail.beat > head.beat => {
                let position = self.buffer.iter().position(|g| *g == GroupedNote::Single(head));
                if let Some(i) = position {
                    self.buffer[i] = GroupedNote::Tailed(NoteWithTail::new(head, &tail));
                }
                Ok(())
            }
            // A tail on its head's own row can't close it.
            Some(tail) => {
                self.orphan_head(head)?;
                self.orphan_tail(tail)
            }
            None => self.orphan_head(head),
        }
    }

    fn orphan_head(&mut self, head: Note) -> Result<()> {
        match self.options.orphaned_head {
            OrphanPolicy::Fail => return Err(Error::OrphanedHead(head)),
            OrphanPolicy::Keep => {}
            OrphanPolicy::Drop => {
                debug!("Dropping orphaned head at beat {}", head.beat);
                if let Some(i) = self.buffer.iter().position(|g| *g == GroupedNote::Single(head)) {
                    self.buffer.remove(i);
                }
            }
        }
        Ok(())
    }

    fn orphan_tail(&mut self, tail: Note) -> Result<()> {
        match self.options.orphaned_tail {
            OrphanPolicy::Fail => return Err(Error::OrphanedTail(tail)),
            OrphanPolicy::Keep => self.buffer.push_back(GroupedNote::Single(tail)),
            OrphanPolicy::Drop => debug!("Dropping orphaned tail at beat {}", tail.beat),
        }
        Ok(())
    }

    fn flush(&mut self) {
        self.joined.extend(self.buffer.drain(..));
    }

    fn flush_until_held(&mut self) {
        while let Some(front) = self.buffer.front() {
            if matches!(front, GroupedNote::Single(n) if self.held.contains(n)) {
                break;
            }
            if let Some(front) = self.buffer.pop_front() {
                self.joined.push_back(front);
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        for head in mem::take(&mut self.held) {
            self.resolve(Some(head), None)?;
        }
        self.flush();
        Ok(())
    }

    fn emit_row(&mut self) {
        let row = mem::take(&mut self.row);
        match self.options.same_beat {
            SameBeatNotes::KeepSeparate => self.out.extend(row.into_iter().map(|g| vec![g])),
            SameBeatNotes::JoinAll => self.out.push_back(row),
            SameBeatNotes::JoinByNoteType => {
                let mut seen = NoteTypes::EMPTY;
                for g in &row {
                    let note_type = g.note().note_type;
                    if seen.contains(note_type) {
                        continue;
                    }
                    seen = seen.with(note_type);
                    self.out
                        .push_back(row.iter().filter(|n| n.note().note_type == note_type).copied().collect());
                }
            }
        }
    }

    fn fail(&mut self, error: Error) -> Option<Result<GroupedNotes>> {
        self.failed = true;
        self.out.clear();
        Some(Err(error))
    }
}

impl<I> Iterator for GroupNotes<I>
where
    I: Iterator,
    I::Item: IntoNote,
{
    type Item = Result<GroupedNotes>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(group) = self.out.pop_front() {
                return Some(Ok(group));
            }
            if let Some(next) = self.joined.pop_front() {
                if self.row.last().is_some_and(|last| last.row_key() != next.row_key()) {
                    self.emit_row();
                }
                self.row.push(next);
                continue;
            }
            if self.exhausted {
                if self.row.is_empty() {
                    return None;
                }
                self.emit_row();
                continue;
            }
            match self.notes.next().map(IntoNote::into_note) {
                None => {
                    self.exhausted = true;
                    if let Err(e) = self.finish() {
                        return self.fail(e);
                    }
                }
                Some(Err(e)) => return self.fail(e),
                Some(Ok(note)) => {
                    if !self.options.include.contains(note.note_type) {
                        continue;
                    }
                    if let Err(e) = self.push(note) {
                        return self.fail(e);
                    }
                }
            }
        }
    }
}

/// Anything a grouped stream can carry: plain groups or the results of
/// [`group_notes`].
pub trait IntoGroupedNotes {
    fn into_grouped(self) -> Result<GroupedNotes>;
}

impl IntoGroupedNotes for GroupedNotes {
    fn into_grouped(self) -> Result<GroupedNotes> {
        Ok(self)
    }
}

impl IntoGroupedNotes for Result<GroupedNotes> {
    fn into_grouped(self) -> Result<GroupedNotes> {
        self
    }
}

/// Flattens grouped notes back into a plain stream, re-emitting joined
/// tails in grid order.
///
/// A note that lands on a column between a joined head and its tail splits
/// the hold. `orphans` decides what happens: `Fail` reports the split head,
/// `Keep` emits the splitting note anyway, and `Drop` discards it.
pub fn ungroup_notes<I>(groups: I, orphans: OrphanPolicy) -> UngroupNotes<I::IntoIter>
where
    I: IntoIterator,
    I::Item: IntoGroupedNotes,
{
    UngroupNotes {
        groups: groups.into_iter().fuse(),
        orphans,
        pending_tails: BinaryHeap::new(),
        row: Vec::new().into_iter(),
        ready: VecDeque::new(),
        failed: false,
    }
}

#[derive(Debug)]
pub struct UngroupNotes<I> {
    groups: Fuse<I>,
    orphans: OrphanPolicy,
    pending_tails: BinaryHeap<Reverse<(Note, Note)>>,
    row: std::vec::IntoIter<GroupedNote>,
    ready: VecDeque<Note>,
    failed: bool,
}

impl<I> UngroupNotes<I> {
    fn place(&mut self, grouped: GroupedNote) -> Result<()> {
        let note = *grouped.note();
        while let Some(Reverse((tail, _))) = self.pending_tails.peek() {
            if *tail >= note {
                break;
            }
            if let Some(Reverse((tail, _))) = self.pending_tails.pop() {
                self.ready.push_back(tail);
            }
        }

        let split = self
            .pending_tails
            .iter()
            .find(|Reverse((tail, _))| tail.player == note.player && tail.column == note.column)
            .map(|Reverse((_, head))| *head);
        match (split, self.orphans) {
            (Some(head), OrphanPolicy::Fail) => return Err(Error::OrphanedHead(head)),
            (Some(_), OrphanPolicy::Drop) => debug!("Dropping note splitting a hold at beat {}", note.beat),
            _ => self.ready.push_back(note),
        }

        if let GroupedNote::Tailed(with_tail) = grouped {
            self.pending_tails.push(Reverse((with_tail.tail(), with_tail.note)));
        }
        Ok(())
    }
}

impl<I> Iterator for UngroupNotes<I>
where
    I: Iterator,
    I::Item: IntoGroupedNotes,
{
    type Item = Result<Note>;

    fn next(&mut self) -> Option<Result<Note>> {
        loop {
            if let Some(note) = self.ready.pop_front() {
                return Some(Ok(note));
            }
            if self.failed {
                return None;
            }
            if let Some(grouped) = self.row.next() {
                if let Err(e) = self.place(grouped) {
                    self.failed = true;
                    return Some(Err(e));
                }
                continue;
            }
            match self.groups.next().map(IntoGroupedNotes::into_grouped) {
                Some(Ok(row)) => self.row = row.into_iter(),
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                None => return self.pending_tails.pop().map(|Reverse((tail, _))| Ok(tail)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::NoteData;

    const VALID: &str = "1200\n0010\n0001\n0010\n,\n\
                         1300\n0001\n4004\n0010\n,\n\
                         3000\n1000\n0003\n0001\n,\n\
                         2000\n0200\n0010\n0001\n,\n\
                         0310\n0001\n3010\n1001\n";

    const INVALID: &str = "3000\n0200\n0200\n0304\n,\n\
                           2000\n1000\n3000\n0020\n";

    fn notes(text: &str) -> Vec<Note> {
        NoteData::new(text, 4).iter().collect::<Result<_>>().unwrap()
    }

    fn n(beat: i64, column: usize, note_type: NoteType) -> GroupedNote {
        GroupedNote::Single(Note::new(Beat::from_int(beat), column, note_type))
    }

    fn t(beat: i64, column: usize, note_type: NoteType, tail: i64) -> GroupedNote {
        GroupedNote::Tailed(NoteWithTail::new(
            Note::new(Beat::from_int(beat), column, note_type),
            &Note::new(Beat::from_int(tail), column, Tail),
        ))
    }

    fn group(text: &str, options: GroupOptions) -> Result<Vec<GroupedNotes>> {
        group_notes(notes(text), options).collect()
    }

    fn joined(head: OrphanPolicy, tail: OrphanPolicy) -> GroupOptions {
        GroupOptions {
            join_heads_to_tails: true,
            orphaned_head: head,
            orphaned_tail: tail,
            ..GroupOptions::default()
        }
    }

    use NoteType::{HoldHead, RollHead, Tail, Tap};

    #[test]
    fn default_options_emit_every_note_alone() {
        let groups = group(VALID, GroupOptions::default()).unwrap();
        assert_eq!(groups.len(), 26);
        assert!(groups.iter().all(|g| g.len() == 1));
        assert_eq!(groups[1], vec![n(0, 1, HoldHead)]);
        assert_eq!(groups[6], vec![n(4, 1, Tail)]);
    }

    #[test]
    fn joins_heads_to_tails() {
        let groups = group(VALID, joined(OrphanPolicy::Fail, OrphanPolicy::Fail)).unwrap();
        let flat: Vec<GroupedNote> = groups.into_iter().flatten().collect();
        assert_eq!(
            flat,
            vec![
                n(0, 0, Tap),
                t(0, 1, HoldHead, 4),
                n(1, 2, Tap),
                n(2, 3, Tap),
                n(3, 2, Tap),
                n(4, 0, Tap),
                n(5, 3, Tap),
                t(6, 0, RollHead, 8),
                t(6, 3, RollHead, 10),
                n(7, 2, Tap),
                n(9, 0, Tap),
                n(11, 3, Tap),
                t(12, 0, HoldHead, 18),
                t(13, 1, HoldHead, 16),
                n(14, 2, Tap),
                n(15, 3, Tap),
                n(16, 2, Tap),
                n(17, 3, Tap),
                n(18, 2, Tap),
                n(19, 0, Tap),
                n(19, 3, Tap),
            ]
        );
    }

    #[test]
    fn hold_scenario_yields_one_joined_note() {
        let data = [
            Note::new(Beat::from_int(2), 0, HoldHead),
            Note::new(Beat::from_int(4), 0, Tail),
        ];
        let groups: Vec<_> = group_notes(data, joined(OrphanPolicy::Fail, OrphanPolicy::Fail))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(groups, vec![vec![t(2, 0, HoldHead, 4)]]);
    }

    #[test]
    fn tail_on_the_head_row_orphans_both() {
        let data = [
            Note::new(Beat::from_int(2), 0, HoldHead),
            Note::new(Beat::from_int(2), 0, Tail),
        ];
        let run = |policy| group_notes(data, joined(policy, policy)).collect::<Result<Vec<_>>>();

        assert_eq!(run(OrphanPolicy::Fail).unwrap_err(), Error::OrphanedHead(data[0]));
        assert_eq!(
            run(OrphanPolicy::Keep).unwrap(),
            vec![vec![n(2, 0, HoldHead)], vec![n(2, 0, Tail)]]
        );
        assert!(run(OrphanPolicy::Drop).unwrap().is_empty());

        let err = group_notes(data, joined(OrphanPolicy::Keep, OrphanPolicy::Fail))
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        assert_eq!(err, Error::OrphanedTail(data[1]));
    }

    #[test]
    fn joined_tails_keep_their_keysounds() {
        let mut head = Note::new(Beat::zero(), 1, HoldHead);
        head.keysound_index = Some(3);
        let mut tail = Note::new(Beat::from_int(1), 1, Tail);
        tail.keysound_index = Some(7);

        let groups: Vec<_> = group_notes([head, tail], joined(OrphanPolicy::Fail, OrphanPolicy::Fail))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(groups, vec![vec![GroupedNote::Tailed(NoteWithTail::new(head, &tail))]]);

        let restored: Vec<Note> = ungroup_notes(groups, OrphanPolicy::Fail)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(restored, vec![head, tail]);
    }

    #[test]
    fn join_all_clusters_rows() {
        let groups = group(
            VALID,
            GroupOptions {
                same_beat: SameBeatNotes::JoinAll,
                ..GroupOptions::default()
            },
        )
        .unwrap();
        assert_eq!(groups.len(), 20);
        assert_eq!(groups[0], vec![n(0, 0, Tap), n(0, 1, HoldHead)]);
        assert_eq!(groups[4], vec![n(4, 0, Tap), n(4, 1, Tail)]);
        assert_eq!(groups[19], vec![n(19, 0, Tap), n(19, 3, Tap)]);
    }

    #[test]
    fn join_by_note_type_splits_mixed_rows() {
        let groups = group(
            VALID,
            GroupOptions {
                same_beat: SameBeatNotes::JoinByNoteType,
                ..GroupOptions::default()
            },
        )
        .unwrap();
        assert_eq!(groups.len(), 24);
        assert_eq!(groups[0], vec![n(0, 0, Tap)]);
        assert_eq!(groups[1], vec![n(0, 1, HoldHead)]);
        assert_eq!(groups[8], vec![n(6, 0, RollHead), n(6, 3, RollHead)]);
        assert_eq!(groups[23], vec![n(19, 0, Tap), n(19, 3, Tap)]);
    }

    #[test]
    fn clusters_after_joining() {
        let groups = group(
            VALID,
            GroupOptions {
                same_beat: SameBeatNotes::JoinAll,
                ..joined(OrphanPolicy::Fail, OrphanPolicy::Fail)
            },
        )
        .unwrap();
        assert_eq!(groups[0], vec![n(0, 0, Tap), t(0, 1, HoldHead, 4)]);
        assert_eq!(groups[6], vec![t(6, 0, RollHead, 8), t(6, 3, RollHead, 10)]);
    }

    #[test]
    fn orphans_fail_by_default() {
        let err = group(INVALID, joined(OrphanPolicy::Fail, OrphanPolicy::Fail)).unwrap_err();
        assert_eq!(err, Error::OrphanedTail(Note::new(Beat::zero(), 0, Tail)));

        let err = group(INVALID, joined(OrphanPolicy::Fail, OrphanPolicy::Drop)).unwrap_err();
        assert_eq!(err, Error::OrphanedHead(Note::new(Beat::from_int(1), 1, HoldHead)));
    }

    #[test]
    fn keeps_orphans() {
        let flat: Vec<_> = group(INVALID, joined(OrphanPolicy::Keep, OrphanPolicy::Keep))
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(
            flat,
            vec![
                n(0, 0, Tail),
                n(1, 1, HoldHead),
                t(2, 1, HoldHead, 3),
                n(3, 3, RollHead),
                n(4, 0, HoldHead),
                n(5, 0, Tap),
                n(6, 0, Tail),
                n(7, 2, HoldHead),
            ]
        );
    }

    #[test]
    fn drops_orphans() {
        let flat: Vec<_> = group(INVALID, joined(OrphanPolicy::Drop, OrphanPolicy::Drop))
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(flat, vec![t(2, 1, HoldHead, 3), n(5, 0, Tap)]);
    }

    #[test]
    fn mixed_orphan_policies() {
        let flat: Vec<_> = group(INVALID, joined(OrphanPolicy::Drop, OrphanPolicy::Keep))
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(
            flat,
            vec![n(0, 0, Tail), t(2, 1, HoldHead, 3), n(5, 0, Tap), n(6, 0, Tail)]
        );

        let flat: Vec<_> = group(INVALID, joined(OrphanPolicy::Keep, OrphanPolicy::Drop))
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(
            flat,
            vec![
                n(1, 1, HoldHead),
                t(2, 1, HoldHead, 3),
                n(3, 3, RollHead),
                n(4, 0, HoldHead),
                n(5, 0, Tap),
                n(7, 2, HoldHead),
            ]
        );
    }

    #[test]
    fn excluded_types_never_join() {
        let groups = group(
            VALID,
            GroupOptions {
                include: NoteTypes::HEADS,
                ..GroupOptions::default()
            },
        )
        .unwrap();
        assert_eq!(groups.len(), 5);

        // Dropping tails from the stream orphans every head.
        let options = GroupOptions {
            include: NoteTypes::HEADS,
            ..joined(OrphanPolicy::Fail, OrphanPolicy::Fail)
        };
        assert!(group(VALID, options).is_err());
    }

    #[test]
    fn upstream_errors_propagate() {
        let data = NoteData::new("1000\n,\n0X00\n", 4);
        let results: Vec<_> = group_notes(data.iter(), GroupOptions::default()).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn ungroup_restores_the_stream() {
        let original = notes(VALID);
        let options = GroupOptions {
            same_beat: SameBeatNotes::JoinAll,
            ..joined(OrphanPolicy::Fail, OrphanPolicy::Fail)
        };
        let restored: Vec<Note> = ungroup_notes(group_notes(&original, options), OrphanPolicy::Fail)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(restored, original);
    }

    fn split_hold() -> Vec<GroupedNotes> {
        vec![vec![t(0, 0, HoldHead, 2)], vec![n(1, 0, Tap)]]
    }

    #[test]
    fn ungroup_split_hold_policies() {
        let err = ungroup_notes(split_hold(), OrphanPolicy::Fail)
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        assert_eq!(err, Error::OrphanedHead(Note::new(Beat::zero(), 0, HoldHead)));

        let kept: Vec<Note> = ungroup_notes(split_hold(), OrphanPolicy::Keep)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            kept,
            vec![
                Note::new(Beat::zero(), 0, HoldHead),
                Note::new(Beat::from_int(1), 0, Tap),
                Note::new(Beat::from_int(2), 0, Tail),
            ]
        );

        let dropped: Vec<Note> = ungroup_notes(split_hold(), OrphanPolicy::Drop)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            dropped,
            vec![
                Note::new(Beat::zero(), 0, HoldHead),
                Note::new(Beat::from_int(2), 0, Tail),
            ]
        );
    }
}
