use std::cmp::Ordering;
use std::fmt;
use std::ops::Sub;

use log::{debug, warn};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::beat::Beat;
use crate::decimal::Decimal;
use crate::error::{Error, Result};
use crate::timing::{BeatValues, SegmentKind, TimingData};

pub const DEFAULT_BPM: i64 = 60;
/// Where a warp opened by a tempo that never turns positive again ends.
const OPEN_WARP_END: i64 = 99_999_999;

/// Timing events in the order they resolve when they share a beat.
///
/// Delays resolve before stops so that a note on a beat with both is hit
/// after the delay and before the stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventTag {
    Warp,
    WarpEnd,
    Bpm,
    Delay,
    DelayEnd,
    Stop,
    StopEnd,
}

/// A position in the song, in seconds, held exactly.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SongTime(BigRational);

impl SongTime {
    pub fn new(seconds: BigRational) -> Self {
        Self(seconds)
    }

    pub fn from_f64(seconds: f64) -> Self {
        Self(BigRational::from_float(seconds).unwrap_or_else(BigRational::zero))
    }

    pub fn seconds(&self) -> &BigRational {
        &self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl Sub for &SongTime {
    type Output = SongTime;

    fn sub(self, rhs: Self) -> SongTime {
        SongTime(&self.0 - &rhs.0)
    }
}

/// Rounded to milliseconds.
impl fmt::Display for SongTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = (&self.0 * BigRational::from_integer(BigInt::from(1000))).round().to_integer();
        let sign = if millis.is_negative() { "-" } else { "" };
        let millis = millis.abs();
        let thousand = BigInt::from(1000);
        write!(f, "{sign}{}.{:03}", &millis / &thousand, (&millis % &thousand).to_u32().unwrap_or(0))
    }
}

impl fmt::Debug for SongTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SongTime({self})")
    }
}

impl serde::Serialize for SongTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// How the engine treats zero and negative tempos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegativeTempo {
    /// Drop the segment, keep the previous tempo and record an issue.
    #[default]
    Flag,
    /// Turn the rewound stretch into a warp, the way StepMania loads SM files.
    ConvertToWarps,
}

/// How the engine treats stops and delays that fall inside a warp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarpedPauses {
    /// Warped pauses take no time and their beats are unhittable.
    #[default]
    Skip,
    /// Warped pauses take their full duration and their beats stay hittable.
    Honor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineOptions {
    pub negative_tempo: NegativeTempo,
    pub warped_pauses: WarpedPauses,
}

/// Something about the timing data the engine had to work around.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimingIssue {
    #[error("no tempo segments; assuming 60 BPM")]
    MissingTempo,
    #[error("non-positive tempo {value} at beat {beat}")]
    NonPositiveTempo { beat: Beat, value: Decimal },
    #[error("non-positive warp length {value} at beat {beat}")]
    NonPositiveWarp { beat: Beat, value: Decimal },
    #[error("warps overlap at beat {beat}")]
    OverlappingWarps { beat: Beat },
    #[error("song time would fall before the start at beat {beat}")]
    NegativeTime { beat: Beat },
    #[error("{} segment at negative beat {beat}", .kind.tag())]
    BeforeStart { kind: SegmentKind, beat: Beat },
    #[error("{} segment at beat {beat} ends past the last representable beat", .kind.tag())]
    OutOfRange { kind: SegmentKind, beat: Beat },
}

impl TimingIssue {
    pub fn beat(&self) -> Beat {
        match self {
            Self::MissingTempo => Beat::zero(),
            Self::NonPositiveTempo { beat, .. }
            | Self::NonPositiveWarp { beat, .. }
            | Self::OverlappingWarps { beat }
            | Self::NegativeTime { beat }
            | Self::BeforeStart { beat, .. }
            | Self::OutOfRange { beat, .. } => *beat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hittability {
    Hittable,
    /// Skipped over by a warp.
    Warped,
    /// Inside a region where warps overlap; the result is best-effort.
    AmbiguousWarp,
    /// Inside a fake segment.
    Fake,
}

impl Hittability {
    pub const fn is_hittable(self) -> bool {
        matches!(self, Self::Hittable)
    }
}

#[derive(Debug, Clone)]
struct TaggedEvent {
    beat: Beat,
    tag: EventTag,
    pause: BigRational,
    bpm: Option<Decimal>,
}

#[derive(Debug, Clone)]
struct TimingState {
    beat: Beat,
    tag: EventTag,
    pause: BigRational,
    time: BigRational,
    bpm: Decimal,
    seconds_per_beat: BigRational,
    warping: bool,
}

impl TimingState {
    fn time_until(&self, beat: Beat, tag: EventTag) -> BigRational {
        let mut time = if self.warping {
            BigRational::zero()
        } else {
            (beat.to_big() - self.beat.to_big()) * &self.seconds_per_beat
        };
        if matches!(self.tag, EventTag::Stop | EventTag::Delay)
            && matches!(tag, EventTag::StopEnd | EventTag::DelayEnd)
        {
            time += &self.pause;
        }
        time
    }

    fn key(&self) -> (Beat, EventTag) {
        (self.beat, self.tag)
    }
}

#[derive(Debug, Clone)]
struct WarpRange {
    start: Beat,
    end: Beat,
    ambiguous: bool,
}

/// Converts between beats and song time for one chart's timing.
///
/// Construction never fails. Anything the engine had to drop or clamp is
/// recorded in [`TimingEngine::issues`].
#[derive(Debug, Clone)]
pub struct TimingEngine {
    options: EngineOptions,
    start: BigRational,
    first_bpm: Decimal,
    first_seconds_per_beat: BigRational,
    states: Vec<TimingState>,
    running_max: Vec<BigRational>,
    warps: Vec<WarpRange>,
    fakes: Vec<(Beat, Beat)>,
    warped_pause_beats: Vec<Beat>,
    issues: Vec<TimingIssue>,
}

impl TimingEngine {
    pub fn new(timing: &TimingData) -> Self {
        Self::with_options(timing, EngineOptions::default())
    }

    pub fn with_options(timing: &TimingData, options: EngineOptions) -> Self {
        let mut issues = Vec::new();
        let mut record = |issue: TimingIssue| {
            warn!("{issue}");
            issues.push(issue);
        };

        let mut bpms = entries(&timing.bpms);
        let mut stops = pauses(&timing.stops, SegmentKind::Stop, &mut record);
        let delays = pauses(&timing.delays, SegmentKind::Delay, &mut record);
        let mut raw_warps = extents(&timing.warps, SegmentKind::Warp, &mut record);

        if options.negative_tempo == NegativeTempo::ConvertToWarps {
            let converted = negatives_to_warps(&bpms, &stops);
            bpms = converted.bpms;
            stops = converted.stops;
            raw_warps.extend(converted.warps);
        }

        let tempo = tidy_bpms(bpms, &mut record);
        let stops = sum_per_beat(stops);
        let delays = sum_per_beat(delays);
        let warps = coalesce_warps(raw_warps, &mut record);
        let fakes = extents(&timing.fakes, SegmentKind::Fake, &mut record);
        let fakes = coalesce_fakes(fakes, &mut record);

        let (stops, delays, warped_pause_beats) = match options.warped_pauses {
            WarpedPauses::Skip => {
                let keep = |(beat, _): &(Beat, BigRational)| {
                    let warped = warp_containing(&warps, *beat).is_some();
                    if warped {
                        debug!("Skipping pause at warped beat {beat}");
                    }
                    !warped
                };
                let stops: Vec<_> = stops.into_iter().filter(keep).collect();
                let delays: Vec<_> = delays.into_iter().filter(keep).collect();
                (stops, delays, Vec::new())
            }
            WarpedPauses::Honor => {
                let mut beats: Vec<Beat> = stops
                    .iter()
                    .chain(&delays)
                    .map(|(beat, _)| *beat)
                    .filter(|beat| warp_containing(&warps, *beat).is_some())
                    .collect();
                beats.sort_unstable();
                beats.dedup();
                (stops, delays, beats)
            }
        };

        let mut events = Vec::with_capacity(tempo.len() + 2 * (stops.len() + delays.len() + warps.len()));
        for (beat, bpm) in &tempo {
            events.push(TaggedEvent {
                beat: *beat,
                tag: EventTag::Bpm,
                pause: BigRational::zero(),
                bpm: Some(bpm.clone()),
            });
        }
        for warp in &warps {
            events.push(marker(warp.start, EventTag::Warp));
            events.push(marker(warp.end, EventTag::WarpEnd));
        }
        for (list, open, close) in [
            (&delays, EventTag::Delay, EventTag::DelayEnd),
            (&stops, EventTag::Stop, EventTag::StopEnd),
        ] {
            for (beat, pause) in list {
                events.push(TaggedEvent {
                    beat: *beat,
                    tag: open,
                    pause: pause.clone(),
                    bpm: None,
                });
                events.push(marker(*beat, close));
            }
        }
        events.sort_by(|a, b| (a.beat, a.tag).cmp(&(b.beat, b.tag)));

        let start = -timing.offset.value().clone();
        let (first_bpm, first_seconds_per_beat) = match tempo.first() {
            Some((_, bpm)) => (bpm.clone(), seconds_per_beat(bpm)),
            None => {
                let bpm = Decimal::from_int(DEFAULT_BPM);
                let spb = seconds_per_beat(&bpm);
                (bpm, spb)
            }
        };

        let mut states: Vec<TimingState> = Vec::with_capacity(events.len());
        let mut last = TimingState {
            beat: Beat::zero(),
            tag: EventTag::Bpm,
            pause: BigRational::zero(),
            time: start.clone(),
            bpm: first_bpm.clone(),
            seconds_per_beat: first_seconds_per_beat.clone(),
            warping: false,
        };
        for event in events {
            let mut time = &last.time + last.time_until(event.beat, event.tag);
            if time < start {
                record(TimingIssue::NegativeTime { beat: event.beat });
                time = start.clone();
            }
            let (bpm, seconds_per_beat) = match event.bpm {
                Some(bpm) => {
                    let spb = self::seconds_per_beat(&bpm);
                    (bpm, spb)
                }
                None => (last.bpm.clone(), last.seconds_per_beat.clone()),
            };
            let warping = match event.tag {
                EventTag::Warp => true,
                EventTag::WarpEnd => false,
                _ => last.warping,
            };
            let state = TimingState {
                beat: event.beat,
                tag: event.tag,
                pause: event.pause,
                time,
                bpm,
                seconds_per_beat,
                warping,
            };
            states.push(state.clone());
            last = state;
        }
        if states.is_empty() {
            states.push(last);
        }

        let mut running_max: Vec<BigRational> = Vec::with_capacity(states.len());
        for state in &states {
            let next = match running_max.last() {
                Some(max) if *max > state.time => max.clone(),
                _ => state.time.clone(),
            };
            running_max.push(next);
        }

        Self {
            options,
            start,
            first_bpm,
            first_seconds_per_beat,
            states,
            running_max,
            warps,
            fakes,
            warped_pause_beats,
            issues,
        }
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn issues(&self) -> &[TimingIssue] {
        &self.issues
    }

    /// Fails with the first recorded issue, if any.
    pub fn validate(&self) -> Result<()> {
        match self.issues.first() {
            Some(issue) => Err(Error::TimingInconsistency(issue.clone())),
            None => Ok(()),
        }
    }

    /// When a note on `beat` must be hit: after any delay on that beat and
    /// before any stop. Inside a warp this is the time the warp happens.
    pub fn time_at(&self, beat: Beat) -> SongTime {
        SongTime(self.time_at_tag(beat, EventTag::Stop))
    }

    /// When `beat` reaches the receptors and when it leaves, spanning any
    /// delay and stop on it.
    pub fn time_range(&self, beat: Beat) -> (SongTime, SongTime) {
        (
            SongTime(self.time_at_tag(beat, EventTag::Delay)),
            SongTime(self.time_at_tag(beat, EventTag::StopEnd)),
        )
    }

    /// The beat at `time`, rounded to the nearest tick.
    ///
    /// During a stop or delay this is the paused beat. At the moment of a
    /// warp it is the warp's destination.
    pub fn beat_at(&self, time: &SongTime) -> Beat {
        let time = time.seconds();
        let idx = self.running_max.partition_point(|max| max <= time);
        if idx == 0 {
            let beats = (time - &self.start) / &self.first_seconds_per_beat;
            return Beat::from_big_rounded(&beats);
        }
        let state = &self.states[idx - 1];
        if matches!(state.tag, EventTag::Stop | EventTag::Delay) {
            return state.beat;
        }
        if state.warping {
            return self.states[idx..]
                .iter()
                .find(|s| s.tag == EventTag::WarpEnd)
                .map_or(state.beat, |s| s.beat);
        }
        let mut beat = state.beat.to_big() + (time - &state.time) / &state.seconds_per_beat;
        if let Some(next) = self.states.get(idx) {
            let limit = next.beat.to_big();
            if beat > limit {
                beat = limit;
            }
        }
        Beat::from_big_rounded(&beat)
    }

    #[inline(always)]
    pub fn beat_at_seconds(&self, seconds: f64) -> Beat {
        self.beat_at(&SongTime::from_f64(seconds))
    }

    pub fn bpm_at(&self, beat: Beat) -> Decimal {
        if beat.is_negative() {
            return self.first_bpm.clone();
        }
        self.prior_state(beat, EventTag::Bpm).bpm.clone()
    }

    pub fn hittability(&self, beat: Beat) -> Hittability {
        if beat.is_negative() {
            return Hittability::Hittable;
        }
        if let Some(warp) = warp_containing(&self.warps, beat) {
            let honored = self.warped_pause_beats.binary_search(&beat).is_ok();
            if !honored {
                return if warp.ambiguous {
                    Hittability::AmbiguousWarp
                } else {
                    Hittability::Warped
                };
            }
        }
        let idx = self.fakes.partition_point(|(start, _)| *start <= beat);
        if idx > 0 && beat < self.fakes[idx - 1].1 {
            return Hittability::Fake;
        }
        Hittability::Hittable
    }

    #[inline(always)]
    pub fn hittable(&self, beat: Beat) -> bool {
        self.hittability(beat).is_hittable()
    }

    fn prior_state(&self, beat: Beat, tag: EventTag) -> &TimingState {
        let idx = self
            .states
            .partition_point(|s| s.key() <= (beat, tag))
            .saturating_sub(1);
        &self.states[idx]
    }

    fn time_at_tag(&self, beat: Beat, tag: EventTag) -> BigRational {
        if beat.is_negative() {
            return &self.start + beat.to_big() * &self.first_seconds_per_beat;
        }
        let state = self.prior_state(beat, tag);
        &state.time + state.time_until(beat, tag)
    }
}

fn marker(beat: Beat, tag: EventTag) -> TaggedEvent {
    TaggedEvent {
        beat,
        tag,
        pause: BigRational::zero(),
        bpm: None,
    }
}

fn seconds_per_beat(bpm: &Decimal) -> BigRational {
    BigRational::from_integer(BigInt::from(60)) / bpm.value()
}

fn entries(values: &BeatValues) -> Vec<(Beat, Decimal)> {
    values.iter().map(|e| (e.beat, e.value.clone())).collect()
}

fn pauses(
    values: &BeatValues,
    kind: SegmentKind,
    record: &mut impl FnMut(TimingIssue),
) -> Vec<(Beat, BigRational)> {
    let mut out = Vec::with_capacity(values.len());
    for entry in values.iter() {
        if entry.beat.is_negative() {
            record(TimingIssue::BeforeStart {
                kind,
                beat: entry.beat,
            });
            continue;
        }
        out.push((entry.beat, entry.value.value().clone()));
    }
    out
}

/// Warp or fake extents as `(start, length)`, with same-beat lengths summed
/// and non-positive results dropped.
fn extents(
    values: &BeatValues,
    kind: SegmentKind,
    record: &mut impl FnMut(TimingIssue),
) -> Vec<(Beat, BigRational)> {
    let summed = sum_per_beat(pauses(values, kind, record));
    let mut out = Vec::with_capacity(summed.len());
    for (beat, length) in summed {
        if length.is_positive() {
            out.push((beat, length));
        } else if kind == SegmentKind::Warp {
            record(TimingIssue::NonPositiveWarp {
                beat,
                value: Decimal::new(length, 3),
            });
        } else {
            debug!("Dropping empty {} segment at beat {beat}", kind.tag());
        }
    }
    out
}

/// Sorts by beat and sums values that share a beat, dropping zero totals.
fn sum_per_beat(mut values: Vec<(Beat, BigRational)>) -> Vec<(Beat, BigRational)> {
    values.sort_by(|a, b| a.0.cmp(&b.0));
    let mut out: Vec<(Beat, BigRational)> = Vec::with_capacity(values.len());
    for (beat, value) in values {
        if let Some(last) = out.last_mut() {
            if last.0 == beat {
                last.1 += value;
                continue;
            }
        }
        out.push((beat, value));
    }
    out.retain(|(_, value)| !value.is_zero());
    out
}

/// Sorts tempo changes, keeps the last value on each beat, anchors the first
/// tempo at beat 0 and drops repeats. Non-positive tempos are dropped.
fn tidy_bpms(
    mut bpms: Vec<(Beat, Decimal)>,
    record: &mut impl FnMut(TimingIssue),
) -> Vec<(Beat, Decimal)> {
    bpms.sort_by(|a, b| a.0.cmp(&b.0));

    let mut last_per_beat: Vec<(Beat, Decimal)> = Vec::with_capacity(bpms.len());
    for (beat, bpm) in bpms {
        if let Some(last) = last_per_beat.last_mut() {
            if last.0 == beat {
                *last = (beat, bpm);
                continue;
            }
        }
        last_per_beat.push((beat, bpm));
    }

    let mut positive: Vec<(Beat, Decimal)> = Vec::with_capacity(last_per_beat.len());
    for (beat, bpm) in last_per_beat {
        if bpm.is_positive() {
            positive.push((beat, bpm));
        } else {
            record(TimingIssue::NonPositiveTempo { beat, value: bpm });
        }
    }

    let leading = positive.partition_point(|(beat, _)| *beat <= Beat::zero());
    if leading > 1 {
        positive.drain(..leading - 1);
    }
    if let Some(first) = positive.first_mut() {
        if first.0 != Beat::zero() {
            debug!("Moving first tempo from beat {} to beat 0", first.0);
            first.0 = Beat::zero();
        }
    }

    let mut tidied: Vec<(Beat, Decimal)> = Vec::with_capacity(positive.len());
    for (beat, bpm) in positive {
        if tidied.last().is_some_and(|(_, last)| *last == bpm) {
            continue;
        }
        tidied.push((beat, bpm));
    }

    if tidied.is_empty() {
        record(TimingIssue::MissingTempo);
        tidied.push((Beat::zero(), Decimal::from_int(DEFAULT_BPM)));
    }
    tidied
}

/// Merges warps into disjoint ranges. Touching warps join silently;
/// overlapping ones are unioned and flagged.
fn coalesce_warps(
    mut warps: Vec<(Beat, BigRational)>,
    record: &mut impl FnMut(TimingIssue),
) -> Vec<WarpRange> {
    warps.sort_by(|a, b| a.0.cmp(&b.0));
    let mut out: Vec<WarpRange> = Vec::with_capacity(warps.len());
    for (start, length) in warps {
        let Some(end) = extent_end(start, &length) else {
            record(TimingIssue::OutOfRange {
                kind: SegmentKind::Warp,
                beat: start,
            });
            continue;
        };
        if let Some(last) = out.last_mut() {
            match start.cmp(&last.end) {
                Ordering::Less => {
                    record(TimingIssue::OverlappingWarps { beat: start });
                    last.ambiguous = true;
                    last.end = last.end.max(end);
                    continue;
                }
                Ordering::Equal => {
                    last.end = end;
                    continue;
                }
                Ordering::Greater => {}
            }
        }
        out.push(WarpRange {
            start,
            end,
            ambiguous: false,
        });
    }
    out
}

fn coalesce_fakes(
    mut fakes: Vec<(Beat, BigRational)>,
    record: &mut impl FnMut(TimingIssue),
) -> Vec<(Beat, Beat)> {
    fakes.sort_by(|a, b| a.0.cmp(&b.0));
    let mut out: Vec<(Beat, Beat)> = Vec::with_capacity(fakes.len());
    for (start, length) in fakes {
        let Some(end) = extent_end(start, &length) else {
            record(TimingIssue::OutOfRange {
                kind: SegmentKind::Fake,
                beat: start,
            });
            continue;
        };
        match out.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => out.push((start, end)),
        }
    }
    out
}

/// End of a `length`-beat extent from `start`, if it lands on a row an `i64`
/// can hold.
fn extent_end(start: Beat, length: &BigRational) -> Option<Beat> {
    Beat::checked_from_big(&(start.to_big() + length))
}

fn warp_containing(warps: &[WarpRange], beat: Beat) -> Option<&WarpRange> {
    let idx = warps.partition_point(|w| w.start <= beat);
    if idx == 0 {
        return None;
    }
    let warp = &warps[idx - 1];
    (beat < warp.end).then_some(warp)
}

#[derive(Debug, Default)]
struct Converted {
    bpms: Vec<(Beat, Decimal)>,
    stops: Vec<(Beat, BigRational)>,
    warps: Vec<(Beat, BigRational)>,
}

/// StepMania's SM-file handling of negative tempos and stops: the stretch of
/// chart they would rewind over becomes a warp, and the tempo resumes once
/// the lost time has been made up.
fn negatives_to_warps(bpms: &[(Beat, Decimal)], stops: &[(Beat, BigRational)]) -> Converted {
    let mut bpm_changes: Vec<(Beat, Decimal)> =
        bpms.iter().filter(|(_, bpm)| !bpm.is_zero()).cloned().collect();
    bpm_changes.sort_by(|a, b| a.0.cmp(&b.0));
    let mut stop_changes: Vec<(Beat, BigRational)> =
        stops.iter().filter(|(_, secs)| !secs.is_zero()).cloned().collect();
    stop_changes.sort_by(|a, b| a.0.cmp(&b.0));

    let sixty = BigRational::from_integer(BigInt::from(60));
    let mut bpm_idx = 0usize;
    let mut stop_idx = 0usize;

    let mut initial: Option<Decimal> = None;
    while bpm_idx < bpm_changes.len() && bpm_changes[bpm_idx].0 <= Beat::zero() {
        initial = Some(bpm_changes[bpm_idx].1.clone());
        bpm_idx += 1;
    }
    let mut bpm = match initial {
        Some(bpm) => bpm,
        None if bpm_idx < bpm_changes.len() => {
            bpm_idx += 1;
            bpm_changes[bpm_idx - 1].1.clone()
        }
        None => Decimal::from_int(DEFAULT_BPM),
    };

    let mut out = Converted::default();
    if bpm.is_positive() {
        out.bpms.push((Beat::zero(), bpm.clone()));
    }

    let mut prev_beat = Beat::zero();
    let mut warp_start: Option<Beat> = None;
    let mut prewarp_bpm = bpm.clone();
    let mut time_offset = BigRational::zero();

    while bpm_idx < bpm_changes.len() || stop_idx < stop_changes.len() {
        let change_is_bpm = stop_idx == stop_changes.len()
            || (bpm_idx < bpm_changes.len() && bpm_changes[bpm_idx].0 <= stop_changes[stop_idx].0);
        let change_beat = if change_is_bpm {
            bpm_changes[bpm_idx].0
        } else {
            stop_changes[stop_idx].0
        };

        time_offset += (change_beat - prev_beat).to_big() * &sixty / bpm.value();
        if let Some(start) = warp_start.take() {
            if bpm.is_positive() && time_offset.is_positive() {
                let warp_end = change_beat.to_big() - &time_offset * bpm.value() / &sixty;
                push_warp(&mut out.warps, start, &warp_end);
                if bpm != prewarp_bpm {
                    out.bpms.push((start, bpm.clone()));
                }
            } else {
                warp_start = Some(start);
            }
        }
        prev_beat = change_beat;

        if change_is_bpm {
            let value = bpm_changes[bpm_idx].1.clone();
            if warp_start.is_none() && value.is_negative() {
                warp_start = Some(change_beat);
                prewarp_bpm = bpm.clone();
                time_offset = BigRational::zero();
            } else if warp_start.is_none() {
                out.bpms.push((change_beat, value.clone()));
            }
            bpm = value;
            bpm_idx += 1;
        } else {
            let value = stop_changes[stop_idx].1.clone();
            if warp_start.is_none() && value.is_negative() {
                warp_start = Some(change_beat);
                prewarp_bpm = bpm.clone();
                time_offset = value;
            } else if warp_start.is_none() {
                out.stops.push((change_beat, value));
            } else {
                time_offset += &value;
                if value.is_positive() && time_offset.is_positive() {
                    if let Some(start) = warp_start.take() {
                        push_warp(&mut out.warps, start, &change_beat.to_big());
                        out.stops.push((change_beat, time_offset.clone()));
                        if bpm.is_negative() {
                            warp_start = Some(change_beat);
                            time_offset = BigRational::zero();
                        } else if bpm != prewarp_bpm {
                            out.bpms.push((start, bpm.clone()));
                        }
                    }
                }
            }
            stop_idx += 1;
        }
    }

    if let Some(start) = warp_start {
        let warp_end = if bpm.is_negative() {
            BigRational::from_integer(BigInt::from(OPEN_WARP_END))
        } else {
            prev_beat.to_big() - &time_offset * bpm.value() / &sixty
        };
        push_warp(&mut out.warps, start, &warp_end);
        if bpm != prewarp_bpm {
            out.bpms.push((start, bpm));
        }
    }

    out
}

fn push_warp(warps: &mut Vec<(Beat, BigRational)>, start: Beat, end: &BigRational) {
    let length = end - start.to_big();
    if length.is_positive() {
        warps.push((start, length));
    }
}
