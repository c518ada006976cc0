use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use log::debug;

use crate::beat::Beat;
use crate::decimal::Decimal;
use crate::engine::DEFAULT_BPM;
use crate::error::{Error, Result};

/// SSC versions below this ignore chart-level ("split") timing.
pub const SPLIT_TIMING_MIN_VERSION: f64 = 0.7;

/// Whether an SSC `#VERSION` value permits split timing.
pub fn split_timing_allowed(version: &str) -> bool {
    version
        .trim()
        .parse::<f64>()
        .is_ok_and(|v| v >= SPLIT_TIMING_MIN_VERSION)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Beats per minute from this beat onward.
    Bpm,
    /// Seconds to pause after notes on this beat.
    Stop,
    /// Seconds to pause before notes on this beat.
    Delay,
    /// Beats to skip in zero time.
    Warp,
    /// Beats from this beat whose notes cannot be hit.
    Fake,
}

impl SegmentKind {
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Bpm => "BPMS",
            Self::Stop => "STOPS",
            Self::Delay => "DELAYS",
            Self::Warp => "WARPS",
            Self::Fake => "FAKES",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Malformed entries are errors.
    #[default]
    Strict,
    /// Malformed entries are skipped.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BeatValue {
    pub beat: Beat,
    pub value: Decimal,
}

impl BeatValue {
    pub fn new(beat: Beat, value: Decimal) -> Self {
        Self { beat, value }
    }
}

/// One timing field's `beat=value` list, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BeatValues(Vec<BeatValue>);

impl BeatValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the value of a `#BPMS`, `#STOPS`, `#DELAYS`, `#WARPS` or
    /// `#FAKES` tag, e.g. `0.000=128.000,64.000=140.000`.
    pub fn parse(s: &str, strictness: Strictness) -> Result<Self> {
        let mut out = Vec::new();
        if s.trim().is_empty() {
            return Ok(Self(out));
        }
        for pair in s.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            match parse_pair(pair) {
                Ok(entry) => out.push(entry),
                Err(e) if strictness == Strictness::Lenient => {
                    debug!("Skipping timing entry {pair:?}: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Self(out))
    }

    pub fn push(&mut self, beat: Beat, value: Decimal) {
        self.0.push(BeatValue::new(beat, value));
    }

    pub fn into_vec(self) -> Vec<BeatValue> {
        self.0
    }
}

fn parse_pair(pair: &str) -> Result<BeatValue> {
    let mut parts = pair.split('=');
    let beat_str = parts.next().ok_or_else(|| Error::format("missing beat"))?.trim();
    let value_str = parts
        .next()
        .ok_or_else(|| Error::format(format!("missing value in {pair:?}")))?
        .trim();
    if parts.next().is_some() {
        return Err(Error::format(format!("beat/value pair {pair:?} has more than one '='")));
    }
    let beat: Beat = beat_str.parse()?;
    let value: Decimal = value_str
        .parse()
        .map_err(|_| Error::format_at(beat, None, format!("invalid value {value_str:?}")))?;
    Ok(BeatValue { beat, value })
}

impl Deref for BeatValues {
    type Target = [BeatValue];

    fn deref(&self) -> &[BeatValue] {
        &self.0
    }
}

impl FromIterator<BeatValue> for BeatValues {
    fn from_iter<I: IntoIterator<Item = BeatValue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for BeatValues {
    type Item = BeatValue;
    type IntoIter = std::vec::IntoIter<BeatValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a BeatValues {
    type Item = &'a BeatValue;
    type IntoIter = std::slice::Iter<'a, BeatValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromStr for BeatValues {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, Strictness::Strict)
    }
}

/// MSD form: `beat=value` entries joined by `",\n"`.
impl fmt::Display for BeatValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",\n")?;
            }
            write!(f, "{}={}", entry.beat, entry.value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSignature {
    pub beat: Beat,
    pub numerator: u32,
    pub denominator: u32,
}

/// `#TIMESIGNATURES` entries (`beat=numerator=denominator`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimeSignatures(Vec<TimeSignature>);

impl TimeSignatures {
    pub fn parse(s: &str, strictness: Strictness) -> Result<Self> {
        let mut out = Vec::new();
        for chunk in s.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            match parse_time_signature(chunk) {
                Ok(sig) => out.push(sig),
                Err(e) if strictness == Strictness::Lenient => {
                    debug!("Skipping time signature {chunk:?}: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Self(out))
    }
}

fn parse_time_signature(chunk: &str) -> Result<TimeSignature> {
    let parts: Vec<_> = chunk.split('=').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(Error::format(format!("invalid time signature {chunk:?}")));
    }
    let beat: Beat = parts[0].parse()?;
    let numerator = parts[1]
        .parse::<u32>()
        .map_err(|_| Error::format_at(beat, None, "invalid time signature numerator"))?;
    let denominator = parts[2]
        .parse::<u32>()
        .map_err(|_| Error::format_at(beat, None, "invalid time signature denominator"))?;
    if numerator == 0 || denominator == 0 {
        return Err(Error::format_at(beat, None, "time signature must be positive"));
    }
    Ok(TimeSignature {
        beat,
        numerator,
        denominator,
    })
}

impl Deref for TimeSignatures {
    type Target = [TimeSignature];

    fn deref(&self) -> &[TimeSignature] {
        &self.0
    }
}

impl FromStr for TimeSignatures {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, Strictness::Strict)
    }
}

impl fmt::Display for TimeSignatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, sig) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",\n")?;
            }
            write!(f, "{}={}={}", sig.beat, sig.numerator, sig.denominator)?;
        }
        Ok(())
    }
}

/// Raw tag values for one timing scope, as handed over by the simfile reader.
/// `None` means the tag is absent; `Some("")` is present but empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTimingFields<'a> {
    pub bpms: Option<&'a str>,
    pub stops: Option<&'a str>,
    pub delays: Option<&'a str>,
    pub warps: Option<&'a str>,
    pub fakes: Option<&'a str>,
    pub time_signatures: Option<&'a str>,
    pub offset: Option<&'a str>,
    pub display_bpm: Option<&'a str>,
}

/// Parsed timing fields for one scope (song or chart).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimingFields {
    pub bpms: Option<BeatValues>,
    pub stops: Option<BeatValues>,
    pub delays: Option<BeatValues>,
    pub warps: Option<BeatValues>,
    pub fakes: Option<BeatValues>,
    pub time_signatures: Option<TimeSignatures>,
    pub offset: Option<Decimal>,
    /// Raw `#DISPLAYBPM` text; see [`DisplayBpm::parse`].
    pub display_bpm: Option<String>,
}

impl TimingFields {
    pub fn parse(raw: &RawTimingFields<'_>, strictness: Strictness) -> Result<Self> {
        let list = |s: Option<&str>| s.map(|s| BeatValues::parse(s, strictness)).transpose();
        let offset = match raw.offset.map(str::trim) {
            Some("") | None => None,
            Some(s) => match (s.parse::<Decimal>(), strictness) {
                (Ok(offset), _) => Some(offset),
                (Err(e), Strictness::Strict) => return Err(e),
                (Err(e), Strictness::Lenient) => {
                    debug!("Ignoring offset {s:?}: {e}");
                    None
                }
            },
        };
        Ok(Self {
            bpms: list(raw.bpms)?,
            stops: list(raw.stops)?,
            delays: list(raw.delays)?,
            warps: list(raw.warps)?,
            fakes: list(raw.fakes)?,
            time_signatures: raw
                .time_signatures
                .map(|s| TimeSignatures::parse(s, strictness))
                .transpose()?,
            offset,
            display_bpm: raw.display_bpm.map(str::to_owned),
        })
    }

    /// Whether no timing field is set. `#DISPLAYBPM` alone doesn't count.
    pub fn is_empty(&self) -> bool {
        self.bpms.is_none()
            && self.stops.is_none()
            && self.delays.is_none()
            && self.warps.is_none()
            && self.fakes.is_none()
            && self.time_signatures.is_none()
            && self.offset.is_none()
    }
}

/// Effective timing for one chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingData {
    pub bpms: BeatValues,
    pub stops: BeatValues,
    pub delays: BeatValues,
    pub warps: BeatValues,
    pub fakes: BeatValues,
    pub time_signatures: TimeSignatures,
    pub offset: Decimal,
    pub display_bpm: Option<String>,
}

impl Default for TimingData {
    fn default() -> Self {
        Self {
            bpms: BeatValues::new(),
            stops: BeatValues::new(),
            delays: BeatValues::new(),
            warps: BeatValues::new(),
            fakes: BeatValues::new(),
            time_signatures: TimeSignatures::default(),
            offset: Decimal::from_int(0),
            display_bpm: None,
        }
    }
}

impl TimingData {
    /// Timing with a single tempo and no other events.
    pub fn constant(bpm: Decimal) -> Self {
        let mut bpms = BeatValues::new();
        bpms.push(Beat::zero(), bpm);
        Self {
            bpms,
            ..Self::default()
        }
    }

    pub fn from_song(song: &TimingFields) -> Self {
        Self::merge(song, None, false)
    }

    /// Combines song timing with a chart's split timing.
    ///
    /// When `split_timing` is set and the chart defines any timing field,
    /// each field the chart defines replaces the song's field outright (an
    /// empty chart field still overrides). Fields the chart leaves out come
    /// from the song. The offset defaults to zero. `#DISPLAYBPM` comes from
    /// whichever scope supplies the timing, with no fallback to the song.
    pub fn merge(song: &TimingFields, chart: Option<&TimingFields>, split_timing: bool) -> Self {
        let chart = chart.filter(|c| split_timing && !c.is_empty());
        if chart.is_some() {
            debug!("Using chart split timing");
        }
        let pick = |chart_field: Option<&BeatValues>, song_field: Option<&BeatValues>| {
            chart_field.or(song_field).cloned().unwrap_or_default()
        };
        let chart_ref = |f: fn(&TimingFields) -> Option<&BeatValues>| chart.and_then(f);

        Self {
            bpms: pick(chart_ref(|c| c.bpms.as_ref()), song.bpms.as_ref()),
            stops: pick(chart_ref(|c| c.stops.as_ref()), song.stops.as_ref()),
            delays: pick(chart_ref(|c| c.delays.as_ref()), song.delays.as_ref()),
            warps: pick(chart_ref(|c| c.warps.as_ref()), song.warps.as_ref()),
            fakes: pick(chart_ref(|c| c.fakes.as_ref()), song.fakes.as_ref()),
            time_signatures: chart
                .and_then(|c| c.time_signatures.as_ref())
                .or(song.time_signatures.as_ref())
                .cloned()
                .unwrap_or_default(),
            offset: chart
                .and_then(|c| c.offset.as_ref())
                .or(song.offset.as_ref())
                .cloned()
                .unwrap_or_else(|| Decimal::from_int(0)),
            display_bpm: chart.map_or(&song.display_bpm, |c| &c.display_bpm).clone(),
        }
    }

    pub fn segments(&self, kind: SegmentKind) -> &BeatValues {
        match kind {
            SegmentKind::Bpm => &self.bpms,
            SegmentKind::Stop => &self.stops,
            SegmentKind::Delay => &self.delays,
            SegmentKind::Warp => &self.warps,
            SegmentKind::Fake => &self.fakes,
        }
    }
}

/// The tempo a song wheel shows for a chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayBpm {
    Static(Decimal),
    Range { min: Decimal, max: Decimal },
    /// `*`: the shown value cycles randomly. `min` and `max` are the real
    /// tempo bounds.
    Random { min: Decimal, max: Decimal },
}

impl DisplayBpm {
    /// Resolves a `#DISPLAYBPM` value: one number, `min:max`, or `*`.
    ///
    /// Absent or unparseable text falls back to the tempos in `timing`: a
    /// single entry is static, several make a range.
    pub fn parse(display: Option<&str>, timing: &TimingData) -> Self {
        let Some(text) = display.map(str::trim) else {
            return Self::from_bpms(&timing.bpms);
        };
        let parsed = if text == "*" {
            let real = Self::from_bpms(&timing.bpms);
            Ok(Self::Random {
                min: real.min().clone(),
                max: real.max().clone(),
            })
        } else if let Some((min, max)) = text.split_once(':') {
            min.parse::<Decimal>().and_then(|min| Ok(Self::Range { min, max: max.parse()? }))
        } else {
            text.parse().map(Self::Static)
        };
        parsed.unwrap_or_else(|e| {
            debug!("Ignoring display BPM {text:?}: {e}");
            Self::from_bpms(&timing.bpms)
        })
    }

    fn from_bpms(bpms: &BeatValues) -> Self {
        let mut values = bpms.iter().map(|b| &b.value);
        let Some(first) = values.next() else {
            return Self::Static(Decimal::from_int(DEFAULT_BPM));
        };
        if bpms.len() == 1 {
            return Self::Static(first.clone());
        }
        let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Self::Range {
            min: min.clone(),
            max: max.clone(),
        }
    }

    pub fn min(&self) -> &Decimal {
        match self {
            Self::Static(value) => value,
            Self::Range { min, .. } | Self::Random { min, .. } => min,
        }
    }

    pub fn max(&self) -> &Decimal {
        match self {
            Self::Static(value) => value,
            Self::Range { max, .. } | Self::Random { max, .. } => max,
        }
    }

    /// The single shown value, for static display BPMs only.
    pub fn value(&self) -> Option<&Decimal> {
        match self {
            Self::Static(value) => Some(value),
            _ => None,
        }
    }

    /// The shown bounds, for ranges only.
    pub fn range(&self) -> Option<(&Decimal, &Decimal)> {
        match self {
            Self::Range { min, max } => Some((min, max)),
            _ => None,
        }
    }
}

/// Rounded the way song wheels print it: `150`, `120:240` or `*`.
impl fmt::Display for DisplayBpm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => write!(f, "{}", value.round_half_even()),
            Self::Range { min, max } => write!(f, "{}:{}", min.round_half_even(), max.round_half_even()),
            Self::Random { .. } => f.write_str("*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(bpms: Option<&str>, stops: Option<&str>) -> TimingFields {
        TimingFields::parse(
            &RawTimingFields {
                bpms,
                stops,
                ..RawTimingFields::default()
            },
            Strictness::Strict,
        )
        .unwrap()
    }

    #[test]
    fn parses_and_serializes_beat_values() {
        let raw = "0.000=120.000,\n1.000=150.000,2.500=-0.25";
        let values: BeatValues = raw.parse().unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[1].beat, Beat::from_int(1));
        assert_eq!(values[2].beat, Beat::new(5, 2));
        assert_eq!(values.to_string(), "0.000=120.000,\n1.000=150.000,\n2.500=-0.25");
    }

    #[test]
    fn strictness_controls_malformed_entries() {
        let raw = "0.000=120.000,junk,4.000=x";
        assert!(BeatValues::parse(raw, Strictness::Strict).is_err());
        let lenient = BeatValues::parse(raw, Strictness::Lenient).unwrap();
        assert_eq!(lenient.len(), 1);
        assert!(BeatValues::parse("  ", Strictness::Strict).unwrap().is_empty());
        assert!(BeatValues::parse("1=2=3", Strictness::Strict).is_err());
    }

    #[test]
    fn beats_past_the_row_range_are_format_errors() {
        let raw = "0.000=120.000,999999999999999999999.000=1.000";
        let err = BeatValues::parse(raw, Strictness::Strict).unwrap_err();
        assert!(matches!(err, Error::Format { .. }), "{err}");
        let lenient = BeatValues::parse(raw, Strictness::Lenient).unwrap();
        assert_eq!(lenient.len(), 1);
    }

    #[test]
    fn time_signatures_round_trip() {
        let sigs: TimeSignatures = "0.000=4=4,16.000=3=4".parse().unwrap();
        assert_eq!(sigs[1].numerator, 3);
        assert_eq!(sigs.to_string(), "0.000=4=4,\n16.000=3=4");
        assert!("0.000=4".parse::<TimeSignatures>().is_err());
        assert!("0.000=0=4".parse::<TimeSignatures>().is_err());
    }

    #[test]
    fn chart_fields_replace_song_fields_individually() {
        let song = fields(Some("0.000=120.000"), Some("4.000=0.500"));
        let chart = fields(Some("0.000=180.000"), None);
        let merged = TimingData::merge(&song, Some(&chart), true);
        assert_eq!(merged.bpms.to_string(), "0.000=180.000");
        assert_eq!(merged.stops.to_string(), "4.000=0.500");
    }

    #[test]
    fn empty_chart_field_still_overrides() {
        let song = fields(Some("0.000=120.000"), Some("4.000=0.500"));
        let chart = fields(None, Some(""));
        let merged = TimingData::merge(&song, Some(&chart), true);
        assert!(merged.stops.is_empty());
        assert_eq!(merged.bpms, song.bpms.unwrap());
    }

    #[test]
    fn split_timing_flag_disables_chart_fields() {
        let song = fields(Some("0.000=120.000"), None);
        let chart = fields(Some("0.000=180.000"), None);
        let merged = TimingData::merge(&song, Some(&chart), false);
        assert_eq!(merged.bpms.to_string(), "0.000=120.000");
        assert_eq!(merged.offset, Decimal::from_int(0));
    }

    fn bpms(text: &str) -> TimingData {
        TimingData {
            bpms: text.parse().unwrap(),
            ..TimingData::default()
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn display_bpm_forms() {
        let timing = bpms("0.000=120.000,32.000=240.000");

        let shown = DisplayBpm::parse(Some("150"), &timing);
        assert_eq!(shown, DisplayBpm::Static(dec("150")));
        assert_eq!(shown.value(), Some(&dec("150")));
        assert_eq!(shown.to_string(), "150");

        let shown = DisplayBpm::parse(Some("100:200.5"), &timing);
        assert_eq!(shown.range(), Some((&dec("100"), &dec("200.5"))));
        assert_eq!(shown.to_string(), "100:200");

        let shown = DisplayBpm::parse(Some("*"), &timing);
        assert_eq!(
            shown,
            DisplayBpm::Random {
                min: dec("120"),
                max: dec("240"),
            }
        );
        assert_eq!((shown.value(), shown.range()), (None, None));
        assert_eq!(shown.to_string(), "*");
    }

    #[test]
    fn display_bpm_falls_back_to_tempos() {
        let single = bpms("0.000=150.000");
        assert_eq!(DisplayBpm::parse(None, &single), DisplayBpm::Static(dec("150")));

        let changing = bpms("0.000=180.000,16.000=90.000,32.000=180.000");
        let range = DisplayBpm::Range {
            min: dec("90"),
            max: dec("180"),
        };
        assert_eq!(DisplayBpm::parse(None, &changing), range);
        for junk in ["", "fast", "120:", ":240", "1:2:3"] {
            assert_eq!(DisplayBpm::parse(Some(junk), &changing), range, "{junk:?}");
        }

        assert_eq!(
            DisplayBpm::parse(None, &TimingData::default()),
            DisplayBpm::Static(Decimal::from_int(60))
        );
    }

    #[test]
    fn display_bpm_follows_the_timing_scope() {
        let song = TimingFields {
            display_bpm: Some("*".to_owned()),
            ..fields(Some("0.000=120.000"), None)
        };
        let chart = fields(Some("0.000=180.000"), None);

        assert_eq!(TimingData::merge(&song, Some(&chart), false).display_bpm.as_deref(), Some("*"));
        assert_eq!(TimingData::merge(&song, Some(&chart), true).display_bpm, None);

        let display_only = TimingFields {
            display_bpm: Some("200".to_owned()),
            ..TimingFields::default()
        };
        assert!(display_only.is_empty());
        assert_eq!(TimingData::merge(&song, Some(&display_only), true).display_bpm.as_deref(), Some("*"));
    }

    #[test]
    fn split_timing_version_threshold() {
        assert!(split_timing_allowed("0.83"));
        assert!(split_timing_allowed("0.7"));
        assert!(!split_timing_allowed("0.59"));
        assert!(!split_timing_allowed(""));
    }
}
