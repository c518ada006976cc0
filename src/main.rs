use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::info;

use stepchart::engine::{EngineOptions, NegativeTempo, WarpedPauses};
use stepchart::report::render_report;
use stepchart::timing::{RawTimingFields, Strictness, TimingFields};
use stepchart::{AnalysisOptions, JumpCounting, NoteData, OutputMode, TimingData, UnhittableNotes, analyze};

/// Time and count a StepMania chart.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File holding the chart's raw note data (the #NOTES grid)
    #[arg(short, long, value_name = "FILE")]
    notes: PathBuf,

    /// Columns per row; detected from the first row when omitted
    #[arg(short, long)]
    columns: Option<usize>,

    /// Tempo changes, e.g. "0.000=120.000,64.000=180.000"
    #[arg(long, default_value = "")]
    bpms: String,

    #[arg(long, default_value = "")]
    stops: String,

    #[arg(long, default_value = "")]
    delays: String,

    #[arg(long, default_value = "")]
    warps: String,

    #[arg(long, default_value = "")]
    fakes: String,

    /// Shown tempo: one number, "min:max", or "*"
    #[arg(long)]
    display_bpm: Option<String>,

    /// Song offset in seconds
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    offset: String,

    /// Skip malformed timing entries instead of failing
    #[arg(long)]
    lenient: bool,

    #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
    format: Format,

    #[arg(long, value_enum, default_value_t = Jumps::Once)]
    jump_counting: Jumps,

    #[arg(long, value_enum, default_value_t = Unhittable::Keep)]
    unhittable: Unhittable,

    /// Turn negative tempos and stops into warps
    #[arg(long)]
    negative_to_warps: bool,

    /// Let stops and delays inside warps take their full duration
    #[arg(long)]
    honor_warped_pauses: bool,

    /// Print the note data re-serialized instead of the report
    #[arg(long)]
    normalize: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Jumps {
    Once,
    PerNote,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Unhittable {
    Keep,
    Drop,
    TapToFake,
}

fn main() -> ExitCode {
    // Timing issues show by default; RUST_LOG overrides.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .try_init();
    let args = Args::parse();
    match run(&args) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<String, String> {
    let text = fs::read_to_string(&args.notes)
        .map_err(|e| format!("Failed to read {}: {}", args.notes.display(), e))?;
    let notes = match args.columns {
        Some(columns) => NoteData::new(text, columns),
        None => NoteData::detect(text),
    };
    info!("Loaded {} with {} columns", args.notes.display(), notes.columns());

    if args.normalize {
        let normalized = NoteData::from_notes(&notes, notes.columns()).map_err(|e| e.to_string())?;
        return Ok(normalized.into_string());
    }

    let strictness = if args.lenient { Strictness::Lenient } else { Strictness::Strict };
    let raw = RawTimingFields {
        bpms: Some(&args.bpms),
        stops: Some(&args.stops),
        delays: Some(&args.delays),
        warps: Some(&args.warps),
        fakes: Some(&args.fakes),
        offset: Some(&args.offset),
        display_bpm: args.display_bpm.as_deref(),
        ..RawTimingFields::default()
    };
    let fields = TimingFields::parse(&raw, strictness).map_err(|e| e.to_string())?;
    let timing = TimingData::from_song(&fields);

    let options = AnalysisOptions {
        engine: EngineOptions {
            negative_tempo: if args.negative_to_warps {
                NegativeTempo::ConvertToWarps
            } else {
                NegativeTempo::Flag
            },
            warped_pauses: if args.honor_warped_pauses {
                WarpedPauses::Honor
            } else {
                WarpedPauses::Skip
            },
        },
        jump_counting: match args.jump_counting {
            Jumps::Once => JumpCounting::Once,
            Jumps::PerNote => JumpCounting::PerNote,
        },
        unhittable: match args.unhittable {
            Unhittable::Keep => UnhittableNotes::Keep,
            Unhittable::Drop => UnhittableNotes::Drop,
            Unhittable::TapToFake => UnhittableNotes::TapToFake,
        },
    };
    let report = analyze(&notes, &timing, options).map_err(|e| e.to_string())?;

    let mode = match args.format {
        Format::Pretty => OutputMode::Pretty,
        Format::Json => OutputMode::Json,
    };
    let mut output = render_report(&report, mode);
    if !output.ends_with('\n') {
        output.push('\n');
    }
    Ok(output)
}
