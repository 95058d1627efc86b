use chord_core::Tuning;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chord-listen", about = "Listens to strums and names the chord")]
pub struct Cli {
    /// Replay a recorded WAV take instead of listening to the input device
    #[arg(long)]
    pub wav: Option<PathBuf>,

    /// Engine config file (TOML). Defaults to ./chord-listen.toml if present
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Instrument tuning; overrides the config file
    #[arg(short, long, value_enum)]
    pub tuning: Option<TuningArg>,

    /// Stop live listening after this many seconds
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Block size used to derive the amplitude signal in --wav mode
    #[arg(long, default_value_t = chord_core::replay::DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// Number of runner-up candidates shown with each detection
    #[arg(long, default_value_t = 3)]
    pub candidates: usize,

    /// Print one JSON object per detection
    #[arg(long)]
    pub json: bool,

    /// List the chord vocabulary and exit
    #[arg(long)]
    pub list_chords: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TuningArg {
    Standard,
    Baritone,
}

impl From<TuningArg> for Tuning {
    fn from(arg: TuningArg) -> Self {
        match arg {
            TuningArg::Standard => Tuning::Standard,
            TuningArg::Baritone => Tuning::Baritone,
        }
    }
}
