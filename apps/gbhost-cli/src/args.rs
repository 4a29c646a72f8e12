use std::path::PathBuf;

use clap::Parser;
use gbhost_runtime::{
    audio::{DEFAULT_BUFFER_FRAMES, DEFAULT_SAMPLE_RATE},
    frame::DEFAULT_PRESENT_HZ,
};

/// Headless Game Boy host driven from stdin
#[derive(Parser, Debug)]
#[command(name = "gbhost", author, version, about, long_about = None)]
pub struct Args {
    /// Cartridge image to insert at startup
    pub rom: Option<PathBuf>,

    /// Directory holding settings.json
    #[arg(long, default_value = ".gbhost")]
    pub config_dir: PathBuf,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Frames per audio callback buffer
    #[arg(long, default_value_t = DEFAULT_BUFFER_FRAMES)]
    pub buffer: u32,

    /// Drive the clock from the frame loop instead of a sound card
    #[arg(long)]
    pub no_audio: bool,

    /// Do not open a gamepad
    #[arg(long)]
    pub no_gamepad: bool,

    /// Presentation rate in Hz
    #[arg(long, default_value_t = DEFAULT_PRESENT_HZ)]
    pub fps: u32,

    /// Integer display scale (1-6)
    #[arg(long)]
    pub scale: Option<u8>,

    /// Exit after this many seconds
    #[arg(long)]
    pub seconds: Option<f64>,

    /// Write the last presented frame as PNG on exit
    #[arg(long)]
    pub dump_frame: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "gbhost=info")]
    pub log: String,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
