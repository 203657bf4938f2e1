use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

#[derive(Debug, ClapParser)]
#[command(
    name       = env!("CARGO_PKG_NAME"),
    version    = env!("CARGO_PKG_VERSION"),
    author     = env!("CARGO_PKG_AUTHORS"),
    about      = "Inspect streaming audio bitstreams: MPEG, AAC, FLAC and Ogg (Opus/Vorbis/FLAC)",
    long_about = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress while reading.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print stream information
    Info(InfoArgs),

    /// Print one line per demuxed frame
    Dump(DumpArgs),
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input bitstream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// MIME type; inferred from the file extension when omitted.
    #[arg(long, value_name = "MIME")]
    pub mime: Option<String>,
}

#[derive(Debug, Args)]
pub struct DumpArgs {
    /// Input bitstream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// MIME type; inferred from the file extension when omitted.
    #[arg(long, value_name = "MIME")]
    pub mime: Option<String>,

    /// Stop after this many frames.
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

/// Resolves the demuxer MIME type from an explicit flag or the extension.
pub fn resolve_mime(input: &Path, explicit: Option<&str>) -> Result<String> {
    if let Some(mime) = explicit {
        return Ok(mime.to_string());
    }

    let extension = input
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());

    let mime = match extension.as_deref() {
        Some("mp3" | "mp2" | "mp1" | "mpga") => "audio/mpeg",
        Some("aac" | "adts") => "audio/aac",
        Some("flac") => "audio/flac",
        Some("ogg" | "oga" | "ogx" | "opus") => "application/ogg",
        _ => bail!(
            "Cannot infer a MIME type for {}; pass --mime",
            input.display()
        ),
    };

    Ok(mime.to_string())
}
