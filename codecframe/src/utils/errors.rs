use thiserror::Error;

/// Errors surfaced through the demuxer API.
///
/// Everything else the parsers encounter (unrecognized bytes, failed header
/// validation, missing confirmation headers, checksum mismatches) is handled
/// by local resynchronization and reported as a warning, never as an error.
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("Unsupported MIME type: {0}")]
    UnsupportedMimeType(String),

    #[error(transparent)]
    Vorbis(#[from] VorbisError),
}

/// Fatal Vorbis stream conditions.
///
/// The mode table recovered from the setup header is required to size every
/// subsequent audio packet, so a stream whose setup cannot be parsed is
/// unusable.
#[derive(Error, Debug)]
pub enum VorbisError {
    #[error("Invalid Vorbis identification header")]
    InvalidIdentification,

    #[error("Headers page is missing the setup packet")]
    MissingSetup,

    #[error("Framing bit not found in setup header")]
    FramingBitNotFound,

    #[error("Duplicate mode mapping {0:#04X} in setup header")]
    DuplicateModeMapping(u8),

    #[error("No mode entries found in setup header")]
    NoModes,

    #[error("Mode count mismatch: scanned {scanned}, coded {coded}")]
    ModeCountMismatch { scanned: usize, coded: usize },
}
