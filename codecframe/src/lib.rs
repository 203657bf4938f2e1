#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! The demuxer is built around a single suspendable read protocol: each
//! codec parser requests bytes on demand from a growing buffer and hands
//! control back to the host whenever the buffered data runs short. On top
//! of that sit per-codec frame synchronization (second-header confirmation
//! for MPEG/AAC, trailing-CRC confirmation for FLAC), the Ogg container
//! state machine with continued-packet stitching, and a header cache that
//! stabilizes repeated parses and detects mid-stream parameter changes.
//!
//! ### Supported inputs
//!
//! | MIME | Framing |
//! |---|---|
//! | `audio/mpeg` | MPEG-1/2/2.5 Layers I-III |
//! | `audio/aac`, `audio/aacp` | AAC ADTS |
//! | `audio/flac` | native FLAC frames |
//! | `audio/ogg`, `application/ogg` | Ogg pages carrying Opus, Vorbis or FLAC |
//!
//! ### Processing model
//!
//! 1. Push bytes with [`Demuxer::parse_chunk`](process::demux::Demuxer::parse_chunk)
//!    and iterate the frames it completes.
//! 2. Call [`Demuxer::flush`](process::demux::Demuxer::flush) at end of
//!    input; remaining data is drained and the driver resets for reuse.
//!
//! Emitted frames carry their exact input bytes, decoded header fields and
//! running totals (frame number, byte and sample counts, stream time).

/// Streaming frame parsers and the demuxing driver.
///
/// 1. **Buffering** ([`process::buffer`]): the append-only raw window
///    behind the suspendable read protocol.
/// 2. **Framing** ([`process::mpeg`], [`process::aac`], [`process::flac`],
///    [`process::ogg`]): per-codec frame synchronization.
/// 3. **Driving** ([`process::demux`]): MIME dispatch, statistics mapping
///    and the public API.
pub mod process;

/// Data structures representing parsed headers, frames and containers.
///
/// - **Frames** ([`structs::frame`]): codec frames and headers
/// - **Codec headers** ([`structs::mpeg`], [`structs::aac`],
///   [`structs::flac`], [`structs::opus`], [`structs::vorbis`]): bit-field
///   decoders over small fixed prefixes
/// - **Containers** ([`structs::ogg`], [`structs::id3`]): page and tag
///   structures
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bit readers** ([`utils::bits`]): forward and reverse bit-level access
/// - **CRC validation** ([`utils::crc`]): page and frame checksums
/// - **Error handling** ([`utils::errors`]): error types
pub mod utils;
