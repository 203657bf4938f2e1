//! Data structures representing parsed headers, frames and containers.
//!
//! - **Frames** ([`frame`]): codec frames, headers and the emitted frame enum
//! - **ID3v2** ([`id3`]): tag header with synchsafe length
//! - **MPEG** ([`mpeg`]): MPEG audio frame headers (Layers I-III)
//! - **AAC** ([`aac`]): ADTS headers
//! - **FLAC** ([`flac`]): native frame headers and STREAMINFO
//! - **Ogg** ([`ogg`]): page headers and pages
//! - **Opus** ([`opus`]): identification header and TOC decoding
//! - **Vorbis** ([`vorbis`]): identification header

pub mod aac;
pub mod flac;
pub mod frame;
pub mod id3;
pub mod mpeg;
pub mod ogg;
pub mod opus;
pub mod vorbis;

/// Outcome of probing buffered bytes for a header.
#[derive(Debug)]
pub(crate) enum Probe<T> {
    /// Not enough buffered data to decide; try again after the next chunk.
    NeedData,
    /// The bytes at this position are not a valid header.
    Invalid,
    Valid(T),
}
