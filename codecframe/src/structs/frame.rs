//! Frame and header types emitted by the demuxer.

use crate::structs::aac::AdtsHeader;
use crate::structs::flac::FlacHeader;
use crate::structs::mpeg::MpegHeader;
use crate::structs::ogg::OggPage;
use crate::structs::opus::OpusHeader;
use crate::structs::vorbis::VorbisHeader;

/// Decoded fixed-length prefix of a codec frame.
///
/// The common audio parameters are always populated before a frame carrying
/// the header is emitted; `bitrate` is filled in during frame statistics
/// mapping, not at header parse.
#[derive(Debug, Clone)]
pub struct CodecHeader {
    pub bit_depth: u8,
    pub channels: u8,
    /// Human-readable channel layout, e.g. `"stereo (left, right)"`.
    pub channel_mode: String,
    pub sample_rate: u32,
    /// Average bitrate of the carrying frame in kbps.
    pub bitrate: u32,
    pub details: HeaderDetails,
}

/// Codec-specific header fields.
#[derive(Debug, Clone)]
pub enum HeaderDetails {
    Mpeg(MpegHeader),
    Adts(AdtsHeader),
    Flac(FlacHeader),
    Opus(OpusHeader),
    Vorbis(VorbisHeader),
}

impl CodecHeader {
    /// The parameter subset whose change constitutes a codec update.
    pub fn params(&self) -> CodecParams {
        CodecParams {
            bit_depth: self.bit_depth,
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }
}

/// Codec parameters monitored for mid-stream changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecParams {
    pub bit_depth: u8,
    pub channels: u8,
    pub sample_rate: u32,
}

/// A single demuxed codec frame.
///
/// `data` owns the exact frame bytes (header plus payload). The running
/// totals are pre-increment: they describe the stream up to but excluding
/// this frame.
#[derive(Debug, Clone)]
pub struct CodecFrame {
    pub header: CodecHeader,
    pub data: Vec<u8>,
    pub samples: u32,
    /// Frame duration in milliseconds.
    pub duration: f64,
    pub frame_number: u64,
    /// IEEE CRC-32 of `data`.
    pub crc32: u32,
    pub total_bytes_out: u64,
    pub total_samples: u64,
    /// Stream time at the start of this frame, in milliseconds.
    pub total_duration: f64,
}

/// A frame produced by [`Demuxer::parse_chunk`](crate::process::demux::Demuxer::parse_chunk).
///
/// Raw bitstreams emit codec frames directly; Ogg streams emit whole pages
/// carrying zero or more codec frames each.
#[derive(Debug, Clone)]
pub enum Frame {
    Codec(CodecFrame),
    Page(OggPage),
}

impl Frame {
    /// The exact bytes this frame covers in the input.
    pub fn data(&self) -> &[u8] {
        match self {
            Frame::Codec(frame) => &frame.data,
            Frame::Page(page) => &page.raw_data,
        }
    }

    pub fn samples(&self) -> u32 {
        match self {
            Frame::Codec(frame) => frame.samples,
            Frame::Page(page) => page.samples,
        }
    }

    /// Duration in milliseconds.
    pub fn duration(&self) -> f64 {
        match self {
            Frame::Codec(frame) => frame.duration,
            Frame::Page(page) => page.duration,
        }
    }

    /// Stream time in milliseconds after this frame.
    pub fn total_duration(&self) -> f64 {
        match self {
            Frame::Codec(frame) => frame.total_duration + frame.duration,
            Frame::Page(page) => page.total_duration,
        }
    }

    /// The codec frames carried by this frame.
    pub fn codec_frames(&self) -> impl Iterator<Item = &CodecFrame> {
        match self {
            Frame::Codec(frame) => std::slice::from_ref(frame).iter(),
            Frame::Page(page) => page.codec_frames.iter(),
        }
    }
}
