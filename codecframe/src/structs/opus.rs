//! Opus identification header and packet TOC decoding.
//!
//! The identification header ("OpusHead") carries the stream parameters;
//! each audio packet prepends a table-of-contents byte selecting the coding
//! mode, bandwidth, frame duration and frame packing.

use std::fmt;

use crate::structs::frame::{CodecHeader, HeaderDetails};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpusMode {
    Silk,
    Hybrid,
    Celt,
}

impl fmt::Display for OpusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpusMode::Silk => write!(f, "SILK-only"),
            OpusMode::Hybrid => write!(f, "Hybrid"),
            OpusMode::Celt => write!(f, "CELT-only"),
        }
    }
}

/// Samples per frame at 48 kHz for TOC configs 0..=31.
const FRAME_SAMPLES: [u32; 32] = [
    480, 960, 1920, 2880, // SILK narrowband
    480, 960, 1920, 2880, // SILK medium-band
    480, 960, 1920, 2880, // SILK wideband
    480, 960, // Hybrid superwideband
    480, 960, // Hybrid fullband
    120, 240, 480, 960, // CELT narrowband
    120, 240, 480, 960, // CELT wideband
    120, 240, 480, 960, // CELT superwideband
    120, 240, 480, 960, // CELT fullband
];

const BANDWIDTHS: [&str; 5] = [
    "narrowband",
    "medium-band",
    "wideband",
    "superwideband",
    "fullband",
];

/// Decoded Opus header: identification fields plus, for audio packets, the
/// fields of the packet's TOC byte.
#[derive(Debug, Clone)]
pub struct OpusHeader {
    pub channels: u8,
    /// Samples to discard at stream start.
    pub pre_skip: u16,
    /// Sample rate of the encoder input; playback is always 48 kHz.
    pub input_sample_rate: u32,
    /// Q7.8 output gain in dB.
    pub output_gain: i16,
    pub channel_mapping_family: u8,
    pub stream_count: u8,
    pub coupled_stream_count: u8,
    pub channel_mapping: Vec<u8>,
    pub mode: OpusMode,
    pub bandwidth: &'static str,
    /// Duration of one frame in milliseconds.
    pub frame_size_ms: f64,
    pub frame_count: u8,
    pub is_vbr: bool,
    pub has_padding: bool,
}

impl OpusHeader {
    pub const MAGIC: &'static [u8] = b"OpusHead";
    const ID_LENGTH: usize = 19;

    /// Parses the "OpusHead" identification packet.
    pub fn parse_id(packet: &[u8]) -> Option<Self> {
        if packet.len() < Self::ID_LENGTH || !packet.starts_with(Self::MAGIC) {
            return None;
        }

        let channels = packet[9];
        if channels == 0 {
            return None;
        }

        let channel_mapping_family = packet[18];
        let (stream_count, coupled_stream_count, channel_mapping) = if channel_mapping_family == 0 {
            (1, channels - 1, Vec::new())
        } else {
            if packet.len() < Self::ID_LENGTH + 2 + channels as usize {
                return None;
            }
            (
                packet[19],
                packet[20],
                packet[21..21 + channels as usize].to_vec(),
            )
        };

        Some(Self {
            channels,
            pre_skip: u16::from_le_bytes([packet[10], packet[11]]),
            input_sample_rate: u32::from_le_bytes([
                packet[12], packet[13], packet[14], packet[15],
            ]),
            output_gain: i16::from_le_bytes([packet[16], packet[17]]),
            channel_mapping_family,
            stream_count,
            coupled_stream_count,
            channel_mapping,
            mode: OpusMode::Silk,
            bandwidth: BANDWIDTHS[0],
            frame_size_ms: 0.0,
            frame_count: 0,
            is_vbr: false,
            has_padding: false,
        })
    }

    /// Completes a header for one audio packet from its TOC byte.
    ///
    /// Returns the per-packet header and the packet's sample count at 48 kHz.
    pub fn with_toc(&self, packet: &[u8]) -> Option<(Self, u32)> {
        let &toc = packet.first()?;
        let config = (toc >> 3) as usize;
        let code = toc & 0x03;

        let (frame_count, is_vbr, has_padding) = match code {
            0 => (1, false, false),
            1 => (2, false, false),
            2 => (2, true, false),
            _ => {
                let &count_byte = packet.get(1)?;
                let frame_count = count_byte & 0x3F;
                if frame_count == 0 {
                    return None;
                }
                (frame_count, count_byte & 0x80 != 0, count_byte & 0x40 != 0)
            }
        };

        let mode = match config {
            0..=11 => OpusMode::Silk,
            12..=15 => OpusMode::Hybrid,
            _ => OpusMode::Celt,
        };

        let bandwidth = match config {
            0..=3 => BANDWIDTHS[0],
            4..=7 => BANDWIDTHS[1],
            8..=11 => BANDWIDTHS[2],
            12..=13 => BANDWIDTHS[3],
            14..=15 => BANDWIDTHS[4],
            16..=19 => BANDWIDTHS[0],
            20..=23 => BANDWIDTHS[2],
            24..=27 => BANDWIDTHS[3],
            _ => BANDWIDTHS[4],
        };

        let frame_samples = FRAME_SAMPLES[config];
        let samples = frame_samples * frame_count as u32;

        let header = Self {
            mode,
            bandwidth,
            frame_size_ms: frame_samples as f64 / 48.0,
            frame_count,
            is_vbr,
            has_padding,
            ..self.clone()
        };

        Some((header, samples))
    }

    pub fn channel_mode(&self) -> String {
        match (self.channel_mapping_family, self.channels) {
            (0, 1) => "mono".to_string(),
            (0, 2) => "stereo".to_string(),
            (1, 1) => "mono".to_string(),
            (1, 2) => "stereo".to_string(),
            (1, 3) => "linear surround".to_string(),
            (1, 4) => "quadraphonic".to_string(),
            (1, 5) => "5.0 surround".to_string(),
            (1, 6) => "5.1 surround".to_string(),
            (1, 7) => "6.1 surround".to_string(),
            (1, 8) => "7.1 surround".to_string(),
            (_, n) => format!("{n} channels"),
        }
    }

    pub(crate) fn to_codec_header(&self) -> CodecHeader {
        CodecHeader {
            bit_depth: 16,
            channels: self.channels,
            channel_mode: self.channel_mode(),
            sample_rate: 48000,
            bitrate: 0,
            details: HeaderDetails::Opus(self.clone()),
        }
    }
}
