//! Vorbis identification header.
//!
//! The setup-header mode scan lives with the Vorbis frame parser; this
//! module only decodes the fixed-layout identification packet.

use crate::structs::frame::{CodecHeader, HeaderDetails};

/// Decoded Vorbis identification header.
#[derive(Debug, Clone)]
pub struct VorbisHeader {
    pub channels: u8,
    pub sample_rate: u32,
    pub bitrate_maximum: i32,
    pub bitrate_nominal: i32,
    pub bitrate_minimum: i32,
    /// Short window size in samples.
    pub blocksize0: u32,
    /// Long window size in samples.
    pub blocksize1: u32,
}

impl VorbisHeader {
    pub const MAGIC: &'static [u8] = b"\x01vorbis";
    const ID_LENGTH: usize = 30;

    /// Parses the identification packet; `None` when malformed.
    pub fn parse_id(packet: &[u8]) -> Option<Self> {
        if packet.len() < Self::ID_LENGTH || !packet.starts_with(Self::MAGIC) {
            return None;
        }

        let version = u32::from_le_bytes([packet[7], packet[8], packet[9], packet[10]]);
        if version != 0 {
            return None;
        }

        let channels = packet[11];
        let sample_rate = u32::from_le_bytes([packet[12], packet[13], packet[14], packet[15]]);
        if channels == 0 || sample_rate == 0 {
            return None;
        }

        // blocksize exponents, then the framing bit
        let blocksize0 = 1u32 << (packet[28] & 0x0F);
        let blocksize1 = 1u32 << (packet[28] >> 4);
        if blocksize0 > blocksize1 || packet[29] & 0x01 != 1 {
            return None;
        }

        Some(Self {
            channels,
            sample_rate,
            bitrate_maximum: i32::from_le_bytes([packet[16], packet[17], packet[18], packet[19]]),
            bitrate_nominal: i32::from_le_bytes([packet[20], packet[21], packet[22], packet[23]]),
            bitrate_minimum: i32::from_le_bytes([packet[24], packet[25], packet[26], packet[27]]),
            blocksize0,
            blocksize1,
        })
    }

    pub fn channel_mode(&self) -> String {
        match self.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            3 => "linear surround".to_string(),
            4 => "quadraphonic".to_string(),
            5 => "5.0 surround".to_string(),
            6 => "5.1 surround".to_string(),
            7 => "6.1 surround".to_string(),
            8 => "7.1 surround".to_string(),
            n => format!("{n} channels"),
        }
    }

    pub(crate) fn to_codec_header(&self) -> CodecHeader {
        CodecHeader {
            bit_depth: 16,
            channels: self.channels,
            channel_mode: self.channel_mode(),
            sample_rate: self.sample_rate,
            bitrate: 0,
            details: HeaderDetails::Vorbis(self.clone()),
        }
    }
}
