//! MPEG audio frame synchronization.
//!
//! Fixed-length framing with two-header confirmation; ID3v2 tags at the
//! read position are length-skipped before header probing.

use crate::process::buffer::ChunkBuffer;
use crate::process::cache::HeaderCache;
use crate::process::{
    LogStats, ProbedHeader, RawCodecFrame, fixed_length_frame_sync, skip_id3_tags,
};
use crate::structs::Probe;
use crate::structs::frame::HeaderDetails;
use crate::structs::mpeg::MpegHeader;
use crate::utils::errors::DemuxError;

#[derive(Debug, Default)]
pub struct MpegParser;

impl MpegParser {
    pub(crate) fn parse_frame(
        &mut self,
        buffer: &mut ChunkBuffer,
        cache: &mut HeaderCache,
        stats: &LogStats<'_>,
    ) -> Result<Option<RawCodecFrame>, DemuxError> {
        if !skip_id3_tags(buffer) {
            return Ok(None);
        }

        let synced = fixed_length_frame_sync(
            buffer,
            cache,
            stats,
            true,
            |header: &ProbedHeader| header.frame_length,
            Self::read_header,
        )?;

        Ok(synced.map(|(probed, data)| RawCodecFrame {
            header: probed.header,
            samples: probed.samples,
            data,
        }))
    }

    fn read_header(
        buffer: &ChunkBuffer,
        offset: usize,
        cache: &mut HeaderCache,
    ) -> Probe<ProbedHeader> {
        let Some(view) = buffer.view(MpegHeader::LENGTH, offset) else {
            return Probe::NeedData;
        };
        if view.len() < MpegHeader::LENGTH {
            return Probe::NeedData;
        }

        let bytes = &view[..MpegHeader::LENGTH];
        let key = MpegHeader::cache_key(bytes);

        if let Some(mut header) = cache.get_header(&key) {
            let HeaderDetails::Mpeg(details) = &mut header.details else {
                return Probe::Invalid;
            };
            details.refresh_from_bytes(bytes);
            let (frame_length, samples) = (details.frame_length, details.samples);

            return Probe::Valid(ProbedHeader {
                header,
                frame_length,
                samples,
            });
        }

        let Some(parsed) = MpegHeader::parse(bytes) else {
            return Probe::Invalid;
        };
        let (frame_length, samples) = (parsed.frame_length, parsed.samples);
        let header = parsed.into_codec_header();
        cache.set_header(&key, header.clone(), header.params());

        Probe::Valid(ProbedHeader {
            header,
            frame_length,
            samples,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn frame(filler: u8) -> Vec<u8> {
        // MPEG-1 Layer III, 44.1 kHz, 128 kbps, stereo: 417 bytes.
        let mut data = vec![0xFF, 0xFB, 0x90, 0x00];
        data.resize(417, filler);
        data
    }

    fn stats() -> LogStats<'static> {
        LogStats {
            enabled: false,
            codec: "mpeg",
            mime: "audio/mpeg",
            total_bytes_out: 0,
        }
    }

    fn parse_all_available(buffer: &mut ChunkBuffer) -> Vec<RawCodecFrame> {
        let mut parser = MpegParser;
        let mut cache = HeaderCache::new(None);
        let mut frames = Vec::new();
        while let Some(frame) = parser.parse_frame(buffer, &mut cache, &stats()).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn emits_confirmed_frames() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(&frame(0x11));
        buffer.push(&frame(0x22));
        buffer.push(&frame(0x33));
        buffer.set_flushing(true);

        let frames = parse_all_available(&mut buffer);
        assert_eq!(frames.len(), 3);
        for parsed in &frames {
            assert_eq!(parsed.data.len(), 417);
            assert_eq!(parsed.samples, 1152);
            assert_eq!(parsed.header.sample_rate, 44100);
        }
        assert_eq!(frames[1].data[4..], vec![0x22; 413][..]);
    }

    #[test]
    fn waits_for_confirmation_header() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(&frame(0x11));

        // One complete frame buffered, but nothing confirms it yet.
        assert!(parse_all_available(&mut buffer).is_empty());
        assert_eq!(buffer.read_position(), 0);

        buffer.push(&frame(0x22));
        let frames = parse_all_available(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(buffer.read_position(), 417);
    }

    #[test]
    fn junk_prefix_advances_one_byte_at_a_time() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(&[0x00, 0x01, 0x02]);
        buffer.push(&frame(0x11));
        buffer.push(&frame(0x22));

        let frames = parse_all_available(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(buffer.read_position(), 3 + 417);
    }

    #[test]
    fn failed_confirmation_drops_tentative_frame() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(&frame(0x11));
        // Junk where the second header should be, then two clean frames.
        buffer.push(&[0u8; 417]);
        buffer.push(&frame(0x22));
        buffer.push(&frame(0x33));

        let frames = parse_all_available(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data[4], 0x22);
    }

    #[test]
    fn skips_id3v2_tag() {
        let mut tag = Vec::new();
        tag.extend_from_slice(b"ID3");
        tag.extend_from_slice(&[4, 0, 0]);
        tag.extend_from_slice(&[0x00, 0x00, 0x00, 0x0A]); // 10 byte body
        tag.extend_from_slice(&[0xEE; 10]);

        let mut buffer = ChunkBuffer::new();
        buffer.push(&tag);
        buffer.push(&frame(0x11));
        buffer.push(&frame(0x22));

        let frames = parse_all_available(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(buffer.read_position(), 20 + 417);
    }
}
