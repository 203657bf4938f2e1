//! AAC ADTS frame synchronization.

use crate::process::buffer::ChunkBuffer;
use crate::process::cache::HeaderCache;
use crate::process::{
    LogStats, ProbedHeader, RawCodecFrame, fixed_length_frame_sync, skip_id3_tags,
};
use crate::structs::Probe;
use crate::structs::aac::AdtsHeader;
use crate::structs::frame::HeaderDetails;
use crate::utils::errors::DemuxError;

#[derive(Debug, Default)]
pub struct AacParser;

impl AacParser {
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
        let Some(view) = buffer.view(AdtsHeader::LENGTH, offset) else {
            return Probe::NeedData;
        };
        if view.len() < AdtsHeader::LENGTH {
            return Probe::NeedData;
        }

        let bytes = &view[..AdtsHeader::LENGTH];
        let key = AdtsHeader::cache_key(bytes);

        if let Some(mut header) = cache.get_header(&key) {
            let HeaderDetails::Adts(details) = &mut header.details else {
                return Probe::Invalid;
            };
            if details.refresh_from_bytes(bytes).is_none() {
                return Probe::Invalid;
            }
            let (frame_length, samples) = (details.frame_length, details.samples);

            return Probe::Valid(ProbedHeader {
                header,
                frame_length,
                samples,
            });
        }

        let Some(parsed) = AdtsHeader::parse(bytes) else {
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
    use crate::structs::aac::BufferFullness;

    pub(crate) fn frame(filler: u8) -> Vec<u8> {
        // AAC LC, 44.1 kHz, stereo, 359 bytes, VBR fullness.
        let mut data = vec![0xFF, 0xF1, 0x50, 0x80, 0x2C, 0xFF, 0xFC];
        data.resize(359, filler);
        data
    }

    fn stats() -> LogStats<'static> {
        LogStats {
            enabled: false,
            codec: "aac",
            mime: "audio/aac",
            total_bytes_out: 0,
        }
    }

    fn parse_all_available(buffer: &mut ChunkBuffer) -> Vec<RawCodecFrame> {
        let mut parser = AacParser;
        let mut cache = HeaderCache::new(None);
        let mut frames = Vec::new();
        while let Some(frame) = parser.parse_frame(buffer, &mut cache, &stats()).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn emits_adts_frames() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(&frame(0xAA));
        buffer.push(&frame(0xBB));

        let frames = parse_all_available(&mut buffer);
        assert_eq!(frames.len(), 1);

        let parsed = &frames[0];
        assert_eq!(parsed.data.len(), 359);
        assert_eq!(parsed.samples, 1024);
        assert_eq!(parsed.header.channel_mode, "stereo (left, right)");
        let HeaderDetails::Adts(details) = &parsed.header.details else {
            panic!("expected an ADTS header");
        };
        assert_eq!(details.buffer_fullness, BufferFullness::Vbr);
    }

    #[test]
    fn flush_emits_unconfirmed_tail() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(&frame(0xAA));
        buffer.set_flushing(true);

        let frames = parse_all_available(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.len(), 359);
    }

    #[test]
    fn resyncs_over_junk() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(&[0xFFu8, 0x00, 0x13, 0x37]);
        buffer.push(&frame(0xAA));
        buffer.push(&frame(0xBB));

        let frames = parse_all_available(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(buffer.read_position(), 4 + 359);
    }
}
