//! The demuxing driver and public API.
//!
//! A [`Demuxer`] is constructed for one MIME family and owns the raw
//! buffer, the header cache and exactly one codec framer. Each pushed chunk
//! resumes parsing; frames are pulled lazily from the returned iterator and
//! parsing suspends when the buffered data runs short. [`Demuxer::flush`]
//! drains whatever remains and resets the driver for reuse.

use crate::process::aac::AacParser;
use crate::process::buffer::ChunkBuffer;
use crate::process::cache::{CodecUpdateCallback, HeaderCache};
use crate::process::flac::FlacParser;
use crate::process::mpeg::MpegParser;
use crate::process::ogg::OggParser;
use crate::process::{LogStats, RawCodecFrame};
use crate::structs::frame::{CodecFrame, Frame};
use crate::structs::ogg::OggPage;
use crate::utils::crc::CRC_32_IEEE;
use crate::utils::errors::DemuxError;

/// Called once the stream's codec is known.
pub type CodecCallback = Box<dyn FnMut(&str)>;

/// Construction options.
///
/// `on_codec` fires when the codec is known (immediately for raw bitstream
/// MIME types, at first-page identification for Ogg). `on_codec_update`
/// fires whenever the effective codec parameters or bitrate change, with
/// the stream time in milliseconds. `enable_logging` attaches the running
/// stream stats to parser warnings.
#[derive(Default)]
pub struct DemuxerOptions {
    pub on_codec: Option<CodecCallback>,
    pub on_codec_update: Option<CodecUpdateCallback>,
    pub enable_logging: bool,
}

#[derive(Clone, Copy)]
enum MimeKind {
    Mpeg,
    Aac,
    Flac,
    Ogg,
}

enum CodecFramer {
    Mpeg(MpegParser),
    Aac(AacParser),
    Flac(FlacParser),
    Ogg(OggParser),
}

enum Produced {
    Raw(RawCodecFrame),
    Page(OggPage),
}

/// Streaming audio demuxer.
pub struct Demuxer {
    mime: String,
    kind: MimeKind,
    codec: String,
    buffer: ChunkBuffer,
    cache: HeaderCache,
    framer: CodecFramer,
    on_codec: Option<CodecCallback>,
    enable_logging: bool,
    frame_number: u64,
    total_bytes_out: u64,
    total_samples: u64,
    sample_rate: u32,
    failed: bool,
}

impl Demuxer {
    /// Creates a demuxer for one of the supported MIME types:
    /// `audio/mpeg`, `audio/aac`, `audio/aacp`, `audio/flac`, `audio/ogg`
    /// or `application/ogg`.
    pub fn new(mime: &str, options: DemuxerOptions) -> Result<Self, DemuxError> {
        let kind = match mime {
            "audio/mpeg" => MimeKind::Mpeg,
            "audio/aac" | "audio/aacp" => MimeKind::Aac,
            "audio/flac" => MimeKind::Flac,
            "audio/ogg" | "application/ogg" => MimeKind::Ogg,
            other => return Err(DemuxError::UnsupportedMimeType(other.to_string())),
        };

        let (framer, codec) = Self::framer_for(kind);
        let mut on_codec = options.on_codec;
        if !codec.is_empty() {
            if let Some(callback) = on_codec.as_mut() {
                callback(codec);
            }
        }

        Ok(Self {
            mime: mime.to_string(),
            kind,
            codec: codec.to_string(),
            buffer: ChunkBuffer::new(),
            cache: HeaderCache::new(options.on_codec_update),
            framer,
            on_codec,
            enable_logging: options.enable_logging,
            frame_number: 0,
            total_bytes_out: 0,
            total_samples: 0,
            sample_rate: 0,
            failed: false,
        })
    }

    /// The detected codec tag, `""` until known.
    pub fn codec(&self) -> &str {
        &self.codec
    }

    /// Absolute read position: bytes consumed from the start of the stream.
    pub fn read_position(&self) -> u64 {
        self.buffer.read_position()
    }

    pub fn total_bytes_in(&self) -> u64 {
        self.buffer.total_in()
    }

    /// Bytes covered by the emitted codec frames.
    pub fn total_bytes_out(&self) -> u64 {
        self.total_bytes_out
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Appends a chunk and returns the frames it completes.
    pub fn parse_chunk(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.buffer.set_flushing(false);
        self.buffer.push(chunk);

        Frames {
            demuxer: self,
            flushing: false,
        }
    }

    /// Drains the remaining frames. The driver resets once the returned
    /// iterator is exhausted, so a subsequent push starts a new stream.
    pub fn flush(&mut self) -> Frames<'_> {
        self.buffer.set_flushing(true);

        Frames {
            demuxer: self,
            flushing: true,
        }
    }

    /// Parses a complete stream: `parse_chunk(bytes)` followed by `flush()`.
    pub fn parse_all(&mut self, bytes: &[u8]) -> Result<Vec<Frame>, DemuxError> {
        let mut frames = Vec::new();
        for frame in self.parse_chunk(bytes) {
            frames.push(frame?);
        }
        for frame in self.flush() {
            frames.push(frame?);
        }

        Ok(frames)
    }

    fn framer_for(kind: MimeKind) -> (CodecFramer, &'static str) {
        match kind {
            MimeKind::Mpeg => (CodecFramer::Mpeg(MpegParser), "mpeg"),
            MimeKind::Aac => (CodecFramer::Aac(AacParser), "aac"),
            MimeKind::Flac => (CodecFramer::Flac(FlacParser), "flac"),
            MimeKind::Ogg => (CodecFramer::Ogg(OggParser::new()), ""),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DemuxError> {
        let produced = {
            let stats = LogStats {
                enabled: self.enable_logging,
                codec: &self.codec,
                mime: &self.mime,
                total_bytes_out: self.total_bytes_out,
            };

            match &mut self.framer {
                CodecFramer::Mpeg(parser) => parser
                    .parse_frame(&mut self.buffer, &mut self.cache, &stats)?
                    .map(Produced::Raw),
                CodecFramer::Aac(parser) => parser
                    .parse_frame(&mut self.buffer, &mut self.cache, &stats)?
                    .map(Produced::Raw),
                CodecFramer::Flac(parser) => parser
                    .parse_frame(&mut self.buffer, &mut self.cache, &stats)?
                    .map(Produced::Raw),
                CodecFramer::Ogg(parser) => parser
                    .parse_frame(&mut self.buffer, &mut self.cache, &stats)?
                    .map(Produced::Page),
            }
        };

        // the Ogg framer may have just identified its nested codec
        if let CodecFramer::Ogg(parser) = &self.framer {
            let tag = parser.codec();
            if !tag.is_empty() && self.codec != tag {
                self.codec = tag.to_string();
                if let Some(callback) = self.on_codec.as_mut() {
                    callback(tag);
                }
            }
        }

        match produced {
            None => Ok(None),
            Some(Produced::Raw(raw)) => {
                let duration = if raw.header.sample_rate > 0 {
                    raw.samples as f64 / raw.header.sample_rate as f64 * 1000.0
                } else {
                    0.0
                };
                let mut frame = CodecFrame {
                    header: raw.header,
                    data: raw.data,
                    samples: raw.samples,
                    duration,
                    frame_number: 0,
                    crc32: 0,
                    total_bytes_out: 0,
                    total_samples: 0,
                    total_duration: 0.0,
                };
                self.map_codec_frame(&mut frame);

                Ok(Some(Frame::Codec(frame)))
            }
            Some(Produced::Page(mut page)) => {
                self.map_ogg_page(&mut page);

                Ok(Some(Frame::Page(page)))
            }
        }
    }

    /// Frame statistics mapping. Totals on the frame are pre-increment;
    /// the driver totals advance afterwards.
    fn map_codec_frame(&mut self, frame: &mut CodecFrame) {
        frame.header.bitrate = if frame.duration > 0.0 {
            (frame.data.len() as f64 / frame.duration).round() as u32 * 8
        } else {
            0
        };
        frame.frame_number = self.frame_number;
        self.frame_number += 1;

        frame.total_bytes_out = self.total_bytes_out;
        frame.total_samples = self.total_samples;
        frame.total_duration = if frame.header.sample_rate > 0 {
            self.total_samples as f64 / frame.header.sample_rate as f64 * 1000.0
        } else {
            0.0
        };
        frame.crc32 = CRC_32_IEEE.checksum(&frame.data);

        self.sample_rate = frame.header.sample_rate;
        self.cache
            .check_codec_update(&frame.header, frame.total_duration);

        self.total_bytes_out += frame.data.len() as u64;
        self.total_samples += frame.samples as u64;
    }

    fn map_ogg_page(&mut self, page: &mut OggPage) {
        let mut frames = std::mem::take(&mut page.codec_frames);
        for frame in &mut frames {
            page.duration += frame.duration;
            page.samples += frame.samples;
            self.map_codec_frame(frame);
        }
        page.codec_frames = frames;

        page.total_samples = self.total_samples;
        page.total_duration = if self.sample_rate > 0 {
            self.total_samples as f64 / self.sample_rate as f64 * 1000.0
        } else {
            0.0
        };
        page.total_bytes_out = self.total_bytes_out;
        page.crc32 = CRC_32_IEEE.checksum(&page.data);
    }

    /// Fresh buffer, cache and framer; counters zeroed. The codec-update
    /// callback is retained by the cache across resets.
    fn reset(&mut self) {
        let (framer, codec) = Self::framer_for(self.kind);
        self.framer = framer;
        self.codec = codec.to_string();
        self.buffer = ChunkBuffer::new();
        self.cache.reset();
        self.frame_number = 0;
        self.total_bytes_out = 0;
        self.total_samples = 0;
        self.sample_rate = 0;
        self.failed = false;
    }
}

/// Lazy frame sequence borrowed from the driver.
pub struct Frames<'a> {
    demuxer: &'a mut Demuxer,
    flushing: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame, DemuxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.demuxer.failed {
            if self.flushing {
                self.demuxer.reset();
            }
            return None;
        }

        match self.demuxer.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                if self.flushing {
                    self.demuxer.reset();
                }
                None
            }
            Err(error) => {
                self.demuxer.failed = true;
                Some(Err(error))
            }
        }
    }
}
