//! Streaming frame parsers and the demuxing driver.
//!
//! 1. **Buffering** ([`buffer`]): the append-only raw window behind the
//!    suspendable read protocol.
//! 2. **Framing** ([`mpeg`], [`aac`], [`flac`], [`ogg`]): per-codec frame
//!    synchronization over the shared buffer.
//! 3. **Driving** ([`demux`]): MIME dispatch, frame statistics and the
//!    public `parse_chunk`/`flush` surface.

use log::{debug, warn};

use crate::process::buffer::ChunkBuffer;
use crate::process::cache::HeaderCache;
use crate::structs::Probe;
use crate::structs::frame::CodecHeader;
use crate::structs::id3::Id3v2Header;
use crate::utils::errors::DemuxError;

pub mod aac;
pub mod buffer;
pub mod cache;
pub mod demux;
pub mod flac;
pub mod mpeg;
pub mod ogg;
pub mod opus;
pub mod vorbis;

/// A frame as produced by a codec framer, before statistics mapping.
#[derive(Debug)]
pub(crate) struct RawCodecFrame {
    pub header: CodecHeader,
    pub data: Vec<u8>,
    pub samples: u32,
}

/// A fixed-length frame header located at the current read position.
#[derive(Debug)]
pub(crate) struct ProbedHeader {
    pub header: CodecHeader,
    pub frame_length: usize,
    pub samples: u32,
}

/// Stream context attached to parser warnings.
pub(crate) struct LogStats<'a> {
    pub enabled: bool,
    pub codec: &'a str,
    pub mime: &'a str,
    pub total_bytes_out: u64,
}

impl LogStats<'_> {
    pub fn warn(&self, buffer: &ChunkBuffer, message: &str) {
        if self.enabled {
            warn!(
                "{message} [codec {:?}; mime {}; read position {}; total bytes in {}; total bytes out {}]",
                self.codec,
                self.mime,
                buffer.read_position(),
                buffer.total_in(),
                self.total_bytes_out,
            );
        } else {
            debug!("{message}");
        }
    }
}

/// The shared fixed-length synchronization skeleton.
///
/// Finds a valid header at the read position, confirms it by locating a
/// second valid header one frame length ahead (unless `confirm_next` is off
/// or the stream is flushing), then consumes and returns the frame bytes.
/// Unrecognized bytes advance the position by one; a failed confirmation
/// additionally drops the header cache.
pub(crate) fn fixed_length_frame_sync<T, F>(
    buffer: &mut ChunkBuffer,
    cache: &mut HeaderCache,
    stats: &LogStats<'_>,
    confirm_next: bool,
    frame_length: impl Fn(&T) -> usize,
    mut read_header: F,
) -> Result<Option<(T, Vec<u8>)>, DemuxError>
where
    F: FnMut(&ChunkBuffer, usize, &mut HeaderCache) -> Probe<T>,
{
    loop {
        let header = match read_header(buffer, 0, cache) {
            Probe::NeedData => return Ok(None),
            Probe::Invalid => {
                buffer.advance(1);
                continue;
            }
            Probe::Valid(header) => header,
        };

        let length = frame_length(&header);

        let confirmed = if !confirm_next || buffer.flushing() {
            true
        } else {
            match read_header(buffer, length, cache) {
                Probe::NeedData => return Ok(None),
                Probe::Invalid => false,
                Probe::Valid(_) => true,
            }
        };

        if confirmed {
            let Some(view) = buffer.view(length, 0) else {
                return Ok(None);
            };
            let take = length.min(view.len());
            let data = view[..take].to_vec();

            cache.enable();
            buffer.advance(take);
            return Ok(Some((header, data)));
        }

        stats.warn(
            buffer,
            &format!(
                "Missing {} header at {length} bytes from current position. \
                 Dropping current frame and trying next one.",
                stats.codec
            ),
        );
        cache.reset();
        buffer.advance(1);
    }
}

/// Skips ID3v2 tags at the current read position.
///
/// Returns `false` to suspend: either the tag header or its payload is not
/// fully buffered yet.
pub(crate) fn skip_id3_tags(buffer: &mut ChunkBuffer) -> bool {
    loop {
        let Some(view) = buffer.view(Id3v2Header::LENGTH, 0) else {
            return false;
        };
        if view.len() < Id3v2Header::LENGTH {
            // flushing remainder, too short for a tag
            return true;
        }

        let Some(tag) = Id3v2Header::parse(&view[..Id3v2Header::LENGTH]) else {
            return true;
        };

        let total = tag.total_length();
        let Some(tag_view) = buffer.view(total, 0) else {
            return false;
        };

        let skip = total.min(tag_view.len());
        debug!(
            "Skipping ID3v2.{}.{} tag ({total} bytes)",
            tag.version_major, tag.version_minor
        );
        buffer.advance(skip);

        if skip < total {
            // flushing, truncated tag payload
            return true;
        }
    }
}
