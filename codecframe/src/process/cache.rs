//! Header cache and codec-parameter change detection.
//!
//! Parsed headers are cached under the stable bits of their raw bytes so
//! repeated identical headers decode to identical records. The cache is only
//! enabled once a parser has confirmed its first frame; until then every
//! header is re-parsed so bogus matches from an unsynced scan cannot poison
//! it. The cache also watches the effective codec parameters and fires the
//! codec-update callback when they change mid-stream.

use std::collections::HashMap;

use crate::structs::frame::{CodecHeader, CodecParams};

/// Called with the updated header and the stream time in milliseconds.
pub type CodecUpdateCallback = Box<dyn FnMut(&CodecHeader, f64)>;

struct CachedHeader {
    header: CodecHeader,
    #[allow(dead_code)]
    update_fields: CodecParams,
}

#[derive(Default)]
pub struct HeaderCache {
    enabled: bool,
    entries: HashMap<Box<[u8]>, CachedHeader>,
    current_key: Option<Box<[u8]>>,
    should_update: bool,
    last_bitrate: Option<u32>,
    last_reported: Option<(u32, CodecParams)>,
    on_codec_update: Option<CodecUpdateCallback>,
}

impl HeaderCache {
    pub fn new(on_codec_update: Option<CodecUpdateCallback>) -> Self {
        Self {
            on_codec_update,
            ..Self::default()
        }
    }

    /// Looks up a cached header and tracks the current-header key.
    pub fn get_header(&mut self, key: &[u8]) -> Option<CodecHeader> {
        let header = self.entries.get(key).map(|entry| entry.header.clone());
        self.track(key);
        header
    }

    /// Stores a parsed header; a no-op until the cache is enabled.
    pub fn set_header(&mut self, key: &[u8], header: CodecHeader, update_fields: CodecParams) {
        if !self.enabled {
            return;
        }

        self.track(key);
        self.entries.insert(
            key.into(),
            CachedHeader {
                header,
                update_fields,
            },
        );
    }

    /// Starts caching; called once a parser has confirmed its first frame.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Wipes and disables the cache; called when a parser loses sync.
    pub fn reset(&mut self) {
        self.enabled = false;
        self.entries.clear();
        self.current_key = None;
        self.should_update = false;
        self.last_bitrate = None;
        self.last_reported = None;
    }

    /// Fires the codec-update callback when the bitrate or the effective
    /// codec parameters of emitted frames change.
    ///
    /// Header-key tracking raises the update flag eagerly (a confirmation
    /// probe one frame ahead already sees the new header), so the callback
    /// is gated on what was last reported: it fires for the first frame
    /// that actually carries the changed bitrate or parameters.
    pub fn check_codec_update(&mut self, header: &CodecHeader, total_duration_ms: f64) {
        let Some(callback) = self.on_codec_update.as_mut() else {
            return;
        };

        if self.last_bitrate != Some(header.bitrate) {
            self.last_bitrate = Some(header.bitrate);
            self.should_update = true;
        }

        if self.should_update {
            let reported = (header.bitrate, header.params());
            if self.last_reported != Some(reported) {
                self.last_reported = Some(reported);
                callback(header, total_duration_ms);
            }
            self.should_update = false;
        }
    }

    fn track(&mut self, key: &[u8]) {
        if self.on_codec_update.is_none() {
            return;
        }

        if self.current_key.as_deref() != Some(key) {
            self.should_update = true;
            self.current_key = Some(key.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::structs::frame::HeaderDetails;
    use crate::structs::mpeg::MpegHeader;

    fn header(bitrate: u32, sample_rate: u32) -> CodecHeader {
        let mpeg = MpegHeader::parse(&[0xFF, 0xFB, 0x90, 0x00]).unwrap();
        let mut header = CodecHeader {
            sample_rate,
            bitrate,
            ..mpeg.into_codec_header()
        };
        if let HeaderDetails::Mpeg(details) = &mut header.details {
            details.sample_rate = sample_rate;
        }
        header
    }

    #[test]
    fn disabled_cache_ignores_set() {
        let mut cache = HeaderCache::new(None);
        let h = header(128, 44100);

        cache.set_header(b"key", h.clone(), h.params());
        assert!(cache.get_header(b"key").is_none());

        cache.enable();
        cache.set_header(b"key", h.clone(), h.params());
        let cached = cache.get_header(b"key").unwrap();
        assert_eq!(cached.sample_rate, h.sample_rate);
    }

    #[test]
    fn reset_wipes_and_disables() {
        let mut cache = HeaderCache::new(None);
        let h = header(128, 44100);

        cache.enable();
        cache.set_header(b"key", h.clone(), h.params());
        cache.reset();
        assert!(cache.get_header(b"key").is_none());

        // Disabled again after reset.
        cache.set_header(b"key", h.clone(), h.params());
        assert!(cache.get_header(b"key").is_none());
    }

    #[test]
    fn repeated_get_returns_equal_records() {
        let mut cache = HeaderCache::new(None);
        let h = header(128, 44100);

        cache.enable();
        cache.set_header(b"key", h, CodecParams { bit_depth: 16, channels: 2, sample_rate: 44100 });

        let first = cache.get_header(b"key").unwrap();
        let second = cache.get_header(b"key").unwrap();
        assert_eq!(first.params(), second.params());
        assert_eq!(first.bitrate, second.bitrate);
    }

    #[test]
    fn update_fires_exactly_on_change() {
        let calls: Rc<RefCell<Vec<(u32, f64)>>> = Rc::default();
        let sink = calls.clone();
        let mut cache = HeaderCache::new(Some(Box::new(move |header, time| {
            sink.borrow_mut().push((header.bitrate, time));
        })));
        cache.enable();

        // First frame always reports.
        cache.check_codec_update(&header(128, 44100), 0.0);
        // Unchanged bitrate and parameters: silent.
        cache.check_codec_update(&header(128, 44100), 26.12);
        cache.check_codec_update(&header(128, 44100), 52.24);
        // Bitrate change fires.
        cache.check_codec_update(&header(192, 44100), 78.37);
        // A tracked key change alone stays silent when nothing reportable
        // changed; the raised flag is cleared.
        cache.get_header(b"other-key");
        cache.check_codec_update(&header(192, 44100), 104.49);
        // A key change carrying new parameters fires.
        cache.get_header(b"resampled-key");
        cache.check_codec_update(&header(192, 48000), 130.61);

        let calls = calls.borrow();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], (128, 0.0));
        assert_eq!(calls[1], (192, 78.37));
        assert_eq!(calls[2], (192, 130.61));
    }
}
