// THEORY:
// The `FramePairStore` owns the only two frames under active comparison and is
// the sole authority on when "previous" may change. It replaces the single
// shared "previous frame" variable a naive render loop would keep, turning its
// implicit lifecycle into three explicit transitions:
//
// 1.  **observe**: a new frame becomes "current". The very first frame also
//     becomes "previous", so the first comparison reports zero motion.
// 2.  **begin_request**: the current pair is handed out for differencing and the
//     store remembers which frame was "current" at that moment.
// 3.  **commit_previous**: once the result for that pair is back, the remembered
//     frame becomes "previous".
//
// At most one pair is ever out for differencing. Frames observed in the
// meantime overwrite "current" without queueing (supersession), so a slow diff
// stage drops intermediate frames instead of growing memory or latency.

use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::error::{MotionError, Result};
use std::sync::Arc;
use tracing::trace;

/// The two frames a single diff request compares.
#[derive(Debug, Clone)]
pub struct FramePair {
    pub previous: Arc<PixelBuffer>,
    pub current: Arc<PixelBuffer>,
}

#[derive(Debug, Default)]
pub struct FramePairStore {
    previous: Option<Arc<PixelBuffer>>,
    current: Option<Arc<PixelBuffer>>,
    /// The frame that was "current" when the outstanding request was dispatched.
    in_flight: Option<Arc<PixelBuffer>>,
    /// Whether `current` has already been part of a dispatched pair.
    current_dispatched: bool,
    superseded: u64,
}

impl FramePairStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `frame` as the newest "current" frame.
    pub fn observe(&mut self, frame: PixelBuffer) -> Result<()> {
        if let Some(reference) = self.previous.as_deref() {
            reference.ensure_same_dimensions(&frame)?;
        }

        let frame = Arc::new(frame);
        if self.previous.is_none() {
            self.previous = Some(Arc::clone(&frame));
        }

        if self.current.is_some() && !self.current_dispatched {
            self.superseded += 1;
            trace!(superseded = self.superseded, "frame superseded before dispatch");
        }
        self.current = Some(frame);
        self.current_dispatched = false;
        Ok(())
    }

    /// Hands out the current pair for differencing, unless a request is already
    /// outstanding or the current frame was already compared.
    pub fn begin_request(&mut self) -> Option<FramePair> {
        if self.in_flight.is_some() || self.current_dispatched {
            return None;
        }
        let previous = self.previous.as_ref()?;
        let current = self.current.as_ref()?;

        let pair = FramePair {
            previous: Arc::clone(previous),
            current: Arc::clone(current),
        };
        self.in_flight = Some(Arc::clone(current));
        self.current_dispatched = true;
        Some(pair)
    }

    /// Promotes the frame that was current at dispatch time to "previous".
    pub fn commit_previous(&mut self) -> Result<()> {
        let committed = self
            .in_flight
            .take()
            .ok_or(MotionError::NoOutstandingRequest)?;
        self.previous = Some(committed);
        Ok(())
    }

    /// Releases the outstanding request without touching "previous".
    pub fn abandon_request(&mut self) -> Result<()> {
        self.in_flight
            .take()
            .map(|_| ())
            .ok_or(MotionError::NoOutstandingRequest)
    }

    pub fn is_request_outstanding(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn previous(&self) -> Option<&Arc<PixelBuffer>> {
        self.previous.as_ref()
    }

    pub fn current(&self) -> Option<&Arc<PixelBuffer>> {
        self.current.as_ref()
    }

    /// Frames that were overwritten before they could be compared.
    pub fn superseded(&self) -> u64 {
        self.superseded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;

    fn frame(value: u8) -> PixelBuffer {
        PixelBuffer::filled(4, 4, Pixel::gray(value))
    }

    #[test]
    fn first_frame_bootstraps_previous() {
        let mut store = FramePairStore::new();
        store.observe(frame(7)).unwrap();

        let pair = store.begin_request().unwrap();
        assert_eq!(*pair.previous, frame(7));
        assert_eq!(*pair.current, frame(7));
        assert!(Arc::ptr_eq(&pair.previous, &pair.current));
    }

    #[test]
    fn only_one_request_outstanding() {
        let mut store = FramePairStore::new();
        store.observe(frame(1)).unwrap();
        assert!(store.begin_request().is_some());

        store.observe(frame(2)).unwrap();
        assert!(store.begin_request().is_none());
        assert!(store.is_request_outstanding());
    }

    #[test]
    fn same_frame_is_not_dispatched_twice() {
        let mut store = FramePairStore::new();
        store.observe(frame(1)).unwrap();
        store.begin_request().unwrap();
        store.commit_previous().unwrap();
        assert!(store.begin_request().is_none());
    }

    #[test]
    fn observe_during_request_never_touches_previous() {
        let mut store = FramePairStore::new();
        store.observe(frame(10)).unwrap();
        store.begin_request().unwrap();

        store.observe(frame(20)).unwrap();
        store.observe(frame(30)).unwrap();
        assert_eq!(**store.previous().unwrap(), frame(10));
        assert_eq!(**store.current().unwrap(), frame(30));
        // frame(20) was overwritten before it could be dispatched
        assert_eq!(store.superseded(), 1);
    }

    #[test]
    fn commit_uses_frame_current_at_dispatch() {
        let mut store = FramePairStore::new();
        store.observe(frame(1)).unwrap();
        store.begin_request().unwrap();
        store.commit_previous().unwrap();

        store.observe(frame(2)).unwrap();
        let pair = store.begin_request().unwrap();
        assert_eq!(*pair.previous, frame(1));
        assert_eq!(*pair.current, frame(2));

        store.observe(frame(3)).unwrap();
        store.commit_previous().unwrap();
        assert_eq!(**store.previous().unwrap(), frame(2));

        let pair = store.begin_request().unwrap();
        assert_eq!(*pair.previous, frame(2));
        assert_eq!(*pair.current, frame(3));
    }

    #[test]
    fn abandon_keeps_previous_and_allows_redispatch_of_newer_frame() {
        let mut store = FramePairStore::new();
        store.observe(frame(1)).unwrap();
        store.begin_request().unwrap();
        store.commit_previous().unwrap();

        store.observe(frame(2)).unwrap();
        store.begin_request().unwrap();
        store.abandon_request().unwrap();
        assert_eq!(**store.previous().unwrap(), frame(1));
        assert!(!store.is_request_outstanding());

        store.observe(frame(3)).unwrap();
        let pair = store.begin_request().unwrap();
        assert_eq!(*pair.previous, frame(1));
        assert_eq!(*pair.current, frame(3));
    }

    #[test]
    fn commit_without_request_is_an_error() {
        let mut store = FramePairStore::new();
        assert!(matches!(
            store.commit_previous(),
            Err(MotionError::NoOutstandingRequest)
        ));
        assert!(matches!(
            store.abandon_request(),
            Err(MotionError::NoOutstandingRequest)
        ));
    }

    #[test]
    fn frames_must_keep_session_dimensions() {
        let mut store = FramePairStore::new();
        store.observe(frame(1)).unwrap();
        let err = store
            .observe(PixelBuffer::filled(8, 4, Pixel::gray(1)))
            .unwrap_err();
        assert!(matches!(err, MotionError::DimensionMismatch { .. }));
        assert_eq!(**store.current().unwrap(), frame(1));
    }

    #[test]
    fn nothing_to_request_before_first_frame() {
        let mut store = FramePairStore::new();
        assert!(store.begin_request().is_none());
    }
}
