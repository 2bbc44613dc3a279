//! Host frame callbacks.
//!
//! The engine does not own a clock. It asks a [`FrameScheduler`] for the
//! next frame and the host later calls [`Engine::frame`](crate::engine::Engine::frame)
//! with a timestamp. Windowed hosts map requests onto redraw requests;
//! [`HeadlessFrames`] just remembers that a frame is owed.

/// Handle to one requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// Source of per-frame callbacks.
pub trait FrameScheduler {
    /// Ask the host for one more frame callback.
    fn request_frame(&mut self) -> FrameRequest;

    /// Withdraw a pending request.
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// Scheduler for tests and headless runs: requests are only recorded.
#[derive(Debug, Default)]
pub struct HeadlessFrames {
    next: u64,
    pending: Option<FrameRequest>,
    requested: u64,
    cancelled: u64,
}

impl HeadlessFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// The outstanding request, if any.
    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameScheduler for HeadlessFrames {
    fn request_frame(&mut self) -> FrameRequest {
        self.next += 1;
        self.requested += 1;
        let request = FrameRequest(self.next);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
            self.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_only_matches_pending_request() {
        let mut frames = HeadlessFrames::new();
        let first = frames.request_frame();
        let second = frames.request_frame();
        frames.cancel_frame(first);
        assert_eq!(frames.pending(), Some(second));
        frames.cancel_frame(second);
        assert_eq!(frames.pending(), None);
        assert_eq!((frames.requested(), frames.cancelled()), (2, 1));
    }
}
