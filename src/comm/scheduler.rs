/// Coalesces change notifications so at most one sync pass is pending.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    pending: bool,
    dropped: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a pass for the next frame. Returns false when one was already pending.
    pub fn request(&mut self) -> bool {
        if self.pending {
            self.dropped += 1;
            return false;
        }
        self.pending = true;
        true
    }

    /// Called at a frame boundary; true means the caller runs the pass now.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Requests folded into an already pending pass.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::FrameScheduler;

    #[test]
    fn bursts_collapse_into_one_pass() {
        let mut s = FrameScheduler::new();
        assert!(s.request());
        assert!(!s.request());
        assert!(!s.request());
        assert_eq!(s.dropped(), 2);

        assert!(s.take());
        assert!(!s.take());
        assert!(!s.is_pending());
        assert!(s.request());
    }
}
