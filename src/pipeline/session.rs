/// Engine-facing state of the pump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Engine still in its initial single-image mode
    #[default]
    Idle,
    /// Engine switched to continuous video mode; never goes back
    Streaming,
}

/// `busy` is set from submission until the result arrives, so at most one
/// inference call is ever in flight.
#[derive(Debug, Clone, Copy, Default)]
pub struct InferenceSession {
    mode: SessionMode,
    busy: bool,
}

impl InferenceSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Claim the session for this tick. `false` if a call is in flight.
    pub fn try_acquire(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    pub fn release(&mut self) {
        self.busy = false;
    }

    /// Move to streaming. Returns `true` only for the first call, which is
    /// the caller's cue to switch the engine.
    pub fn begin_streaming(&mut self) -> bool {
        if self.mode == SessionMode::Streaming {
            return false;
        }
        self.mode = SessionMode::Streaming;
        true
    }
}
