use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Flags {
    running: AtomicBool,
    restart: AtomicBool,
}

/// Shared switch for the whole stream: the pump, the draw loop and the
/// capture task all stop once it is cleared
#[derive(Clone, Default)]
pub struct StreamControl {
    flags: Arc<Flags>,
}

impl StreamControl {
    /// New control in the running state.
    pub fn new() -> Self {
        let control = Self::default();
        control.start();
        control
    }

    pub fn start(&self) {
        self.flags.running.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.flags.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::Acquire)
    }

    /// Ask the media source to rewind.
    pub fn request_restart(&self) {
        self.flags.restart.store(true, Ordering::Release);
    }

    /// Consume a pending restart request.
    pub fn take_restart(&self) -> bool {
        self.flags.restart.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_running_flag() {
        let control = StreamControl::new();
        let other = control.clone();
        assert!(other.is_running());
        control.stop();
        assert!(!other.is_running());
        other.start();
        assert!(control.is_running());
    }

    #[test]
    fn restart_request_is_consumed_once() {
        let control = StreamControl::new();
        assert!(!control.take_restart());
        control.request_restart();
        assert!(control.take_restart());
        assert!(!control.take_restart());
    }
}
