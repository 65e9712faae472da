pub mod control;
pub mod pump;
pub mod session;
pub mod stats;
pub mod timing;

pub use control::StreamControl;
pub use pump::{FramePump, PumpError, PumpOptions, TickOutcome};
pub use session::{InferenceSession, SessionMode};
pub use stats::{PumpSnapshot, PumpStats};
pub use timing::{Clock, FrameTiming, ManualClock, MonotonicClock};
