mod cancel_flag;
mod status_event;

pub use cancel_flag::CancelFlag;
pub use status_event::{ProgressReporter, StatusEvent};
