//! Recognition audit log.
//!
//! One JSON object per line, one file per channel, append only. Logging is
//! best effort: a full disk or a missing directory must never turn a
//! successful recognition into a failed response, so [`EventLog::record`]
//! returns nothing and reports trouble through `tracing`.

mod event;
mod log;

pub use crate::event::{CaptchaDetail, Outcome, RecognitionEvent};
pub use crate::log::{EventChannel, EventLog, EventLogError};
