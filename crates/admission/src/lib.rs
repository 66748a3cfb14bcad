//! Request admission for the captcha solver.
//!
//! Every guarded route has a fixed-window quota per client address. The
//! text captcha and selector lookup routes carry tighter limits than the
//! default; everything else shares the default quota (but not its counter).
//!
//! ```
//! use admission::{AdmissionController, QuotaPolicy, Quota, RouteClass};
//!
//! let policy = QuotaPolicy::new("100 per hour".parse().unwrap())
//!     .with_override(RouteClass::TextCaptcha, Quota::per_minute(30));
//! let admission = AdmissionController::new(policy, 10_000);
//!
//! assert!(admission.admit("203.0.113.7", RouteClass::TextCaptcha).is_allowed());
//! ```

mod controller;
mod quota;
mod route;
mod visits;

pub use crate::controller::{Admission, AdmissionController};
pub use crate::quota::{Quota, QuotaParseError};
pub use crate::route::{QuotaPolicy, RouteClass};
pub use crate::visits::VisitCounter;
