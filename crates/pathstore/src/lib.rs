//! Selector path recommendations.
//!
//! Callers report which selector path located the captcha on a page; later
//! callers of the same page ask which path has worked most often. The history
//! only ever grows, and it is written through to storage on every change so a
//! crash right after a response cannot lose an acknowledged observation.
//!
//! ## Example
//!
//! ```
//! use pathstore::{PathStore, Recommendation};
//!
//! let store = PathStore::in_memory();
//! store.observe("https://a.test/login?next=/", "#captcha").unwrap();
//!
//! assert_eq!(
//!     store.recommend("https://a.test/login"),
//!     Recommendation { path: Some("#captcha".into()), count: 1 }
//! );
//! ```

mod error;
mod repository;
mod store;
mod table;

pub use crate::error::StoreError;
pub use crate::repository::{
    InMemoryRepository, JsonFileRepository, PathRepository, RepositoryConfig,
};
pub use crate::store::{canonical_page_url, Observation, PathStore, Recommendation};
pub use crate::table::{PathTable, SelectorCounts};
