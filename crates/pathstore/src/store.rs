use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::repository::{InMemoryRepository, PathRepository};
use crate::table::PathTable;
use crate::StoreError;

/// Strip the query string: `https://a.test/p?x=1` and `https://a.test/p` are
/// the same page.
pub fn canonical_page_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Answer to "which selector path works best on this page?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub path: Option<String>,
    pub count: u64,
}

impl Recommendation {
    pub fn none() -> Self {
        Self {
            path: None,
            count: 0,
        }
    }
}

/// Outcome of [`PathStore::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Page URL or selector path was empty; nothing was recorded.
    Ignored,
    /// Count after the increment, already persisted.
    Recorded { count: u64 },
}

/// Page URL → selector path → count, persisted on every change.
///
/// All observes serialize on one write lock that is held across the
/// increment and the save, so concurrent increments are never lost and the
/// file is never written by two observers at once. Lookups share a read lock.
pub struct PathStore {
    table: RwLock<PathTable>,
    repository: Box<dyn PathRepository>,
}

impl PathStore {
    /// Load the persisted table once. A corrupt table is a hard error.
    pub fn open(repository: Box<dyn PathRepository>) -> Result<Self, StoreError> {
        let table = repository.load()?;
        info!(
            repository = %repository.describe(),
            pages = table.len(),
            "path store opened"
        );
        Ok(Self {
            table: RwLock::new(table),
            repository,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            table: RwLock::new(PathTable::new()),
            repository: Box::new(InMemoryRepository::new()),
        }
    }

    /// Most observed selector path for `page_url`, `(None, 0)` when unknown.
    pub fn recommend(&self, page_url: &str) -> Recommendation {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .get(canonical_page_url(page_url))
            .and_then(|counts| counts.best())
            .map(|(path, count)| Recommendation {
                path: Some(path.to_string()),
                count,
            })
            .unwrap_or_else(Recommendation::none)
    }

    /// Record that `selector` located the captcha on `page_url`.
    ///
    /// Returns only after the new table is durably saved. When the save fails
    /// the increment is rolled back and the error returned, so the in-memory
    /// view never runs ahead of disk.
    pub fn observe(&self, page_url: &str, selector: &str) -> Result<Observation, StoreError> {
        let page = canonical_page_url(page_url);
        if page.is_empty() || selector.is_empty() {
            debug!(page, selector, "ignoring empty path observation");
            return Ok(Observation::Ignored);
        }

        let mut table = self.table.write().map_err(|_| StoreError::Poisoned)?;
        let page_created = !table.contains_key(page);
        let counts = table.entry(page.to_string()).or_default();
        let (count, created) = counts.increment(selector);

        if let Err(e) = self.repository.save_atomic(&table) {
            warn!(page, selector, error = %e, "path observation not persisted, rolling back");
            if page_created {
                table.remove(page);
            } else if let Some(counts) = table.get_mut(page) {
                counts.revert(selector, created);
            }
            return Err(e);
        }

        debug!(page, selector, count, "path observation recorded");
        Ok(Observation::Recorded { count })
    }

    /// Every selector recorded for `page_url`, in first-observed order.
    pub fn snapshot(&self, page_url: &str) -> Vec<(String, u64)> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .get(canonical_page_url(page_url))
            .map(|counts| counts.iter().map(|(s, c)| (s.to_string(), c)).collect())
            .unwrap_or_default()
    }

    pub fn page_count(&self) -> usize {
        self.table.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn describe(&self) -> String {
        self.repository.describe()
    }
}

impl std::fmt::Debug for PathStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathStore")
            .field("repository", &self.repository.describe())
            .field("pages", &self.page_count())
            .finish()
    }
}
