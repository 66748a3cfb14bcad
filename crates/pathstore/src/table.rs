//! In-memory shape of the observation history.
//!
//! Selector paths are kept in first-observed order and serialized in that
//! order, so "first inserted wins" tie-breaks survive a restart.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Observation counts for one page, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorCounts {
    entries: Vec<(String, u64)>,
}

impl SelectorCounts {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, selector: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(s, _)| s == selector)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(s, c)| (s.as_str(), *c))
    }

    /// Highest count; the earliest entry wins a tie.
    pub fn best(&self) -> Option<(&str, u64)> {
        let mut best: Option<(&str, u64)> = None;
        for (selector, count) in self.iter() {
            match best {
                Some((_, top)) if count <= top => {}
                _ => best = Some((selector, count)),
            }
        }
        best
    }

    /// Add one observation. Returns the new count and whether the entry is new.
    pub(crate) fn increment(&mut self, selector: &str) -> (u64, bool) {
        if let Some((_, count)) = self.entries.iter_mut().find(|(s, _)| s == selector) {
            *count += 1;
            return (*count, false);
        }
        self.entries.push((selector.to_string(), 1));
        (1, true)
    }

    /// Undo the most recent [`increment`](Self::increment) of `selector`.
    pub(crate) fn revert(&mut self, selector: &str, created: bool) {
        if created {
            if self.entries.last().is_some_and(|(s, _)| s == selector) {
                self.entries.pop();
            }
        } else if let Some((_, count)) = self.entries.iter_mut().find(|(s, _)| s == selector) {
            *count = count.saturating_sub(1);
        }
    }
}

impl Serialize for SelectorCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (selector, count) in &self.entries {
            map.serialize_entry(selector, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SelectorCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountsVisitor;

        impl<'de> Visitor<'de> for CountsVisitor {
            type Value = SelectorCounts;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of selector path to observation count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut counts = SelectorCounts::default();
                while let Some((selector, count)) = access.next_entry::<String, u64>()? {
                    // Duplicate keys keep their first position and last value.
                    match counts.entries.iter_mut().find(|(s, _)| *s == selector) {
                        Some(entry) => entry.1 = count,
                        None => counts.entries.push((selector, count)),
                    }
                }
                Ok(counts)
            }
        }

        deserializer.deserialize_map(CountsVisitor)
    }
}

/// Full observation history: canonical page URL to its selector counts.
pub type PathTable = BTreeMap<String, SelectorCounts>;
