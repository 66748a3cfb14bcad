use dashmap::DashMap;

/// Per-IP visit tally shown on the status page. Display only, never consulted
/// for admission.
#[derive(Debug, Default)]
pub struct VisitCounter {
    visits: DashMap<String, u64>,
}

impl VisitCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one visit and return the new total for `ip`.
    pub fn record(&self, ip: &str) -> u64 {
        let mut count = self.visits.entry(ip.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn get(&self, ip: &str) -> u64 {
        self.visits.get(ip).map(|c| *c).unwrap_or(0)
    }

    /// All counters sorted by IP.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut rows: Vec<_> = self
            .visits
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        rows.sort();
        rows
    }
}
