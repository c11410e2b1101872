//! # Keyword Filters
//!
//! The live set of tracked keywords and their match counters.
//! Insertion order is kept because the first keyword found in a post is the one that counts.

/// A tracked keyword and how many posts it has matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordFilter {
    pub keyword: String,
    pub matches: u64,
}

#[derive(Debug, Default, Clone)]
pub struct KeywordFilters {
    entries: Vec<KeywordFilter>,
}

impl KeywordFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filters = Self::new();
        for keyword in keywords {
            filters.add(keyword);
        }
        filters
    }

    /// Inserts with a zero counter. Returns false if the keyword was already tracked.
    pub fn add(&mut self, keyword: impl Into<String>) -> bool {
        let keyword = keyword.into();
        if self.contains(&keyword) {
            return false;
        }
        self.entries.push(KeywordFilter {
            keyword,
            matches: 0,
        });
        true
    }

    /// Returns false if the keyword was not tracked.
    pub fn remove(&mut self, keyword: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|f| f.keyword != keyword);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.entries.iter().any(|f| f.keyword == keyword)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keywords(&self) -> Vec<String> {
        self.entries.iter().map(|f| f.keyword.clone()).collect()
    }

    /// Copy of every (keyword, count) pair, in tracking order.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        self.entries
            .iter()
            .map(|f| (f.keyword.clone(), f.matches))
            .collect()
    }

    /// First tracked keyword that occurs in `text` (case-sensitive).
    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|f| text.contains(f.keyword.as_str()))
            .map(|f| f.keyword.as_str())
    }

    /// Bumps the counter of `keyword`. Returns the new count, or None if untracked.
    pub fn record_match(&mut self, keyword: &str) -> Option<u64> {
        let entry = self.entries.iter_mut().find(|f| f.keyword == keyword)?;
        entry.matches = entry.matches.saturating_add(1);
        Some(entry.matches)
    }

    /// Finds the first keyword in `text` and records it. At most one counter moves per call.
    pub fn match_post(&mut self, text: &str) -> Option<String> {
        let keyword = self.first_match(text)?.to_string();
        self.record_match(&keyword);
        Some(keyword)
    }
}
