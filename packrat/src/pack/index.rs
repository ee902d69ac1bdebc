//! Sorted case-insensitive lookup over an archive's entry table.

/// Entry lookup index.
///
/// Holds `(lowercased name, entry id)` pairs sorted by name. Rebuilt after
/// open and after every write entry is closed, so it is always either empty
/// or a permutation of the current entry table.
#[derive(Debug, Default)]
pub(crate) struct EntryIndex {
    sorted: Vec<(String, usize)>,
}

impl EntryIndex {
    pub(crate) fn new() -> Self {
        Self { sorted: Vec::new() }
    }

    /// Rebuild the index from the entry table's names, in table order.
    ///
    /// Archives produced by sloppy tools can contain case-duplicate names;
    /// the first occurrence wins and the rest are dropped from lookup.
    pub(crate) fn rebuild<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.sorted.clear();
        for (id, name) in names.into_iter().enumerate() {
            self.sorted.push((name.to_lowercase(), id));
        }
        self.sorted.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        self.sorted.dedup_by(|b, a| {
            if a.0 == b.0 {
                tracing::warn!(name = %b.0, "duplicate entry name in archive table; keeping first");
                true
            } else {
                false
            }
        });
    }

    /// Case-insensitive binary-search lookup.
    pub(crate) fn find(&self, name: &str) -> Option<usize> {
        let needle = name.to_lowercase();
        self.sorted
            .binary_search_by(|(n, _)| n.as_str().cmp(&needle))
            .ok()
            .map(|i| self.sorted[i].1)
    }

    pub(crate) fn len(&self) -> usize {
        self.sorted.len()
    }
}
