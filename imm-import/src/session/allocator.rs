//! In-memory primary key allocation

use std::collections::HashMap;

use crate::schema::tables::PrimaryKey;

/// Hands out `max(existing) + 1`, `+ 2`, ... per table
///
/// Seeded once per table; never re-queries, so the session must be the only
/// writer to the tables it allocates for.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: HashMap<PrimaryKey, i64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_seeded(&self, key: PrimaryKey) -> bool {
        self.next.contains_key(&key)
    }

    /// Record the largest existing key; `None` for an empty table
    ///
    /// Re-seeding an already seeded table is ignored so keys are never reused.
    pub fn seed(&mut self, key: PrimaryKey, max_existing: Option<i64>) {
        let start = max_existing.unwrap_or(0) + 1;
        self.next.entry(key).or_insert_with(|| {
            log::debug!("Seeded {}.{} at {}", key.table, key.column, start);
            start
        });
    }

    /// Next key for a seeded table, `None` when the table was never seeded
    pub fn next(&mut self, key: PrimaryKey) -> Option<i64> {
        let slot = self.next.get_mut(&key)?;
        let id = *slot;
        *slot += 1;
        Some(id)
    }

    /// Peek without consuming
    pub fn peek(&self, key: PrimaryKey) -> Option<i64> {
        self.next.get(&key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables::{ITEM, TAXONOMY};

    #[test]
    fn test_monotonic_from_seed() {
        let mut allocator = IdAllocator::new();
        allocator.seed(ITEM, Some(1000));
        assert_eq!(allocator.next(ITEM), Some(1001));
        assert_eq!(allocator.next(ITEM), Some(1002));
        assert_eq!(allocator.next(ITEM), Some(1003));
    }

    #[test]
    fn test_empty_table_starts_at_one() {
        let mut allocator = IdAllocator::new();
        allocator.seed(TAXONOMY, None);
        assert_eq!(allocator.next(TAXONOMY), Some(1));
    }

    #[test]
    fn test_reseed_is_ignored() {
        let mut allocator = IdAllocator::new();
        allocator.seed(ITEM, Some(10));
        allocator.next(ITEM);
        allocator.seed(ITEM, Some(3));
        assert_eq!(allocator.next(ITEM), Some(12));
    }

    #[test]
    fn test_unseeded_table() {
        let mut allocator = IdAllocator::new();
        assert_eq!(allocator.next(ITEM), None);
        assert!(!allocator.is_seeded(ITEM));
    }
}
