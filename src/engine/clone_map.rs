//! Identity map from originals to their clones.

use std::collections::BTreeMap;

use crate::types::ObjectId;

/// Mapping from original identity to clone identity for one clone pass.
///
/// Keys are [`ObjectId`]s, so two distinct originals with equal contents
/// never share a clone. An entry is recorded before the clone's fields are
/// populated, which is what makes cyclic graphs terminate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneMap {
    clones: BTreeMap<ObjectId, ObjectId>,
}

impl CloneMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone already produced for `original`, if any.
    pub fn lookup(&self, original: ObjectId) -> Option<ObjectId> {
        self.clones.get(&original).copied()
    }

    /// Record `clone` as the clone of `original`. Returns the previous entry.
    pub fn record(&mut self, original: ObjectId, clone: ObjectId) -> Option<ObjectId> {
        self.clones.insert(original, clone)
    }

    /// Drop the entry for `original`.
    pub fn forget(&mut self, original: ObjectId) -> Option<ObjectId> {
        self.clones.remove(&original)
    }

    /// Whether `original` has been cloned.
    pub fn contains(&self, original: ObjectId) -> bool {
        self.clones.contains_key(&original)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.clones.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.clones.is_empty()
    }

    /// Entries ordered by original id.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, ObjectId)> + '_ {
        self.clones.iter().map(|(o, c)| (*o, *c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lookup_forget() {
        let mut map = CloneMap::new();
        let a = ObjectId::new(1);
        let a2 = ObjectId::new(10);

        assert_eq!(map.lookup(a), None);
        assert_eq!(map.record(a, a2), None);
        assert_eq!(map.lookup(a), Some(a2));
        assert!(map.contains(a));
        assert_eq!(map.forget(a), Some(a2));
        assert!(map.is_empty());
    }

    #[test]
    fn test_iteration_ordered_by_original() {
        let mut map = CloneMap::new();
        map.record(ObjectId::new(5), ObjectId::new(50));
        map.record(ObjectId::new(2), ObjectId::new(20));

        let entries: Vec<_> = map.iter().collect();
        assert_eq!(
            entries,
            vec![
                (ObjectId::new(2), ObjectId::new(20)),
                (ObjectId::new(5), ObjectId::new(50)),
            ]
        );
    }
}
