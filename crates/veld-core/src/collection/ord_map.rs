use crate::{
    collection::KeyCmp,
    value::{Shared, Value},
};
use std::{cmp::Ordering, fmt, ops::Bound};

///
/// OrdMap
///
/// Ordered map keyed by a pluggable comparator. Entries are kept in
/// ascending key order; keys are unique under the comparator.
///
/// Mutations bump a generation counter; a live `MapCursor` observing a
/// stale generation panics rather than yielding torn iteration.
///

pub struct OrdMap {
    cmp: KeyCmp,
    entries: Vec<(Value, Value)>,
    generation: u64,
}

impl OrdMap {
    #[must_use]
    pub fn new(cmp: KeyCmp) -> Self {
        Self {
            cmp,
            entries: Vec::new(),
            generation: 0,
        }
    }

    /// Insert or replace the entry for `key`, returning the previous
    /// value if one existed.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        self.generation += 1;
        match self.locate(&key) {
            Ok(at) => {
                let previous = std::mem::replace(&mut self.entries[at].1, value);
                Some(previous)
            }
            Err(at) => {
                self.entries.insert(at, (key, value));
                None
            }
        }
    }

    /// Remove the entry for `key`, returning it if one existed.
    pub fn remove(&mut self, key: &Value) -> Option<(Value, Value)> {
        match self.locate(key) {
            Ok(at) => {
                self.generation += 1;
                Some(self.entries.remove(at))
            }
            Err(_) => None,
        }
    }

    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.locate(key).ok().map(|at| &self.entries[at].1)
    }

    #[must_use]
    pub fn contains_key(&self, key: &Value) -> bool {
        self.locate(key).is_ok()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.generation += 1;
    }

    #[must_use]
    pub fn first(&self) -> Option<&(Value, Value)> {
        self.entries.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&(Value, Value)> {
        self.entries.last()
    }

    /// Ascending iteration over borrowed entries.
    pub fn iter(&self) -> std::slice::Iter<'_, (Value, Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Sorted entries as a slice.
    #[must_use]
    pub fn entries(&self) -> &[(Value, Value)] {
        self.entries.as_slice()
    }

    /// Ascending iteration over the entries between two key bounds.
    pub fn range(
        &self,
        lower: Bound<&Value>,
        upper: Bound<&Value>,
    ) -> std::slice::Iter<'_, (Value, Value)> {
        let start = match lower {
            Bound::Unbounded => 0,
            Bound::Included(k) => self.locate(k).unwrap_or_else(|at| at),
            Bound::Excluded(k) => match self.locate(k) {
                Ok(at) => at + 1,
                Err(at) => at,
            },
        };
        let end = match upper {
            Bound::Unbounded => self.entries.len(),
            Bound::Included(k) => match self.locate(k) {
                Ok(at) => at + 1,
                Err(at) => at,
            },
            Bound::Excluded(k) => self.locate(k).unwrap_or_else(|at| at),
        };
        self.entries[start..end.max(start)].iter()
    }

    #[must_use]
    pub fn comparator(&self) -> KeyCmp {
        self.cmp.clone()
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn get_at(&self, index: usize) -> Option<&(Value, Value)> {
        self.entries.get(index)
    }

    fn locate(&self, key: &Value) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|(probe, _)| (self.cmp)(probe, key))
    }
}

impl Clone for OrdMap {
    fn clone(&self) -> Self {
        Self {
            cmp: self.cmp.clone(),
            entries: self.entries.clone(),
            generation: 0,
        }
    }
}

impl fmt::Debug for OrdMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrdMap({} entries)", self.entries.len())
    }
}

impl<'a> IntoIterator for &'a OrdMap {
    type Item = &'a (Value, Value);
    type IntoIter = std::slice::Iter<'a, (Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

///
/// MapCursor
///
/// Guarded cursor over a shared map cell; see `SetCursor`.
///

pub struct MapCursor {
    cell: Shared<OrdMap>,
    index: usize,
    generation: u64,
}

impl MapCursor {
    #[must_use]
    pub fn new(cell: &Shared<OrdMap>) -> Self {
        let generation = cell.borrow().generation();
        Self {
            cell: cell.clone(),
            index: 0,
            generation,
        }
    }
}

impl Iterator for MapCursor {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<Self::Item> {
        let map = self.cell.borrow();
        assert!(
            map.generation() == self.generation,
            "ordered map mutated during iteration"
        );
        let entry = map.get_at(self.index).cloned();
        self.index += 1;
        entry
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn string_cmp() -> KeyCmp {
        Rc::new(|a: &Value, b: &Value| match (a, b) {
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => Ordering::Equal,
        })
    }

    fn map_of(entries: &[(&str, i64)]) -> OrdMap {
        let mut map = OrdMap::new(string_cmp());
        for (k, v) in entries {
            map.insert(Value::from(*k), Value::Integer(*v));
        }
        map
    }

    #[test]
    fn entries_iterate_in_key_order() {
        let map = map_of(&[("b", 2), ("a", 1), ("c", 3)]);
        let keys: Vec<&str> = map.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn insert_replaces_and_returns_previous() {
        let mut map = map_of(&[("a", 1)]);
        let previous = map.insert(Value::from("a"), Value::Integer(9));
        assert_eq!(previous.and_then(|v| v.as_integer()), Some(1));
        assert_eq!(
            map.get(&Value::from("a")).and_then(Value::as_integer),
            Some(9)
        );
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn remove_returns_entry() {
        let mut map = map_of(&[("a", 1), ("b", 2)]);
        let removed = map.remove(&Value::from("a"));
        assert!(removed.is_some());
        assert!(!map.contains_key(&Value::from("a")));
        assert!(map.remove(&Value::from("a")).is_none());
    }

    #[test]
    fn range_selects_key_window() {
        let map = map_of(&[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
        let keys: Vec<&str> = map
            .range(
                Bound::Excluded(&Value::from("a")),
                Bound::Included(&Value::from("c")),
            )
            .filter_map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    #[should_panic(expected = "ordered map mutated during iteration")]
    fn cursor_detects_interleaved_mutation() {
        let cell = Shared::new(map_of(&[("a", 1), ("b", 2)]));
        let mut cursor = MapCursor::new(&cell);
        cursor.next();
        cell.borrow_mut().remove(&Value::from("b"));
        cursor.next();
    }
}
