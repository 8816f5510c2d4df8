//! A chained hash set keyed by precomputed integer hashes.
//!
//! Unlike `std::collections::HashSet`, the hash of every element is computed by the caller
//! and equality is decided by a predicate passed to each lookup.
//! This lets the same set store elements whose identity depends on outside state,
//! like arbiters that are compared by the shapes they refer to.

pub type HashValue = u64;

const HASH_COEF: HashValue = 3344921057;

/// Combine two hashes symmetrically, so that `hash_pair(a, b) == hash_pair(b, a)`.
#[inline]
pub fn hash_pair(a: HashValue, b: HashValue) -> HashValue {
    a.wrapping_mul(HASH_COEF) ^ b.wrapping_mul(HASH_COEF)
}

// primes that are roughly double the previous one, used as table sizes
const PRIMES: [usize; 29] = [
    5, 13, 23, 47, 97, 193, 389, 769, 1543, 3079, 6151, 12289, 24593, 49157, 98317, 196613,
    393241, 786433, 1572869, 3145739, 6291469, 12582917, 25165843, 50331653, 100663319,
    201326611, 402653189, 805306457, 1610612741,
];

/// The smallest table size from the prime table that is at least `n`.
pub(crate) fn next_prime(n: usize) -> usize {
    PRIMES
        .iter()
        .copied()
        .find(|&p| p >= n)
        .unwrap_or(PRIMES[PRIMES.len() - 1])
}

#[derive(Clone, Debug)]
struct Entry<T> {
    hash: HashValue,
    value: T,
}

#[derive(Clone, Debug)]
pub struct HashSet<T> {
    buckets: Vec<Vec<Entry<T>>>,
    count: usize,
    /// Returned from `find` when nothing matches.
    default_value: Option<T>,
}

impl<T> Default for HashSet<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T> HashSet<T> {
    /// Create a set with room for roughly `size` elements before it needs to grow.
    pub fn new(size: usize) -> Self {
        let size = next_prime(size);
        Self {
            buckets: (0..size).map(|_| Vec::new()).collect(),
            count: 0,
            default_value: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Set the value that `find` and `find_mut` fall back to when no element matches.
    pub fn set_default_value(&mut self, value: Option<T>) {
        self.default_value = value;
    }

    pub fn default_value_mut(&mut self) -> Option<&mut T> {
        self.default_value.as_mut()
    }

    #[inline]
    fn bucket_idx(&self, hash: HashValue) -> usize {
        (hash % self.buckets.len() as HashValue) as usize
    }

    fn grow(&mut self) {
        let new_size = next_prime(self.buckets.len() + 1);
        if new_size == self.buckets.len() {
            return;
        }
        let old_buckets = std::mem::replace(
            &mut self.buckets,
            (0..new_size).map(|_| Vec::new()).collect(),
        );
        for entry in old_buckets.into_iter().flatten() {
            let idx = self.bucket_idx(entry.hash);
            self.buckets[idx].push(entry);
        }
    }

    #[inline]
    fn position(&self, idx: usize, hash: HashValue, eq: impl Fn(&T) -> bool) -> Option<usize> {
        self.buckets[idx]
            .iter()
            .position(|entry| entry.hash == hash && eq(&entry.value))
    }

    /// Find the element matching `eq`, or insert the one created by `make` if there isn't one.
    /// Returns a reference to the element in the set either way.
    pub fn insert_with(
        &mut self,
        hash: HashValue,
        eq: impl Fn(&T) -> bool,
        make: impl FnOnce() -> T,
    ) -> &mut T {
        let mut idx = self.bucket_idx(hash);
        if let Some(pos) = self.position(idx, hash, &eq) {
            return &mut self.buckets[idx][pos].value;
        }

        if self.count >= self.buckets.len() {
            self.grow();
            idx = self.bucket_idx(hash);
        }
        self.buckets[idx].push(Entry {
            hash,
            value: make(),
        });
        self.count += 1;
        let bucket = &mut self.buckets[idx];
        let last = bucket.len() - 1;
        &mut bucket[last].value
    }

    /// Insert `value` unless an element matching `eq` already exists.
    /// Returns whether the value was inserted.
    pub fn insert(&mut self, hash: HashValue, value: T, eq: impl Fn(&T) -> bool) -> bool {
        let mut inserted = false;
        self.insert_with(hash, eq, || {
            inserted = true;
            value
        });
        inserted
    }

    pub fn remove(&mut self, hash: HashValue, eq: impl Fn(&T) -> bool) -> Option<T> {
        let idx = self.bucket_idx(hash);
        let pos = self.position(idx, hash, eq)?;
        self.count -= 1;
        Some(self.buckets[idx].swap_remove(pos).value)
    }

    /// Find the element matching `eq`, falling back to the default value if one is set.
    pub fn find(&self, hash: HashValue, eq: impl Fn(&T) -> bool) -> Option<&T> {
        let idx = self.bucket_idx(hash);
        match self.position(idx, hash, eq) {
            Some(pos) => Some(&self.buckets[idx][pos].value),
            None => self.default_value.as_ref(),
        }
    }

    /// Like [`find`][Self::find], but mutable.
    pub fn find_mut(&mut self, hash: HashValue, eq: impl Fn(&T) -> bool) -> Option<&mut T> {
        let idx = self.bucket_idx(hash);
        match self.position(idx, hash, eq) {
            Some(pos) => Some(&mut self.buckets[idx][pos].value),
            None => self.default_value.as_mut(),
        }
    }

    /// Check whether an element matching `eq` is stored in the set.
    /// Does not consider the default value.
    pub fn contains(&self, hash: HashValue, eq: impl Fn(&T) -> bool) -> bool {
        let idx = self.bucket_idx(hash);
        self.position(idx, hash, eq).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buckets.iter().flatten().map(|entry| &entry.value)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.buckets.iter_mut().flatten().map(|entry| &mut entry.value)
    }

    /// Remove every element for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&mut T) -> bool) {
        let mut removed = 0;
        for bucket in &mut self.buckets {
            let before = bucket.len();
            bucket.retain_mut(|entry| keep(&mut entry.value));
            removed += before - bucket.len();
        }
        self.count -= removed;
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_hash_is_symmetric() {
        assert_eq!(hash_pair(3, 17), hash_pair(17, 3));
        assert_ne!(hash_pair(3, 17), hash_pair(3, 18));
        assert_eq!(hash_pair(5, 5), 0);
    }

    #[test]
    fn prime_sizes() {
        assert_eq!(next_prime(0), 5);
        assert_eq!(next_prime(5), 5);
        assert_eq!(next_prime(6), 13);
        assert_eq!(next_prime(1000), 1543);
    }

    #[test]
    fn insert_find_remove() {
        let mut set: HashSet<(u32, &str)> = HashSet::new(0);
        assert!(set.insert(1, (1, "one"), |v| v.0 == 1));
        assert!(!set.insert(1, (1, "uno"), |v| v.0 == 1));
        // same hash, different element
        assert!(set.insert(1, (101, "hundred and one"), |v| v.0 == 101));
        assert_eq!(set.len(), 2);

        assert_eq!(set.find(1, |v| v.0 == 1), Some(&(1, "one")));
        assert_eq!(set.find(1, |v| v.0 == 101).map(|v| v.1), Some("hundred and one"));
        assert_eq!(set.find(2, |v| v.0 == 2), None);

        assert_eq!(set.remove(1, |v| v.0 == 1), Some((1, "one")));
        assert_eq!(set.remove(1, |v| v.0 == 1), None);
        assert_eq!(set.len(), 1);
        assert!(set.contains(1, |v| v.0 == 101));
    }

    #[test]
    fn insert_with_returns_existing() {
        let mut set: HashSet<(u64, u32)> = HashSet::new(0);
        set.insert_with(9, |v| v.0 == 9, || (9, 0)).1 += 1;
        set.insert_with(9, |v| v.0 == 9, || panic!("should already exist")).1 += 1;
        assert_eq!(set.find(9, |v| v.0 == 9), Some(&(9, 2)));
    }

    #[test]
    fn default_value_fallback() {
        let mut set: HashSet<(u64, &str)> = HashSet::new(0);
        set.set_default_value(Some((0, "default")));
        set.insert(4, (4, "four"), |v| v.0 == 4);
        assert_eq!(set.find(4, |v| v.0 == 4).map(|v| v.1), Some("four"));
        assert_eq!(set.find(8, |v| v.0 == 8).map(|v| v.1), Some("default"));
        // contains ignores the default
        assert!(!set.contains(8, |v| v.0 == 8));
        set.find_mut(8, |v| v.0 == 8).unwrap().1 = "changed";
        assert_eq!(set.default_value_mut().map(|v| v.1), Some("changed"));
    }

    #[test]
    fn growth_keeps_everything() {
        let mut set: HashSet<u64> = HashSet::new(0);
        for i in 0..1000 {
            set.insert(i * 7919, i, |&v| v == i);
        }
        assert_eq!(set.len(), 1000);
        for i in 0..1000 {
            assert!(set.contains(i * 7919, |&v| v == i));
        }
        let mut all: Vec<u64> = set.iter().copied().collect();
        all.sort_unstable();
        itertools::assert_equal(all, 0..1000);
    }

    #[test]
    fn retain_filters() {
        let mut set: HashSet<u64> = HashSet::new(0);
        for i in 0..50 {
            set.insert(i, i, |&v| v == i);
        }
        set.retain(|v| *v % 2 == 0);
        assert_eq!(set.len(), 25);
        assert!(set.iter().all(|v| v % 2 == 0));
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.iter().count(), 0);
    }
}
