//! Path table for mesh destination routing.

use std::collections::HashMap;
use std::time::Instant;

use meshd_core::types::MacAddress;

use super::types::MeshPath;

/// Path table mapping destination MAC addresses to mesh path entries.
///
/// The table is exclusively owned by the routing engine; external readers
/// get by-value snapshots.
#[must_use]
pub struct PathTable {
    entries: HashMap<MacAddress, MeshPath>,
}

impl PathTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Get the entry for `dst`, creating a fresh zeroed one if absent.
    ///
    /// A fresh entry expires at `now`, so it is reclaimed by housekeeping
    /// unless an announcement is accepted for it.
    pub fn get_or_insert(&mut self, dst: MacAddress, now: Instant) -> &mut MeshPath {
        self.entries
            .entry(dst)
            .or_insert_with(|| MeshPath::new(dst, now))
    }

    /// Copy out the entry for `dst`.
    #[must_use]
    pub fn lookup(&self, dst: &MacAddress) -> Option<MeshPath> {
        self.entries.get(dst).copied()
    }

    /// Consistent by-value copy of the whole table for introspection.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<MacAddress, MeshPath> {
        self.entries.clone()
    }

    /// Remove entries whose expiry time has passed.
    ///
    /// Returns the destinations that were evicted.
    pub fn expire(&mut self, now: Instant) -> Vec<MacAddress> {
        let mut evicted = Vec::new();
        self.entries.retain(|dst, entry| {
            if entry.is_expired(now) {
                evicted.push(*dst);
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Whether an entry exists for `dst`, regardless of expiry.
    #[must_use]
    pub fn contains(&self, dst: &MacAddress) -> bool {
        self.entries.contains_key(dst)
    }

    /// Number of entries in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&MacAddress, &MeshPath)> {
        self.entries.iter()
    }
}

impl Default for PathTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn make_mac(seed: u8) -> MacAddress {
        MacAddress::new([seed; 6])
    }

    #[test]
    fn get_or_insert_creates_once() {
        let mut table = PathTable::new();
        let now = Instant::now();

        let entry = table.get_or_insert(make_mac(1), now);
        entry.sn = 7;

        // Second call returns the same entry, not a fresh one.
        let entry = table.get_or_insert(make_mac(1), now + Duration::from_secs(5));
        assert_eq!(entry.sn, 7);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn lookup_copies_out() {
        let mut table = PathTable::new();
        let now = Instant::now();
        table.get_or_insert(make_mac(1), now).metric = 42;

        let copy = table.lookup(&make_mac(1)).unwrap();
        assert_eq!(copy.metric, 42);
        assert!(table.lookup(&make_mac(2)).is_none());
    }

    #[test]
    fn snapshot_is_independent() {
        let mut table = PathTable::new();
        let now = Instant::now();
        table.get_or_insert(make_mac(1), now).metric = 10;

        let snap = table.snapshot();
        table.get_or_insert(make_mac(1), now).metric = 99;

        assert_eq!(snap[&make_mac(1)].metric, 10);
    }

    #[test]
    fn expire_removes_only_stale_entries() {
        let mut table = PathTable::new();
        let now = Instant::now();

        let stale = table.get_or_insert(make_mac(1), now);
        stale.exp_time = now + Duration::from_secs(5);

        let fresh = table.get_or_insert(make_mac(2), now);
        fresh.exp_time = now + Duration::from_secs(60);

        let evicted = table.expire(now + Duration::from_secs(10));
        assert_eq!(evicted, vec![make_mac(1)]);
        assert!(!table.contains(&make_mac(1)));
        assert!(table.contains(&make_mac(2)));
    }

    // ================================================================== //
    // Boundary: expiration strict > semantics
    // ================================================================== //

    #[test]
    fn expire_at_exact_boundary_keeps_entry() {
        let mut table = PathTable::new();
        let now = Instant::now();
        let deadline = now + Duration::from_secs(10);
        table.get_or_insert(make_mac(1), now).exp_time = deadline;

        // now == exp_time → NOT expired
        assert!(table.expire(deadline).is_empty());
        assert!(table.contains(&make_mac(1)));

        // One past → expired
        let evicted = table.expire(deadline + Duration::from_millis(1));
        assert_eq!(evicted.len(), 1);
        assert!(!table.contains(&make_mac(1)));
    }

    #[test]
    fn fresh_entry_expires_after_one_tick() {
        let mut table = PathTable::new();
        let now = Instant::now();
        table.get_or_insert(make_mac(1), now);

        // A never-updated entry expires as soon as time moves.
        let evicted = table.expire(now + Duration::from_millis(1));
        assert_eq!(evicted, vec![make_mac(1)]);
        assert!(table.is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn insert_then_lookup(
            dst_bytes in any::<[u8; 6]>(),
            lifetime_ms in 1..600_000u64,
        ) {
            let mut table = PathTable::new();
            let now = Instant::now();
            let dst = MacAddress::new(dst_bytes);

            let entry = table.get_or_insert(dst, now);
            entry.exp_time = now + Duration::from_millis(lifetime_ms);

            let copy = table.lookup(&dst).unwrap();
            prop_assert!(!copy.is_expired(now));
            prop_assert!(copy.is_expired(now + Duration::from_millis(lifetime_ms + 1)));
        }

        #[test]
        fn expire_never_keeps_stale(
            lifetimes in proptest::collection::vec(0..10_000u64, 1..32),
            probe_ms in 0..20_000u64,
        ) {
            let mut table = PathTable::new();
            let now = Instant::now();
            for (i, ms) in lifetimes.iter().enumerate() {
                let dst = MacAddress::new([i as u8, 0, 0, 0, 0, 1]);
                table.get_or_insert(dst, now).exp_time = now + Duration::from_millis(*ms);
            }

            let probe = now + Duration::from_millis(probe_ms);
            table.expire(probe);
            for (_, entry) in table.iter() {
                prop_assert!(!entry.is_expired(probe));
            }
        }
    }
}
