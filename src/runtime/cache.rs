//! Bounded cache of recently seen segments, used to decide which
//! snapshots are novel enough to persist.

use indexmap::IndexMap;

use crate::darwin::segments::DepTimeKind;

/// Natural key of a segment snapshot stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentId {
    pub rid: String,
    pub first: &'static str,
    pub second: &'static str,
    pub planned_dep: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentState {
    pub last_dep_time: Option<String>,
    pub last_kind: DepTimeKind,
    /// True once the confirmed-departure row was written. Never reverts.
    pub actual_saved: bool,
    pub last_seen_order: u64,
}

impl Default for SegmentState {
    fn default() -> Self {
        Self {
            last_dep_time: None,
            last_kind: DepTimeKind::Missing,
            actual_saved: false,
            last_seen_order: 0,
        }
    }
}

/// Insertion-ordered map with LRU eviction and EST -> ACTUAL upgrade
/// semantics. `actual_saved` is only ever set through
/// [`RecentSegmentCache::mark_actual_saved`], after the corresponding
/// write succeeded.
#[derive(Debug)]
pub struct RecentSegmentCache {
    max_size: usize,
    entries: IndexMap<SegmentId, SegmentState>,
    tick: u64,
}

impl RecentSegmentCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: IndexMap::new(),
            tick: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &SegmentId) -> Option<&SegmentState> {
        self.entries.get(id)
    }

    /// Upsert the segment state, mark it most recently used, and evict
    /// from the least-recent end until the size bound holds.
    pub fn touch(
        &mut self,
        id: &SegmentId,
        dep_time: Option<&str>,
        kind: DepTimeKind,
        has_actual: bool,
    ) -> &SegmentState {
        self.tick += 1;

        // Remove-and-reinsert moves the entry to the most-recent end while
        // preserving the order of everything else.
        let mut state = self.entries.shift_remove(id).unwrap_or_default();

        state.last_dep_time = dep_time.map(str::to_string);
        state.last_kind = kind;
        state.last_seen_order = self.tick;

        if has_actual && state.last_kind != DepTimeKind::Actual {
            state.last_kind = DepTimeKind::Actual;
        }

        self.entries.insert(id.clone(), state);

        while self.entries.len() > self.max_size {
            self.entries.shift_remove_index(0);
        }

        self.entries.get(id).expect("entry was just inserted")
    }

    pub fn mark_actual_saved(&mut self, id: &SegmentId) {
        if let Some(state) = self.entries.get_mut(id) {
            state.actual_saved = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(rid: &str) -> SegmentId {
        SegmentId {
            rid: rid.to_string(),
            first: "SOTON",
            second: "SOTPKWY",
            planned_dep: Some("09:00".to_string()),
        }
    }

    #[test]
    fn touch_creates_and_updates() {
        let mut cache = RecentSegmentCache::new(10);
        let state = cache.touch(&id("A"), Some("09:03"), DepTimeKind::Estimate, false);
        assert_eq!(state.last_dep_time.as_deref(), Some("09:03"));
        assert_eq!(state.last_kind, DepTimeKind::Estimate);
        assert!(!state.actual_saved);

        let state = cache.touch(&id("A"), Some("09:04"), DepTimeKind::Estimate, false);
        assert_eq!(state.last_dep_time.as_deref(), Some("09:04"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn has_actual_upgrades_kind() {
        let mut cache = RecentSegmentCache::new(10);
        let state = cache.touch(&id("A"), Some("09:04"), DepTimeKind::Estimate, true);
        assert_eq!(state.last_kind, DepTimeKind::Actual);
    }

    #[test]
    fn actual_saved_survives_touches() {
        let mut cache = RecentSegmentCache::new(10);
        cache.touch(&id("A"), Some("09:04"), DepTimeKind::Actual, true);
        cache.mark_actual_saved(&id("A"));

        cache.touch(&id("A"), Some("09:05"), DepTimeKind::Actual, true);
        assert!(cache.get(&id("A")).unwrap().actual_saved);
    }

    #[test]
    fn mark_actual_saved_on_missing_key_is_a_no_op() {
        let mut cache = RecentSegmentCache::new(10);
        cache.mark_actual_saved(&id("ghost"));
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_least_recently_touched() {
        let mut cache = RecentSegmentCache::new(3);
        for rid in ["A", "B", "C"] {
            cache.touch(&id(rid), None, DepTimeKind::Missing, false);
        }
        // Refresh A so that B becomes the oldest.
        cache.touch(&id("A"), None, DepTimeKind::Missing, false);
        cache.touch(&id("D"), None, DepTimeKind::Missing, false);

        assert_eq!(cache.len(), 3);
        assert!(cache.get(&id("A")).is_some());
        assert!(cache.get(&id("B")).is_none());
        assert!(cache.get(&id("C")).is_some());
        assert!(cache.get(&id("D")).is_some());
    }

    #[test]
    fn size_stays_bounded_under_churn() {
        let mut cache = RecentSegmentCache::new(5);
        for i in 0..100 {
            cache.touch(&id(&format!("R{i}")), None, DepTimeKind::Missing, false);
        }
        assert_eq!(cache.len(), 5);
        // The survivors are exactly the five most recent.
        for i in 95..100 {
            assert!(cache.get(&id(&format!("R{i}"))).is_some());
        }
    }
}
