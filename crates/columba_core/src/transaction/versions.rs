//! Pin counting for snapshots.
//!
//! Snapshots themselves are reference counted, so memory is released as
//! soon as nothing holds them. The registry tracks which versions are
//! still observable so that callers can see how far behind readers are.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::stats::DatabaseStats;
use crate::types::VersionId;

#[derive(Debug)]
struct Pins {
    current: VersionId,
    counts: BTreeMap<VersionId, usize>,
}

/// Counts pins per version.
#[derive(Debug)]
pub(crate) struct VersionRegistry {
    pins: Mutex<Pins>,
    stats: Arc<DatabaseStats>,
}

impl VersionRegistry {
    pub(crate) fn new(current: VersionId, stats: Arc<DatabaseStats>) -> Self {
        Self {
            pins: Mutex::new(Pins {
                current,
                counts: BTreeMap::new(),
            }),
            stats,
        }
    }

    pub(crate) fn pin(self: &Arc<Self>, version: VersionId) -> VersionPin {
        *self.pins.lock().counts.entry(version).or_insert(0) += 1;
        VersionPin {
            registry: Arc::clone(self),
            version,
        }
    }

    fn unpin(&self, version: VersionId) {
        let mut pins = self.pins.lock();
        let Some(count) = pins.counts.get_mut(&version) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            pins.counts.remove(&version);
            if version != pins.current {
                self.reclaimed(version);
            }
        }
    }

    /// Marks `version` as the newest committed one.
    pub(crate) fn set_current(&self, version: VersionId) {
        let mut pins = self.pins.lock();
        let previous = std::mem::replace(&mut pins.current, version);
        if previous != version && !pins.counts.contains_key(&previous) {
            self.reclaimed(previous);
        }
    }

    fn reclaimed(&self, version: VersionId) {
        trace!(%version, "snapshot released");
        self.stats.record_reclaim(1);
    }

    /// Versions still observable: the current one plus every pinned one.
    pub(crate) fn live_versions(&self) -> Vec<VersionId> {
        let pins = self.pins.lock();
        let mut live: Vec<_> = pins.counts.keys().copied().collect();
        if !pins.counts.contains_key(&pins.current) {
            live.push(pins.current);
        }
        live.sort_unstable();
        live
    }

    /// Oldest version some transaction is pinned to.
    pub(crate) fn oldest_pinned(&self) -> Option<VersionId> {
        self.pins.lock().counts.keys().next().copied()
    }

    #[cfg(test)]
    fn pin_count(&self, version: VersionId) -> usize {
        self.pins.lock().counts.get(&version).copied().unwrap_or(0)
    }
}

/// Keeps one version pinned until dropped.
#[derive(Debug)]
pub(crate) struct VersionPin {
    registry: Arc<VersionRegistry>,
    version: VersionId,
}

impl VersionPin {
    pub(crate) const fn version(&self) -> VersionId {
        self.version
    }

    /// Moves the pin to another version.
    pub(crate) fn repin(&mut self, version: VersionId) {
        if version == self.version {
            return;
        }
        let next = self.registry.pin(version);
        *self = next;
    }
}

impl Drop for VersionPin {
    fn drop(&mut self) {
        self.registry.unpin(self.version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<VersionRegistry> {
        Arc::new(VersionRegistry::new(
            VersionId::INITIAL,
            Arc::new(DatabaseStats::new()),
        ))
    }

    #[test]
    fn pins_are_counted() {
        let reg = registry();
        let a = reg.pin(VersionId::new(0));
        let b = reg.pin(VersionId::new(0));
        assert_eq!(reg.pin_count(VersionId::new(0)), 2);
        drop(a);
        assert_eq!(reg.pin_count(VersionId::new(0)), 1);
        drop(b);
        assert_eq!(reg.pin_count(VersionId::new(0)), 0);
    }

    #[test]
    fn unpinned_old_version_is_reclaimed() {
        let reg = registry();
        let pin = reg.pin(VersionId::new(0));
        reg.set_current(VersionId::new(1));
        assert_eq!(
            reg.live_versions(),
            vec![VersionId::new(0), VersionId::new(1)]
        );
        assert_eq!(reg.oldest_pinned(), Some(VersionId::new(0)));

        drop(pin);
        assert_eq!(reg.live_versions(), vec![VersionId::new(1)]);
        assert_eq!(reg.oldest_pinned(), None);
        assert_eq!(reg.stats.versions_reclaimed(), 1);
    }

    #[test]
    fn current_version_is_not_reclaimed_on_unpin() {
        let reg = registry();
        drop(reg.pin(VersionId::new(0)));
        assert_eq!(reg.stats.versions_reclaimed(), 0);
        reg.set_current(VersionId::new(1));
        assert_eq!(reg.stats.versions_reclaimed(), 1);
    }

    #[test]
    fn repin_moves_the_count() {
        let reg = registry();
        let mut pin = reg.pin(VersionId::new(0));
        reg.set_current(VersionId::new(1));
        pin.repin(VersionId::new(1));
        assert_eq!(pin.version(), VersionId::new(1));
        assert_eq!(reg.pin_count(VersionId::new(0)), 0);
        assert_eq!(reg.pin_count(VersionId::new(1)), 1);
    }
}
