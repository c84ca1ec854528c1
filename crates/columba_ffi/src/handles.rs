//! Generation-checked handle arena.
//!
//! A handle packs a 31-bit generation above a 32-bit slot index, so every
//! issued handle is a positive `i64`. Releasing a slot bumps its
//! generation; any copy of the old handle then misses.

const INDEX_BITS: u32 = 32;
const INDEX_MASK: i64 = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: u32 = 0x7FFF_FFFF;

/// Opaque handle to a value in a [`HandleArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(i64);

impl Handle {
    fn pack(generation: u32, index: u32) -> Self {
        Self((i64::from(generation) << INDEX_BITS) | i64::from(index))
    }

    /// Rebuilds a handle from its raw form.
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw value passed across the boundary.
    pub const fn raw(self) -> i64 {
        self.0
    }

    fn index(self) -> Option<usize> {
        if self.0 <= 0 {
            return None;
        }
        usize::try_from(self.0 & INDEX_MASK).ok()
    }

    fn generation(self) -> u32 {
        ((self.0 >> INDEX_BITS) as u32) & GENERATION_MASK
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slab of values addressed by generation-checked handles.
#[derive(Debug)]
pub struct HandleArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for HandleArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleArena<T> {
    /// Creates an empty arena.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns its handle.
    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle::pack(slot.generation, index);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            value: Some(value),
        });
        Handle::pack(1, index)
    }

    /// The value behind `handle`, if it is still live.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index()?)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Mutable access to the value behind `handle`.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index()?)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Releases `handle`, returning its value.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let index = handle.index()?;
        let slot = self.slots.get_mut(index)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        // generation 0 is skipped so a zeroed handle never matches
        slot.generation = match (slot.generation + 1) & GENERATION_MASK {
            0 => 1,
            g => g,
        };
        self.free.push(index as u32);
        self.len -= 1;
        Some(value)
    }

    /// Whether `handle` is live.
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no values are live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Releases every value for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        let stale: Vec<Handle> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match &slot.value {
                Some(value) if !keep(value) => Some(Handle::pack(slot.generation, index as u32)),
                _ => None,
            })
            .collect();
        for handle in stale {
            self.remove(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_positive_and_distinct() {
        let mut arena = HandleArena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert!(a.raw() > 0);
        assert_ne!(a, b);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn released_handle_goes_stale() {
        let mut arena = HandleArena::new();
        let a = arena.insert(1);
        assert_eq!(arena.remove(a), Some(1));
        assert!(arena.get(a).is_none());
        assert!(arena.remove(a).is_none());

        // the slot is reused under a new generation
        let b = arena.insert(2);
        assert_ne!(a, b);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b), Some(&2));
    }

    #[test]
    fn junk_handles_miss() {
        let mut arena = HandleArena::new();
        arena.insert(1);
        for raw in [0, -1, i64::MIN, i64::MAX, 1, 1 << 40] {
            assert!(arena.get(Handle::from_raw(raw)).is_none(), "{raw}");
        }
    }

    #[test]
    fn get_mut_and_retain() {
        let mut arena = HandleArena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);
        *arena.get_mut(a).unwrap() += 10;
        arena.retain(|v| *v > 5);
        assert_eq!(arena.get(a), Some(&11));
        assert!(!arena.contains(b));
        assert_eq!(arena.len(), 1);
    }
}
