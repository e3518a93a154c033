//! Bulk-free arena: `spec.md` §4.F.
//!
//! This is not a general-purpose allocator. Its only purpose is making a
//! configuration reload a single O(n) drop with no per-object destructor
//! bookkeeping, the same contract as the original `tr_malloc.c`'s
//! `trctx_*` functions. Unlike the teacher's `cfg::alloc::Allocations`
//! (which leaks `Box::into_raw` pointers and frees them unsafely on drop),
//! this keeps the objects as plain owned values in a `Vec<Option<T>>` slot
//! table and relies on ordinary `Drop` — safe, and just as bulk-free in
//! practice since dropping the `Arena` drops every live slot at once.

use log::debug;

/// Bounds a single configuration's complexity. `spec.md` §4.F.
pub const MAX_TRACKED_OBJECTS: usize = 16384;

/// A handle into an `Arena<T>`. Stable across `free`; invalidated by
/// `reclaim_empty_slots`, which `EngineState::load` deliberately never calls
/// — parsing hands out `ArenaId`s into `Layer::rules` as it goes (including
/// across hotkey redefinitions, which free the superseded slot without
/// renumbering the rest), so no point in the load path has "no live handle
/// issued so far" to make compaction safe. Exposed for a caller with its own
/// arena lifecycle that can actually guarantee that.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArenaId(usize);

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("too many objects allocated within this configuration (max {MAX_TRACKED_OBJECTS}); this might indicate a config that is too large")]
pub struct ArenaFullError;

/// Single bulk-free allocation region. All parsed objects of one kind (e.g.
/// every `Hotkey` in a configuration) live in one `Arena`.
#[derive(Debug, Default)]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of live (non-freed) slots.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Track a new object, failing once `MAX_TRACKED_OBJECTS` live slots
    /// would be exceeded. This is the one fatal condition in `spec.md`'s
    /// error policy (§7: "Allocation cap exceeded -> fatal").
    pub fn alloc(&mut self, value: T) -> Result<ArenaId, ArenaFullError> {
        if self.live_count() >= MAX_TRACKED_OBJECTS {
            return Err(ArenaFullError);
        }
        self.slots.push(Some(value));
        Ok(ArenaId(self.slots.len() - 1))
    }

    pub fn get(&self, id: ArenaId) -> Option<&T> {
        self.slots.get(id.0).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: ArenaId) -> Option<&mut T> {
        self.slots.get_mut(id.0).and_then(|s| s.as_mut())
    }

    /// Mark a slot free. The object is dropped immediately; the slot index
    /// stays reserved (and thus `ArenaId`s elsewhere stay valid) until
    /// `reclaim_empty_slots` compacts them.
    pub fn free(&mut self, id: ArenaId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            *slot = None;
        }
    }

    /// Compact away freed slots. Only safe to call once nothing still holds
    /// an `ArenaId` issued before the call — in practice, right after a
    /// successful parse, before the arena starts serving dispatches.
    pub fn reclaim_empty_slots(&mut self) {
        let before = self.slots.len();
        self.slots.retain(Option::is_some);
        debug!("reclaimed {} empty slot(s)", before - self.slots.len());
    }

    /// Drop every live slot, in O(n). Returns how many were live.
    pub fn free_everything(&mut self) -> usize {
        let freed = self.live_count();
        self.slots.clear();
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_get_roundtrip() {
        let mut arena = Arena::new();
        let id = arena.alloc("hello".to_string()).unwrap();
        assert_eq!(arena.get(id).unwrap(), "hello");
    }

    #[test]
    fn free_drops_value_but_keeps_slot_reserved() {
        let mut arena: Arena<String> = Arena::new();
        let a = arena.alloc("a".into()).unwrap();
        let b = arena.alloc("b".into()).unwrap();
        arena.free(a);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b).unwrap(), "b");
        assert_eq!(arena.live_count(), 1);
    }

    #[test]
    fn reclaim_compacts_and_free_everything_clears() {
        let mut arena: Arena<u32> = Arena::new();
        let ids: Vec<_> = (0..5).map(|i| arena.alloc(i).unwrap()).collect();
        arena.free(ids[1]);
        arena.free(ids[3]);
        arena.reclaim_empty_slots();
        assert_eq!(arena.live_count(), 3);
        let freed = arena.free_everything();
        assert_eq!(freed, 3);
        assert_eq!(arena.live_count(), 0);
    }

    #[test]
    fn cap_exceeded_is_an_error_not_a_panic() {
        let mut arena: Arena<u8> = Arena::new();
        for _ in 0..MAX_TRACKED_OBJECTS {
            arena.alloc(0).unwrap();
        }
        assert!(arena.alloc(0).is_err());
    }
}
