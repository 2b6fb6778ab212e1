//! # Slot Pool
//!
//! Growable slot storage with a free list and generation counters.
//!
//! Freed slots are reused, so a plain index could silently point at a
//! different occupant later. Every handle therefore carries the generation
//! of the slot at allocation time; a stale handle misses instead of aliasing.

/// Handle to an occupied slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    /// Index into the pool.
    index: u32,
    /// Generation of the slot when the handle was issued.
    generation: u32,
}

impl SlotHandle {
    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A pool of reusable slots.
///
/// # Thread Safety
///
/// The pool is NOT thread-safe. It is only touched by the committing thread.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: SlotPool<&str> = SlotPool::with_capacity(16);
///
/// let handle = pool.allocate("camera");
/// pool.free(handle);
///
/// // The slot is reused, but the old handle no longer resolves.
/// let again = pool.allocate("light");
/// assert!(pool.get(handle).is_none());
/// ```
pub struct SlotPool<T> {
    slots: Vec<Slot<T>>,
    /// Indices of free slots, most recently freed last.
    free_list: Vec<u32>,
    /// Number of occupied slots.
    allocated_count: usize,
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<T> SlotPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pool with room for `capacity` slots before growing.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of slots to reserve up front
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            allocated_count: 0,
        }
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Returns the number of free slots awaiting reuse.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Returns true if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.allocated_count == 0
    }

    /// Stores a value, reusing a free slot when one exists.
    ///
    /// # Arguments
    ///
    /// * `value` - The object to store
    ///
    /// # Returns
    ///
    /// A handle to the stored object.
    pub fn allocate(&mut self, value: T) -> SlotHandle {
        self.allocated_count += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return SlotHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        SlotHandle {
            index,
            generation: 0,
        }
    }

    /// Frees an occupied slot.
    ///
    /// # Arguments
    ///
    /// * `handle` - The handle to free
    ///
    /// # Returns
    ///
    /// The freed object, or None if the handle was stale or invalid.
    pub fn free(&mut self, handle: SlotHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.allocated_count -= 1;

        Some(value)
    }

    /// Gets a reference to an occupied slot.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Gets a mutable reference to an occupied slot.
    #[inline]
    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Returns true if the handle still resolves.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: SlotHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Removes every value, invalidating all outstanding handles.
    ///
    /// Memory is kept for reuse.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free_list.push(u32::try_from(index).unwrap_or(u32::MAX));
        }
        self.allocated_count = 0;
    }

    /// Iterates over occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|v| {
                (
                    SlotHandle {
                        index: u32::try_from(index).unwrap_or(u32::MAX),
                        generation: slot.generation,
                    },
                    v,
                )
            })
        })
    }

    /// Iterates mutably over occupied slots in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotHandle, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value.as_mut().map(|v| {
                (
                    SlotHandle {
                        index: u32::try_from(index).unwrap_or(u32::MAX),
                        generation,
                    },
                    v,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_allocate_free() {
        let mut pool: SlotPool<u32> = SlotPool::with_capacity(4);

        let h1 = pool.allocate(42);
        assert_eq!(pool.get(h1), Some(&42));
        assert_eq!(pool.allocated_count(), 1);

        assert_eq!(pool.free(h1), Some(42));
        assert_eq!(pool.allocated_count(), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_pool_reuse_bumps_generation() {
        let mut pool: SlotPool<u32> = SlotPool::new();

        let h1 = pool.allocate(1);
        pool.free(h1);

        let h2 = pool.allocate(2);
        assert_eq!(h1.index(), h2.index());
        assert_ne!(h1.generation(), h2.generation());
        assert!(pool.get(h1).is_none());
        assert!(pool.free(h1).is_none());
        assert_eq!(pool.get(h2), Some(&2));
    }

    #[test]
    fn test_pool_grows() {
        let mut pool: SlotPool<usize> = SlotPool::with_capacity(1);
        let handles: Vec<_> = (0..100).map(|i| pool.allocate(i)).collect();

        assert_eq!(pool.allocated_count(), 100);
        for (i, h) in handles.iter().enumerate() {
            assert_eq!(pool.get(*h), Some(&i));
        }
    }

    #[test]
    fn test_pool_clear_invalidates_handles() {
        let mut pool: SlotPool<u8> = SlotPool::new();
        let a = pool.allocate(1);
        let b = pool.allocate(2);

        pool.clear();
        assert!(pool.get(a).is_none());
        assert!(pool.get(b).is_none());
        assert_eq!(pool.free_count(), 2);

        let c = pool.allocate(3);
        assert_eq!(c.index(), 0);
        assert_eq!(pool.iter().count(), 1);
    }
}
