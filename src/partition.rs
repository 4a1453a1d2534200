//! The slot container used for both levels of a dataset's data.
//!
//! A [`PartitionList`] is an indexable sequence of optional slots behind its own
//! mutex. A dataset node keeps one as its *outer* list (slot `i` holds the items
//! of partition `i`), and every partition's items live in an *inner* list that a
//! single task fills by appending.
//!
//! An empty slot is a tombstone: either a partition that has not been installed
//! yet, or an item a filter rejected. Readers skip tombstones.
//!
//! Capacity only grows. Growing doubles (for appends) or extends to an explicit
//! size (for [`grow`](PartitionList::grow)); slots that already exist keep their
//! index and contents.

use crate::error::ContainerError;
use crate::utils::lock;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Write-once, append-capable, lock-protected slot sequence.
#[derive(Debug)]
pub struct PartitionList<T> {
    inner: Mutex<Slots<T>>,
}

#[derive(Debug)]
struct Slots<T> {
    slots: Vec<Option<T>>,
    /// Number of filled slots.
    size: usize,
    /// Next slot `append` writes to.
    cursor: usize,
}

impl<T> Slots<T> {
    fn extend_to(&mut self, new_capacity: usize) {
        self.slots.resize_with(new_capacity, || None);
    }

    fn reserve_for_append(&mut self) {
        if self.cursor >= self.slots.len() {
            let doubled = (self.slots.len() * 2).max(1);
            self.extend_to(doubled);
        }
    }
}

impl<T> PartitionList<T> {
    /// Create a list with `capacity` empty slots.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        let mut slots = Vec::with_capacity(capacity.get());
        slots.resize_with(capacity.get(), || None);
        Self {
            inner: Mutex::new(Slots {
                slots,
                size: 0,
                cursor: 0,
            }),
        }
    }

    /// Checked constructor for callers holding a plain `usize`.
    ///
    /// # Errors
    ///
    /// [`ContainerError::InvalidCapacity`] when `capacity` is zero.
    pub fn create(capacity: usize) -> Result<Self, ContainerError> {
        NonZeroUsize::new(capacity)
            .map(Self::new)
            .ok_or(ContainerError::InvalidCapacity(capacity))
    }

    /// Extend the list to `new_capacity` slots.
    ///
    /// # Errors
    ///
    /// [`ContainerError::CapacityNotIncreased`] unless `new_capacity` exceeds the current capacity.
    pub fn grow(&self, new_capacity: usize) -> Result<(), ContainerError> {
        let mut g = lock(&self.inner);
        let current = g.slots.len();
        if new_capacity <= current {
            return Err(ContainerError::CapacityNotIncreased {
                current,
                requested: new_capacity,
            });
        }
        g.extend_to(new_capacity);
        Ok(())
    }

    /// Write `item` at the append cursor, doubling capacity first if the list is full.
    pub fn append(&self, item: T) {
        let mut g = lock(&self.inner);
        g.reserve_for_append();
        let at = g.cursor;
        g.slots[at] = Some(item);
        g.size += 1;
        g.cursor += 1;
    }

    /// Advance the append cursor past an empty slot, leaving a tombstone in place.
    pub fn append_tombstone(&self) {
        let mut g = lock(&self.inner);
        g.reserve_for_append();
        g.cursor += 1;
    }

    /// Install `item` at a fixed `index`.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::IndexOutOfRange`] when `index >= capacity`
    /// - [`ContainerError::SlotOccupied`] when the slot already holds a value
    pub fn set_at(&self, index: usize, item: T) -> Result<(), ContainerError> {
        let mut g = lock(&self.inner);
        let capacity = g.slots.len();
        let slot = g
            .slots
            .get_mut(index)
            .ok_or(ContainerError::IndexOutOfRange { index, capacity })?;
        if slot.is_some() {
            return Err(ContainerError::SlotOccupied(index));
        }
        *slot = Some(item);
        g.size += 1;
        Ok(())
    }

    /// Number of filled slots.
    #[must_use]
    pub fn size(&self) -> usize {
        lock(&self.inner).size
    }

    /// Number of slots, filled or not.
    #[must_use]
    pub fn capacity(&self) -> usize {
        lock(&self.inner).slots.len()
    }

    /// Whether slot `index` exists and holds a value.
    #[must_use]
    pub fn is_filled(&self, index: usize) -> bool {
        lock(&self.inner)
            .slots
            .get(index)
            .is_some_and(Option::is_some)
    }
}

impl<T: Clone> PartitionList<T> {
    /// Read slot `index`. `Ok(None)` is a tombstone.
    ///
    /// # Errors
    ///
    /// [`ContainerError::IndexOutOfRange`] when `index >= capacity`.
    pub fn get_at(&self, index: usize) -> Result<Option<T>, ContainerError> {
        let g = lock(&self.inner);
        g.slots
            .get(index)
            .cloned()
            .ok_or(ContainerError::IndexOutOfRange {
                index,
                capacity: g.slots.len(),
            })
    }

    /// Clone of every filled slot, in index order.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        lock(&self.inner).slots.iter().flatten().cloned().collect()
    }

    /// Clone of every slot written so far by `append`, tombstones included.
    #[must_use]
    pub fn appended_slots(&self) -> Vec<Option<T>> {
        let g = lock(&self.inner);
        g.slots[..g.cursor].to_vec()
    }
}
