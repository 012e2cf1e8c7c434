//! Fixed-capacity pool of timer slots.
//!
//! The pool hands out slot indices from an index-linked free list. Capacity is
//! fixed when the pool is built and never grows. The pool lock is independent
//! of the registry lock, so allocation and release never contend with expiry
//! scanning.

use parking_lot::Mutex;

use crate::error::{TimerError, TimerResult};

/// Returned by [`TimerPool::allocate`] when no slot is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolExhausted;

impl From<PoolExhausted> for TimerError {
    fn from(_: PoolExhausted) -> Self {
        TimerError::NonAvailable
    }
}

struct FreeList {
    head: Option<u32>,
    next: Box<[Option<u32>]>,
    in_use: Box<[bool]>,
    free: usize,
}

/// Free-list allocator for timer slots.
pub struct TimerPool {
    capacity: usize,
    inner: Mutex<FreeList>,
}

impl TimerPool {
    /// Build a pool of `capacity` slots, all free. Slot `0` is handed out first.
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` is zero or does not fit a slot index.
    pub fn new(capacity: usize) -> TimerResult<Self> {
        let Ok(last) = u32::try_from(capacity) else {
            return Err(TimerError::invalid_configuration(
                "pool_capacity exceeds the addressable slot range",
            ));
        };
        if capacity == 0 || last == u32::MAX {
            return Err(TimerError::invalid_configuration(
                "pool_capacity must be between 1 and u32::MAX - 1",
            ));
        }

        let next: Box<[Option<u32>]> = (1..=last)
            .map(|i| if i < last { Some(i) } else { None })
            .collect();

        Ok(Self {
            capacity,
            inner: Mutex::new(FreeList {
                head: Some(0),
                next,
                in_use: vec![false; capacity].into_boxed_slice(),
                free: capacity,
            }),
        })
    }

    /// Pop the free-list head. The caller owns the slot until it is released.
    ///
    /// # Errors
    ///
    /// Returns [`PoolExhausted`] when every slot is in use.
    pub fn allocate(&self) -> Result<u32, PoolExhausted> {
        let mut list = self.inner.lock();
        let Some(index) = list.head else {
            return Err(PoolExhausted);
        };
        let slot = index as usize;
        list.head = list.next.get(slot).copied().flatten();
        if let Some(next) = list.next.get_mut(slot) {
            *next = None;
        }
        if let Some(used) = list.in_use.get_mut(slot) {
            *used = true;
        }
        list.free = list.free.saturating_sub(1);
        Ok(index)
    }

    /// Push a slot back at the free-list head.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Inconsistent`] if the slot is out of range or
    /// already free; the free list is left untouched.
    pub fn release(&self, index: u32) -> TimerResult<()> {
        let mut list = self.inner.lock();
        let slot = index as usize;
        match list.in_use.get_mut(slot) {
            Some(used) if *used => *used = false,
            Some(_) => {
                return Err(TimerError::inconsistent(format!(
                    "slot {index} released while already free"
                )));
            }
            None => {
                return Err(TimerError::inconsistent(format!(
                    "slot {index} is outside the pool"
                )));
            }
        }
        let head = list.head;
        if let Some(next) = list.next.get_mut(slot) {
            *next = head;
        }
        list.head = Some(index);
        list.free += 1;
        Ok(())
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free slots.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.lock().free
    }

    /// Number of allocated slots.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    /// Walk the free list and return its members in list order.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Inconsistent`] if the list has a cycle, links an
    /// allocated slot, or disagrees with the free count.
    pub fn free_slots(&self) -> TimerResult<Vec<u32>> {
        let list = self.inner.lock();
        let mut members = Vec::with_capacity(list.free);
        let mut cursor = list.head;
        while let Some(index) = cursor {
            if members.len() >= self.capacity {
                return Err(TimerError::inconsistent("free list contains a cycle"));
            }
            let slot = index as usize;
            if list.in_use.get(slot).copied().unwrap_or(true) {
                return Err(TimerError::inconsistent(format!(
                    "allocated slot {index} linked in the free list"
                )));
            }
            members.push(index);
            cursor = list.next.get(slot).copied().flatten();
        }
        if members.len() != list.free {
            return Err(TimerError::inconsistent(format!(
                "free count {} but {} slots linked",
                list.free,
                members.len()
            )));
        }
        Ok(members)
    }
}

impl std::fmt::Debug for TimerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerPool")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}
