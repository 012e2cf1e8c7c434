//! Tick-indexed hash registry of armed timers.
//!
//! Bucket `i` holds every running slot whose match tick satisfies
//! `match_tick % bucket_count == i`. Each tick the timer task visits only the
//! bucket of the current tick; colliding timers are told apart by an exact
//! remaining-ticks check during the scan.
//!
//! The registry also owns the [`TickCounter`]. The counter is advanced and
//! read for arming under the same lock, so a timer armed concurrently with a
//! tick is never placed in a bucket that was already scanned for its due tick.

use parking_lot::Mutex;

use crate::error::{TimerError, TimerResult};
use crate::tick::TickCounter;

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<u32>,
    next: Option<u32>,
    bucket: Option<u32>,
}

struct Buckets {
    heads: Box<[Option<u32>]>,
    counts: Box<[usize]>,
    links: Box<[Link]>,
}

impl Buckets {
    fn push_front(&mut self, index: u32, bucket: u32) {
        let b = bucket as usize;
        let old_head = self.heads.get(b).copied().flatten();
        if let Some(head) = old_head
            && let Some(link) = self.links.get_mut(head as usize)
        {
            link.prev = Some(index);
        }
        if let Some(link) = self.links.get_mut(index as usize) {
            *link = Link {
                prev: None,
                next: old_head,
                bucket: Some(bucket),
            };
        }
        if let Some(head) = self.heads.get_mut(b) {
            *head = Some(index);
        }
        if let Some(count) = self.counts.get_mut(b) {
            *count += 1;
        }
    }

    fn unlink(&mut self, index: u32) -> bool {
        let Some(link) = self.links.get(index as usize).copied() else {
            return false;
        };
        let Some(bucket) = link.bucket else {
            return false;
        };
        match link.prev {
            Some(prev) => {
                if let Some(prev_link) = self.links.get_mut(prev as usize) {
                    prev_link.next = link.next;
                }
            }
            None => {
                if let Some(head) = self.heads.get_mut(bucket as usize) {
                    *head = link.next;
                }
            }
        }
        if let Some(next) = link.next
            && let Some(next_link) = self.links.get_mut(next as usize)
        {
            next_link.prev = link.prev;
        }
        if let Some(slot_link) = self.links.get_mut(index as usize) {
            *slot_link = Link::default();
        }
        if let Some(count) = self.counts.get_mut(bucket as usize) {
            *count = count.saturating_sub(1);
        }
        true
    }

    fn collect(&self, bucket: usize, out: &mut Vec<u32>) {
        let mut cursor = self.heads.get(bucket).copied().flatten();
        while let Some(index) = cursor {
            if out.len() >= self.links.len() {
                break;
            }
            out.push(index);
            cursor = self.links.get(index as usize).and_then(|link| link.next);
        }
    }
}

/// Fixed-size hash table of running timers keyed by match tick.
pub struct TimerRegistry {
    bucket_count: u32,
    ticks: TickCounter,
    inner: Mutex<Buckets>,
}

impl TimerRegistry {
    /// Build a registry with `bucket_count` buckets for `capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns an error if `bucket_count` is zero or too large.
    pub fn new(bucket_count: usize, capacity: usize) -> TimerResult<Self> {
        let Ok(buckets) = u32::try_from(bucket_count) else {
            return Err(TimerError::invalid_configuration(
                "bucket_count exceeds u32::MAX",
            ));
        };
        if buckets == 0 {
            return Err(TimerError::invalid_configuration(
                "bucket_count must be greater than 0",
            ));
        }
        Ok(Self {
            bucket_count: buckets,
            ticks: TickCounter::new(),
            inner: Mutex::new(Buckets {
                heads: vec![None; bucket_count].into_boxed_slice(),
                counts: vec![0; bucket_count].into_boxed_slice(),
                links: vec![Link::default(); capacity].into_boxed_slice(),
            }),
        })
    }

    /// Number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.bucket_count as usize
    }

    /// Bucket a match tick hashes to.
    #[inline]
    #[must_use]
    pub fn bucket_of(&self, tick: u64) -> u32 {
        // Remainder of a division by a u32 always fits a u32.
        u32::try_from(tick % u64::from(self.bucket_count)).unwrap_or(0)
    }

    /// Current tick.
    #[inline]
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.ticks.current()
    }

    /// Link a slot at the head of the bucket for an absolute `match_tick`.
    ///
    /// This is the plain insertion primitive. A linked slot is moved. The
    /// lifecycle layer arms through [`arm`](Self::arm) instead, which reads
    /// the current tick and inserts under one lock acquisition.
    pub fn insert(&self, index: u32, match_tick: u64) {
        let bucket = self.bucket_of(match_tick);
        let mut buckets = self.inner.lock();
        buckets.unlink(index);
        buckets.push_front(index, bucket);
    }

    /// Unlink a slot from its bucket. Returns `false` if it was not linked.
    pub fn remove(&self, index: u32) -> bool {
        self.inner.lock().unlink(index)
    }

    /// Atomically (re-)arm a slot `offset` ticks after the current tick.
    ///
    /// Any previous membership is removed and the new match tick is computed
    /// and inserted inside one critical section. Returns the match tick.
    pub fn arm(&self, index: u32, offset: u32) -> u64 {
        let mut buckets = self.inner.lock();
        buckets.unlink(index);
        let match_tick = self.ticks.current().wrapping_add(u64::from(offset));
        buckets.push_front(index, self.bucket_of(match_tick));
        match_tick
    }

    /// Advance the tick counter and snapshot the bucket of the new tick into
    /// `scratch` (most recently inserted first). Returns the new tick.
    ///
    /// `scratch` is cleared first and reused, so the steady state does not
    /// allocate.
    pub fn advance(&self, scratch: &mut Vec<u32>) -> u64 {
        scratch.clear();
        let buckets = self.inner.lock();
        let tick = self.ticks.advance();
        buckets.collect(self.bucket_of(tick) as usize, scratch);
        tick
    }

    #[cfg(test)]
    fn contains(&self, index: u32) -> bool {
        self.inner
            .lock()
            .links
            .get(index as usize)
            .is_some_and(|link| link.bucket.is_some())
    }

    /// Per-bucket timer counts.
    #[must_use]
    pub fn bucket_counts(&self) -> Vec<usize> {
        self.inner.lock().counts.to_vec()
    }

    /// Total number of armed timers.
    #[must_use]
    pub fn armed(&self) -> usize {
        self.inner.lock().counts.iter().sum()
    }

    /// Walk every bucket and return `(slot, bucket)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Inconsistent`] if a list has a cycle, broken back
    /// links, a member recorded under another bucket, or disagrees with the
    /// bucket count.
    pub fn members(&self) -> TimerResult<Vec<(u32, u32)>> {
        let buckets = self.inner.lock();
        let limit = buckets.links.len();
        let mut members = Vec::new();

        for (b, (head, count)) in buckets.heads.iter().zip(buckets.counts.iter()).enumerate() {
            let bucket = u32::try_from(b).unwrap_or(u32::MAX);
            let mut seen = 0usize;
            let mut prev = None;
            let mut cursor = *head;
            while let Some(index) = cursor {
                if seen >= limit {
                    return Err(TimerError::inconsistent(format!(
                        "bucket {bucket} contains a cycle"
                    )));
                }
                let Some(link) = buckets.links.get(index as usize) else {
                    return Err(TimerError::inconsistent(format!(
                        "bucket {bucket} links slot {index} outside the pool"
                    )));
                };
                if link.bucket != Some(bucket) || link.prev != prev {
                    return Err(TimerError::inconsistent(format!(
                        "slot {index} has broken links in bucket {bucket}"
                    )));
                }
                members.push((index, bucket));
                seen += 1;
                prev = Some(index);
                cursor = link.next;
            }
            if seen != *count {
                return Err(TimerError::inconsistent(format!(
                    "bucket {bucket} count {count} but {seen} slots linked"
                )));
            }
        }

        let linked = buckets.links.iter().filter(|l| l.bucket.is_some()).count();
        if linked != members.len() {
            return Err(TimerError::inconsistent(format!(
                "{linked} slots marked linked but {} reachable",
                members.len()
            )));
        }
        Ok(members)
    }
}

impl std::fmt::Debug for TimerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("bucket_count", &self.bucket_count)
            .field("tick", &self.current_tick())
            .field("armed", &self.armed())
            .finish()
    }
}
