//! Multi-level feedback queue
//!
//! Three FIFO bands (Hot > Normal > Cold) cut from the priority range by
//! `band_limits`. Selection ages every waiter, migrates threads whose
//! priority left their band to the back of the matching band, then pops
//! the head of the most urgent non-empty band.

use super::QueuePolicy;
use crate::scheduler::thread::{ThreadId, ThreadTable};
use crate::scheduler::Priority;
use crate::time::Ticks;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

/// Priority band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Band {
    /// `priority <= limits[0]`
    Hot = 0,
    /// `limits[0] < priority <= limits[1]`
    Normal = 1,
    /// `priority > limits[1]`
    Cold = 2,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Hot, Band::Normal, Band::Cold];

    /// Band holding `priority`
    pub fn classify(priority: Priority, limits: [Priority; 2]) -> Self {
        if priority <= limits[0] {
            Band::Hot
        } else if priority <= limits[1] {
            Band::Normal
        } else {
            Band::Cold
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

pub struct MultiLevelQueue {
    bands: [VecDeque<ThreadId>; 3],
    limits: [Priority; 2],
}

impl MultiLevelQueue {
    pub fn new(limits: [Priority; 2], capacity: usize) -> Self {
        Self {
            bands: [
                VecDeque::with_capacity(capacity),
                VecDeque::new(),
                VecDeque::new(),
            ],
            limits,
        }
    }

    /// Band currently holding `id`
    pub fn band_of(&self, id: ThreadId) -> Option<Band> {
        Band::ALL
            .into_iter()
            .find(|band| self.bands[band.index()].contains(&id))
    }

    /// Waiters per band
    pub fn lengths(&self) -> (usize, usize, usize) {
        (self.bands[0].len(), self.bands[1].len(), self.bands[2].len())
    }

    /// Move every thread whose priority left its band to the back of the
    /// matching one
    fn migrate(&mut self, threads: &ThreadTable) {
        let limits = self.limits;
        let mut movers: Vec<(ThreadId, Band)> = Vec::new();

        for band in Band::ALL {
            self.bands[band.index()].retain(|&id| {
                let target = Band::classify(threads.effective_priority(id), limits);
                if target == band {
                    true
                } else {
                    movers.push((id, target));
                    false
                }
            });
        }

        for (id, target) in movers {
            log::trace!("mlfq: thread {} -> {:?}", id, target);
            self.bands[target.index()].push_back(id);
        }
    }
}

impl QueuePolicy for MultiLevelQueue {
    fn admit(&mut self, id: ThreadId, threads: &ThreadTable) {
        if self.contains(id) {
            self.reposition(id, threads);
            return;
        }
        let band = Band::classify(threads.effective_priority(id), self.limits);
        self.bands[band.index()].push_back(id);
    }

    fn select_next(&mut self, threads: &mut ThreadTable, now: Ticks) -> Option<ThreadId> {
        let mut changed = false;
        for id in self.waiters() {
            changed |= threads.age_down(id, now);
        }
        if changed {
            self.migrate(threads);
        }
        self.bands.iter_mut().find_map(|band| band.pop_front())
    }

    fn reposition(&mut self, id: ThreadId, threads: &ThreadTable) {
        let Some(current) = self.band_of(id) else {
            return;
        };
        let target = Band::classify(threads.effective_priority(id), self.limits);
        if target != current {
            self.bands[current.index()].retain(|&other| other != id);
            self.bands[target.index()].push_back(id);
        }
    }

    fn remove(&mut self, id: ThreadId) -> bool {
        let before = self.len();
        for band in self.bands.iter_mut() {
            band.retain(|&other| other != id);
        }
        self.len() != before
    }

    fn len(&self) -> usize {
        self.bands.iter().map(VecDeque::len).sum()
    }

    fn contains(&self, id: ThreadId) -> bool {
        self.bands.iter().any(|band| band.contains(&id))
    }

    fn waiters(&self) -> Vec<ThreadId> {
        self.bands.iter().flatten().copied().collect()
    }
}
