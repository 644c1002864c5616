use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Wake, Waker};

use fixedbitset::FixedBitSet;

/// Tracks which sources have been woken and should be polled again.
#[derive(Debug)]
pub(crate) struct Readiness {
    ready_count: usize,
    ready: FixedBitSet,
    parent_waker: Option<Waker>,
}

impl Readiness {
    /// Every source starts out ready so that the first poll reaches all of them.
    fn new(len: usize) -> Self {
        let mut ready = FixedBitSet::with_capacity(len);
        ready.insert_range(..);
        Self {
            ready_count: len,
            ready,
            parent_waker: None,
        }
    }

    /// Marks `index` as ready. Returns whether it already was.
    pub(crate) fn set_ready(&mut self, index: usize) -> bool {
        if self.ready.put(index) {
            true
        } else {
            self.ready_count += 1;
            false
        }
    }

    /// Marks `index` as not ready. Returns whether it was ready before.
    pub(crate) fn clear_ready(&mut self, index: usize) -> bool {
        if self.ready[index] {
            self.ready.set(index, false);
            self.ready_count -= 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn any_ready(&self) -> bool {
        self.ready_count > 0
    }

    /// Set the waker of the task polling the combinator. Must be called at
    /// the start of every `poll_next`.
    pub(crate) fn set_waker(&mut self, waker: &Waker) {
        match &mut self.parent_waker {
            Some(prev) => prev.clone_from(waker),
            None => self.parent_waker = Some(waker.clone()),
        }
    }
}

/// Wakes the parent task on behalf of one source, recording which one.
#[derive(Debug)]
struct SourceWaker {
    index: usize,
    readiness: Arc<Mutex<Readiness>>,
}

impl Wake for SourceWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let mut readiness = self.readiness.lock().unwrap();
        if !readiness.set_ready(self.index) {
            if let Some(parent) = &readiness.parent_waker {
                parent.wake_by_ref();
            }
        }
    }
}

/// One waker per source, all sharing a single [`Readiness`] set.
#[derive(Debug)]
pub(crate) struct SourceWakers {
    wakers: Vec<Waker>,
    readiness: Arc<Mutex<Readiness>>,
}

impl SourceWakers {
    pub(crate) fn new(len: usize) -> Self {
        let readiness = Arc::new(Mutex::new(Readiness::new(len)));
        let wakers = (0..len)
            .map(|index| {
                Waker::from(Arc::new(SourceWaker {
                    index,
                    readiness: readiness.clone(),
                }))
            })
            .collect();
        Self { wakers, readiness }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Waker> {
        self.wakers.get(index)
    }

    pub(crate) fn readiness(&self) -> MutexGuard<'_, Readiness> {
        self.readiness.lock().unwrap()
    }
}
