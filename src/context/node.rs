use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::Waker;

use slab::Slab;

use crate::Error;

/// The cancel-once core shared by a context and everything derived from it.
///
/// Waiters and children live in slabs so that registrations can be removed
/// in O(1) when a `Done` future or a child context goes away. Cancelling
/// takes both slabs out under the lock and notifies them after releasing it.
#[derive(Debug, Default)]
pub(crate) struct Node {
    done: AtomicBool,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    cause: Option<Error>,
    waiters: Slab<Waker>,
    children: Slab<Weak<Node>>,
}

impl Node {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[inline]
    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub(crate) fn cause(&self) -> Option<Error> {
        if !self.is_done() {
            return None;
        }
        self.state.lock().unwrap().cause.clone()
    }

    /// Links `child` so that it is cancelled together with `self`.
    ///
    /// Returns the registration key, or `None` if `self` was already done, in
    /// which case `child` has been cancelled with the same cause.
    pub(crate) fn attach(&self, child: &Arc<Node>) -> Option<usize> {
        let mut state = self.state.lock().unwrap();
        match state.cause.clone() {
            Some(cause) => {
                drop(state);
                child.cancel(cause);
                None
            }
            None => Some(state.children.insert(Arc::downgrade(child))),
        }
    }

    pub(crate) fn detach(&self, key: usize) {
        self.state.lock().unwrap().children.try_remove(key);
    }

    /// Cancels this node and all of its children with `cause`.
    ///
    /// Returns `false` if the node was already cancelled; the first cause wins.
    pub(crate) fn cancel(&self, cause: Error) -> bool {
        let (waiters, children) = {
            let mut state = self.state.lock().unwrap();
            if state.cause.is_some() {
                return false;
            }
            state.cause = Some(cause.clone());
            self.done.store(true, Ordering::Release);
            (
                mem::take(&mut state.waiters),
                mem::take(&mut state.children),
            )
        };

        for (_, waker) in waiters {
            waker.wake();
        }
        for (_, child) in children {
            if let Some(child) = child.upgrade() {
                child.cancel(cause.clone());
            }
        }
        true
    }

    /// Returns `true` if the node is done, otherwise stores `waker` to be
    /// woken on cancellation. `key` tracks the waiter's slot across polls.
    pub(crate) fn poll_done(&self, key: &mut Option<usize>, waker: &Waker) -> bool {
        if self.is_done() {
            return true;
        }

        let mut state = self.state.lock().unwrap();
        if state.cause.is_some() {
            return true;
        }
        match key.and_then(|k| state.waiters.get_mut(k)) {
            Some(existing) => {
                if !existing.will_wake(waker) {
                    existing.clone_from(waker);
                }
            }
            None => *key = Some(state.waiters.insert(waker.clone())),
        }
        false
    }

    pub(crate) fn unregister(&self, key: usize) {
        self.state.lock().unwrap().waiters.try_remove(key);
    }

    #[cfg(test)]
    pub(crate) fn child_count(&self) -> usize {
        self.state.lock().unwrap().children.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_cause_wins() {
        let node = Node::new();
        assert!(node.cause().is_none());
        assert!(node.cancel(Error::OutputClosed { name: "a".into() }));
        assert!(!node.cancel(Error::Canceled));
        assert!(matches!(node.cause(), Some(Error::OutputClosed { .. })));
    }

    #[test]
    fn attach_to_done_parent_cancels_child() {
        let parent = Node::new();
        parent.cancel(Error::Canceled);
        let child = Node::new();
        assert!(parent.attach(&child).is_none());
        assert!(child.is_done());
    }

    #[test]
    fn detached_child_is_not_cancelled() {
        let parent = Node::new();
        let child = Node::new();
        let key = parent.attach(&child).unwrap();
        parent.detach(key);
        parent.cancel(Error::Canceled);
        assert!(!child.is_done());
    }
}
