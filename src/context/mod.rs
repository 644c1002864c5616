//! Hierarchical cancellation and logging scopes.
//!
//! A [`Context`] is a node in a tree. Deriving a child with
//! [`Context::with_cancel`] hands out a [`Canceller`] for the new node;
//! cancelling it cancels every descendant, but never an ancestor.
//!
//! # Examples
//!
//! ```
//! use pipe_concurrency::Context;
//! use futures_lite::future::block_on;
//!
//! let root = Context::background();
//! let (parent, cancel) = root.with_cancel();
//! let (child, _) = parent.with_cancel();
//!
//! cancel.cancel();
//! block_on(child.done());
//! assert!(child.cause().unwrap().is_canceled());
//! assert!(!root.is_done());
//! ```

use core::any::Any;
use core::fmt;
use std::sync::{Arc, Weak};

use smallvec::SmallVec;
use tracing::Span;

use crate::Error;

mod done;
mod node;

pub use done::Done;
use node::Node;

/// A cancellation-and-logging scope shared by a group of tasks.
///
/// Cloning a `Context` is cheap and yields a handle to the same scope.
///
/// A child holds a strong handle to its parent, so values stay reachable
/// through [`Context::value`] for as long as the child lives. Parents only
/// hold weak links to their children, which are removed when the child is
/// dropped; a parent never keeps a child alive.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    node: Arc<Node>,
    parent: Option<Context>,
    /// Registrations of `node` in the child sets of the nodes it listens to.
    links: SmallVec<[(Weak<Node>, usize); 1]>,
    value: Option<Arc<dyn Any + Send + Sync>>,
    span: Span,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for (node, key) in self.links.drain(..) {
            if let Some(node) = node.upgrade() {
                node.detach(key);
            }
        }
    }
}

impl Context {
    /// Returns a root context. It is never cancelled; derive from it.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner {
                node: Node::new(),
                parent: None,
                links: SmallVec::new(),
                value: None,
                span: Span::none(),
            }),
        }
    }

    /// Derives a cancellable child.
    ///
    /// The child is cancelled when the returned [`Canceller`] fires or when
    /// `self` is cancelled, whichever happens first.
    pub fn with_cancel(&self) -> (Context, Canceller) {
        self.with_first_settler(std::iter::empty())
    }

    /// Derives a cancellable child that is also cancelled by whichever of
    /// `peers` is cancelled first.
    ///
    /// This is the join used by the fan-in combinators: each source's context
    /// is a peer of the shared output context, so the first source to settle
    /// collapses the group. The child takes the cause of whichever node
    /// cancels it. Links are released when the child is dropped.
    pub fn with_first_settler<'a, I>(&self, peers: I) -> (Context, Canceller)
    where
        I: IntoIterator<Item = &'a Context>,
    {
        let node = Node::new();
        let mut links = SmallVec::new();
        let mut link = |source: &Context| {
            if let Some(key) = source.node().attach(&node) {
                links.push((Arc::downgrade(source.node()), key));
            }
        };
        link(self);
        for peer in peers {
            link(peer);
        }

        let ctx = Context {
            inner: Arc::new(Inner {
                node,
                parent: Some(self.clone()),
                links,
                value: None,
                span: self.inner.span.clone(),
            }),
        };
        let canceller = Canceller { ctx: ctx.clone() };
        (ctx, canceller)
    }

    /// Derives a child carrying `value`, found again through [`Context::value`].
    ///
    /// The child shares its parent's cancellation state.
    pub fn with_value<T>(&self, value: T) -> Context
    where
        T: Any + Send + Sync,
    {
        self.derive(Some(Arc::new(value)), self.inner.span.clone())
    }

    /// Derives a child that logs inside `span`.
    ///
    /// The child shares its parent's cancellation state.
    pub fn with_span(&self, span: Span) -> Context {
        self.derive(None, span)
    }

    fn derive(&self, value: Option<Arc<dyn Any + Send + Sync>>, span: Span) -> Context {
        Context {
            inner: Arc::new(Inner {
                node: self.inner.node.clone(),
                parent: Some(self.clone()),
                links: SmallVec::new(),
                value,
                span,
            }),
        }
    }

    /// Looks up the closest value of type `T`, walking up through the parents.
    pub fn value<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if let Some(value) = &ctx.inner.value {
                if let Ok(value) = value.clone().downcast::<T>() {
                    return Some(value);
                }
            }
            current = ctx.inner.parent.as_ref();
        }
        None
    }

    /// Returns a future which resolves once this context is cancelled.
    pub fn done(&self) -> Done {
        Done::new(self.clone())
    }

    /// Returns `true` once this context is cancelled.
    pub fn is_done(&self) -> bool {
        self.node().is_done()
    }

    /// Why this context was cancelled. `None` until it is done.
    pub fn cause(&self) -> Option<Error> {
        self.node().cause()
    }

    /// The span this context logs in.
    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    /// Logs an informational message in this context's span.
    pub fn info(&self, msg: impl fmt::Display) {
        tracing::info!(parent: &self.inner.span, "{msg}");
    }

    /// Logs an error in this context's span. Does not cancel anything.
    pub fn error(&self, msg: impl fmt::Display) {
        tracing::error!(parent: &self.inner.span, "{msg}");
    }

    /// Returns `true` if both handles point to the same context.
    pub fn ptr_eq(a: &Context, b: &Context) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn node(&self) -> &Arc<Node> {
        &self.inner.node
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("done", &self.is_done())
            .field("links", &self.inner.links.len())
            .finish_non_exhaustive()
    }
}

/// Cancels the context it was created with.
///
/// Cancelling is idempotent: only the first call records a cause.
#[derive(Debug, Clone)]
pub struct Canceller {
    ctx: Context,
}

impl Canceller {
    /// Cancels with [`Error::Canceled`].
    pub fn cancel(&self) {
        self.cancel_with(Error::Canceled);
    }

    /// Cancels with the given cause.
    pub fn cancel_with(&self, cause: Error) {
        if self.ctx.node().cancel(cause) {
            tracing::trace!(parent: self.ctx.span(), "context cancelled");
        }
    }

    /// Turns this canceller into a guard which cancels when dropped.
    pub fn guard(self) -> CancelGuard {
        CancelGuard {
            canceller: self,
            armed: true,
        }
    }
}

/// Cancels a context when dropped, on every exit path.
///
/// This `struct` is created by [`Canceller::guard`].
#[derive(Debug)]
#[must_use = "the context is cancelled as soon as the guard is dropped"]
pub struct CancelGuard {
    canceller: Canceller,
    armed: bool,
}

impl CancelGuard {
    /// Gives the canceller back without cancelling.
    pub fn disarm(mut self) -> Canceller {
        self.armed = false;
        self.canceller.clone()
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.canceller.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::{self, block_on};

    #[test]
    fn cancel_propagates_down_not_up() {
        let root = Context::background();
        let (parent, cancel_parent) = root.with_cancel();
        let (child, cancel_child) = parent.with_cancel();
        let (grandchild, _) = child.with_cancel();

        cancel_child.cancel();
        assert!(child.is_done());
        assert!(grandchild.is_done());
        assert!(!parent.is_done());

        cancel_parent.cancel();
        assert!(parent.is_done());
        assert!(!root.is_done());
    }

    #[test]
    fn cancel_is_idempotent() {
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel_with(Error::OutputClosed { name: "a".into() });
        cancel.cancel();
        cancel.cancel();
        assert!(matches!(ctx.cause(), Some(Error::OutputClosed { .. })));
    }

    #[test]
    fn cause_is_none_until_done() {
        let (ctx, cancel) = Context::background().with_cancel();
        assert!(ctx.cause().is_none());
        cancel.cancel();
        assert!(ctx.cause().unwrap().is_canceled());
    }

    #[test]
    fn children_inherit_the_cause() {
        let (parent, cancel) = Context::background().with_cancel();
        let (child, _) = parent.with_cancel();
        cancel.cancel_with(Error::OutputClosed { name: "x".into() });
        assert!(matches!(child.cause(), Some(Error::OutputClosed { .. })));
    }

    #[test]
    fn derive_from_cancelled_parent() {
        let (parent, cancel) = Context::background().with_cancel();
        cancel.cancel();
        let (child, _) = parent.with_cancel();
        assert!(child.is_done());
    }

    #[test]
    fn done_wakes_pending_waiter() {
        block_on(async {
            let (ctx, cancel) = Context::background().with_cancel();
            let waiter = ctx.clone();
            future::zip(waiter.done(), async move {
                future::yield_now().await;
                cancel.cancel();
            })
            .await;
            assert!(ctx.is_done());
        })
    }

    #[test]
    fn first_settler_cancels_joined_context() {
        let root = Context::background();
        let (a, cancel_a) = root.with_cancel();
        let (b, _cancel_b) = root.with_cancel();
        let (joined, _) = root.with_first_settler([&a, &b]);

        assert!(!joined.is_done());
        cancel_a.cancel();
        assert!(joined.is_done());
        assert!(!b.is_done());
        assert!(!root.is_done());
    }

    #[test]
    fn dropped_child_unlinks_from_parent() {
        let (parent, cancel) = Context::background().with_cancel();
        let (child, _) = parent.with_cancel();
        assert_eq!(parent.node().child_count(), 1);
        drop(child);
        assert_eq!(parent.node().child_count(), 0);
        cancel.cancel();
    }

    #[test]
    fn value_lookup_walks_up() {
        #[derive(Debug, PartialEq)]
        struct Checkpoint(&'static str);

        let root = Context::background().with_value(Checkpoint("css"));
        let (child, _) = root.with_cancel();
        let child = child.with_value(7u32);

        assert_eq!(*child.value::<Checkpoint>().unwrap(), Checkpoint("css"));
        assert_eq!(*child.value::<u32>().unwrap(), 7);
        assert!(root.value::<u32>().is_none());
    }

    #[test]
    fn value_child_shares_cancellation() {
        let (parent, cancel) = Context::background().with_cancel();
        let child = parent.with_value("label");
        cancel.cancel();
        assert!(child.is_done());
    }

    #[test]
    fn guard_cancels_on_drop() {
        let (ctx, cancel) = Context::background().with_cancel();
        {
            let _guard = cancel.clone().guard();
        }
        assert!(ctx.is_done());

        let (ctx, cancel) = Context::background().with_cancel();
        let _cancel = cancel.guard().disarm();
        assert!(!ctx.is_done());
    }
}
