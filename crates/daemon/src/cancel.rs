//! Broadcast cancellation
//!
//! A [`CancelToken`] may be derived from any number of parents and counts as
//! cancelled as soon as one of them is. Cancellation is pushed down to
//! children eagerly, so waiting on a token never walks its ancestry and
//! deep or wide trees cost no recursion.

use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

struct Node {
    state: watch::Sender<bool>,
    children: Mutex<Vec<Weak<Node>>>,
}

impl Node {
    fn new() -> Arc<Self> {
        let (state, _) = watch::channel(false);
        Arc::new(Self {
            state,
            children: Mutex::new(Vec::new()),
        })
    }

    fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }
}

/// Cloneable handle; all clones observe the same cancellation
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Node>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self { inner: Node::new() }
    }

    /// Token cancelled when `self` is, but cancellable on its own
    pub fn child(&self) -> Self {
        Self::any_of([self])
    }

    /// Token cancelled when any parent is cancelled
    pub fn any_of<'a, I>(parents: I) -> Self
    where
        I: IntoIterator<Item = &'a CancelToken>,
    {
        let node = Node::new();

        for parent in parents {
            let mut children = parent.inner.children.lock();
            // Checked under the lock: a concurrent cancel either sees us in
            // the list or we see its flag.
            if parent.inner.is_cancelled() {
                node.state.send_replace(true);
                break;
            }
            children.retain(|child| child.strong_count() > 0);
            children.push(Arc::downgrade(&node));
        }

        Self { inner: node }
    }

    pub fn cancel(&self) {
        let mut pending = vec![Arc::clone(&self.inner)];

        while let Some(node) = pending.pop() {
            if node.state.send_replace(true) {
                continue;
            }
            let children = std::mem::take(&mut *node.children.lock());
            pending.extend(children.iter().filter_map(Weak::upgrade));
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives as long as `self`, so this only ends on `true`.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Cancel the token when the returned guard is dropped
    pub fn drop_guard(self) -> DropGuard {
        DropGuard { token: Some(self) }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cancels its token on drop unless disarmed
#[derive(Debug)]
pub struct DropGuard {
    token: Option<CancelToken>,
}

impl DropGuard {
    pub fn token(&self) -> Option<&CancelToken> {
        self.token.as_ref()
    }

    pub fn disarm(mut self) -> CancelToken {
        self.token.take().unwrap_or_default()
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
