//! Pooling for actions that are not safe for concurrent reuse.

use super::{Action, MatchResult};
use crate::core::Parameters;
use crate::environment::{Environment, Redirector};
use crate::errors::SitemapResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Factory function type for creating action instances.
pub type ActionFactory = Box<dyn Fn() -> Box<dyn Action> + Send + Sync>;

/// A pool of exclusively-used action instances.
pub struct ActionPool {
    type_name: String,
    factory: ActionFactory,
    idle: Mutex<Vec<Box<dyn Action>>>,
    created: AtomicUsize,
    checked_out: AtomicUsize,
}

impl fmt::Debug for ActionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionPool")
            .field("type_name", &self.type_name)
            .field("created", &self.created())
            .field("checked_out", &self.checked_out())
            .finish_non_exhaustive()
    }
}

impl ActionPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(type_name: impl Into<String>, factory: ActionFactory) -> Self {
        Self {
            type_name: type_name.into(),
            factory,
            idle: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            checked_out: AtomicUsize::new(0),
        }
    }

    /// Checks out an instance, creating one if none is idle.
    ///
    /// The instance returns to the pool when the handle is dropped.
    #[must_use]
    pub fn checkout(self: &Arc<Self>) -> PooledAction {
        let idle = self.idle.lock().pop();
        let action = idle.unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::SeqCst);
            (self.factory)()
        });
        self.checked_out.fetch_add(1, Ordering::SeqCst);
        PooledAction {
            pool: self.clone(),
            action,
        }
    }

    fn release(&self, action: Box<dyn Action>) {
        self.checked_out.fetch_sub(1, Ordering::SeqCst);
        self.idle.lock().push(action);
    }

    /// Returns the number of instances ever created.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Returns the number of instances currently checked out.
    #[must_use]
    pub fn checked_out(&self) -> usize {
        self.checked_out.load(Ordering::SeqCst)
    }
}

/// An action checked out of an [`ActionPool`].
pub struct PooledAction {
    pool: Arc<ActionPool>,
    action: Box<dyn Action>,
}

impl Deref for PooledAction {
    type Target = dyn Action;

    fn deref(&self) -> &Self::Target {
        self.action.as_ref()
    }
}

impl Drop for PooledAction {
    fn drop(&mut self) {
        let action = std::mem::replace(&mut self.action, Box::new(Released));
        self.pool.release(action);
    }
}

/// Placeholder left in a handle while its instance goes back to the pool.
struct Released;

#[async_trait]
impl Action for Released {
    async fn act(
        &self,
        _redirector: &Redirector,
        _env: &Environment,
        _source: &str,
        _params: &Parameters,
    ) -> SitemapResult<Option<MatchResult>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Action for Noop {
        async fn act(
            &self,
            _redirector: &Redirector,
            _env: &Environment,
            _source: &str,
            _params: &Parameters,
        ) -> SitemapResult<Option<MatchResult>> {
            Ok(Some(MatchResult::new()))
        }
    }

    #[test]
    fn test_checkout_and_release_reuses_instances() {
        let pool = Arc::new(ActionPool::new("noop", Box::new(|| Box::new(Noop) as Box<dyn Action>)));

        let first = pool.checkout();
        let second = pool.checkout();
        assert_eq!(pool.created(), 2);
        assert_eq!(pool.checked_out(), 2);

        drop(first);
        drop(second);
        assert_eq!(pool.checked_out(), 0);

        let _third = pool.checkout();
        assert_eq!(pool.created(), 2);
    }
}
