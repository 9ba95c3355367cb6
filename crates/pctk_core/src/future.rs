//! One-shot future/promise primitive used to report command completion back
//! to script tasks.
//!
//! Design contract: a `Promise` is the single producer side and a `Future`
//! the single consumer side of one completion slot. Completion happens at
//! most once; the move-based API makes a second completion unrepresentable.
//! Consumers either block (`wait`), poll (`is_completed`), or chain
//! (`and_then`/`recover`). Chained continuations run on whichever thread
//! completes the upstream promise, never on a thread that merely constructed
//! the chain, so building a chain can never stall the simulation loop.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use thiserror::Error;

/// Error side of a completion. `PromiseBroken` is the distinguished value a
/// cancelled activity reports to whoever awaited it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FutureError {
    #[error("promise was broken before completion")]
    PromiseBroken,
    #[error("{0}")]
    Failed(String),
}

pub type Completion<T> = Result<T, FutureError>;

type Callback<T> = Box<dyn FnOnce(Completion<T>) + Send>;

struct Inner<T> {
    completed: bool,
    result: Option<Completion<T>>,
    callback: Option<Callback<T>>,
}

struct Shared<T> {
    state: Mutex<Inner<T>>,
    ready: Condvar,
}

/// Producer side: completes the slot exactly once.
pub struct Promise<T = ()> {
    shared: Arc<Shared<T>>,
}

/// Consumer side: observes the completion.
pub struct Future<T = ()> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Promise<T> {
    /// Create a fresh promise/future pair.
    pub fn new() -> (Promise<T>, Future<T>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(Inner {
                completed: false,
                result: None,
                callback: None,
            }),
            ready: Condvar::new(),
        });
        (
            Promise {
                shared: shared.clone(),
            },
            Future { shared },
        )
    }

    pub fn complete_with(self, value: T) {
        self.finish(Ok(value));
    }

    pub fn complete_with_error(self, err: FutureError) {
        self.finish(Err(err));
    }

    /// Cancel: whoever awaits this promise observes `PromiseBroken`.
    pub fn break_promise(self) {
        self.finish(Err(FutureError::PromiseBroken));
    }

    /// Complete with `value` after `delay`, without blocking the caller.
    pub fn complete_after(self, value: T, delay: Duration) {
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            self.finish(Ok(value));
        });
    }

    /// Forward the completion of `other` into this promise. Legal before
    /// `other` completes; the forwarding fires whenever it does.
    pub fn bind(self, other: Future<T>) {
        other.on_complete(move |result| self.finish(result));
    }

    fn finish(self, result: Completion<T>) {
        let callback = {
            let mut inner = match self.shared.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if inner.completed {
                log::warn!("promise completed more than once; ignoring later completion");
                return;
            }
            inner.completed = true;
            match inner.callback.take() {
                Some(callback) => Some(callback),
                None => {
                    inner.result = Some(result);
                    self.shared.ready.notify_all();
                    return;
                }
            }
        };
        if let Some(callback) = callback {
            callback(result);
        }
    }
}

impl<T: Send + 'static> Promise<T>
where
    T: Default,
{
    /// Complete successfully with the default value (`()` for command
    /// promises).
    pub fn complete(self) {
        self.complete_with(T::default());
    }
}

impl<T: Send + 'static> Future<T> {
    /// An already-completed future.
    pub fn resolved(value: T) -> Future<T> {
        let (promise, future) = Promise::new();
        promise.complete_with(value);
        future
    }

    /// An already-failed future.
    pub fn rejected(err: FutureError) -> Future<T> {
        let (promise, future) = Promise::new();
        promise.complete_with_error(err);
        future
    }

    /// A future that completes with `value` once `delay` has elapsed.
    pub fn resolved_after(value: T, delay: Duration) -> Future<T> {
        let (promise, future) = Promise::new();
        promise.complete_after(value, delay);
        future
    }

    /// Non-blocking poll.
    pub fn is_completed(&self) -> bool {
        match self.shared.state.lock() {
            Ok(inner) => inner.completed,
            Err(poisoned) => poisoned.into_inner().completed,
        }
    }

    /// Block the calling task until the promise completes.
    pub fn wait(self) -> Completion<T> {
        let mut inner = match self.shared.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while !inner.completed {
            inner = match self.shared.ready.wait(inner) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        inner
            .result
            .take()
            .unwrap_or_else(|| Err(FutureError::Failed("future result already taken".into())))
    }

    /// Register the single continuation. Runs immediately on the calling
    /// thread if the future already completed, otherwise on the completing
    /// thread.
    pub fn on_complete(self, callback: impl FnOnce(Completion<T>) + Send + 'static) {
        let pending = {
            let mut inner = match self.shared.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if inner.completed {
                inner.result.take()
            } else {
                inner.callback = Some(Box::new(callback));
                return;
            }
        };
        if let Some(result) = pending {
            callback(result);
        }
    }

    /// On success, feed the value to `f` and adopt the future it returns.
    /// On error, propagate without calling `f`.
    pub fn and_then<U, F>(self, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        let (promise, future) = Promise::new();
        self.on_complete(move |result| match result {
            Ok(value) => promise.bind(f(value)),
            Err(err) => promise.complete_with_error(err),
        });
        future
    }

    /// On error, feed the error to `f` and adopt the replacement future.
    pub fn recover<F>(self, f: F) -> Future<T>
    where
        F: FnOnce(FutureError) -> Future<T> + Send + 'static,
    {
        let (promise, future) = Promise::new();
        self.on_complete(move |result| match result {
            Ok(value) => promise.complete_with(value),
            Err(err) => promise.bind(f(err)),
        });
        future
    }

    /// Replace any error with `default`.
    pub fn ignore_error(self, default: T) -> Future<T> {
        let (promise, future) = Promise::new();
        self.on_complete(move |result| promise.complete_with(result.unwrap_or(default)));
        future
    }
}
