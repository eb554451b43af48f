//! Request context propagation.
//!
//! # Responsibilities
//! - Keep a LIFO stack of active request identifiers per logical task
//! - Report the innermost identifier to the context filter
//! - Carry the stack into tasks spawned on behalf of a request
//!
//! # Design Decisions
//! - The stack lives in a tokio task-local, so it follows the future across
//!   suspension points and worker threads
//! - A spawned task without a scope gets a stack keyed by its task id; the
//!   entry is removed once the stack empties
//! - Code running outside any task (plain threads, startup) falls back to a
//!   per-thread stack
//! - Guards record the depth they pushed at and truncate back to it on drop

use std::cell::RefCell;
use std::future::Future;

use std::sync::LazyLock;

use dashmap::DashMap;
use tokio::task::futures::TaskLocalFuture;
use tokio::task::{Id, JoinHandle};

tokio::task_local! {
    static TASK_STACK: RefCell<Vec<String>>;
}

thread_local! {
    static THREAD_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Stacks of spawned tasks that pushed outside any [`scope`].
static SPAWNED_STACKS: LazyLock<DashMap<Id, Vec<String>>> = LazyLock::new(DashMap::new);

/// Future returned by [`scope`] and [`in_current_context`].
pub type ContextFuture<F> = TaskLocalFuture<RefCell<Vec<String>>, F>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    Scope,
    Spawned(Id),
    Thread,
}

fn storage() -> Storage {
    if TASK_STACK.try_with(|_| ()).is_ok() {
        Storage::Scope
    } else if let Some(id) = tokio::task::try_id() {
        Storage::Spawned(id)
    } else {
        Storage::Thread
    }
}

fn with_stack<R>(storage: Storage, f: impl FnOnce(&mut Vec<String>) -> R) -> Option<R> {
    match storage {
        Storage::Scope => TASK_STACK.try_with(|stack| f(&mut stack.borrow_mut())).ok(),
        Storage::Spawned(id) => {
            let mut stack = SPAWNED_STACKS.entry(id).or_default();
            let result = f(&mut stack);
            let empty = stack.is_empty();
            // The entry lock must be released before removal.
            drop(stack);
            if empty {
                SPAWNED_STACKS.remove_if(&id, |_, stack| stack.is_empty());
            }
            Some(result)
        }
        Storage::Thread => THREAD_STACK
            .try_with(|stack| f(&mut stack.borrow_mut()))
            .ok(),
    }
}

/// Handle for a pushed identifier. Dropping it pops the identifier.
#[derive(Debug)]
#[must_use = "the request context is popped as soon as the guard is dropped"]
pub struct ContextGuard {
    storage: Storage,
    depth: usize,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        // Task storage is gone if the guard outlived its scope; nothing to pop then.
        let depth = self.depth;
        with_stack(self.storage, |stack| stack.truncate(depth - 1));
    }
}

/// Push `request` as the innermost identifier of the current logical task.
///
/// The logical task is the enclosing [`scope`], else the running tokio task,
/// else the current thread.
pub fn push(request: impl Into<String>) -> ContextGuard {
    let storage = storage();
    let request = request.into();
    let depth = with_stack(storage, |stack| {
        stack.push(request);
        stack.len()
    })
    .unwrap_or(1);
    ContextGuard { storage, depth }
}

/// Pop the innermost identifier, if any.
pub fn pop() -> Option<String> {
    with_stack(storage(), |stack| stack.pop()).flatten()
}

/// The innermost identifier, or an empty string when no request is active.
pub fn current() -> String {
    with_stack(storage(), |stack| stack.last().cloned())
        .flatten()
        .unwrap_or_default()
}

/// Number of identifiers on the current stack.
pub fn depth() -> usize {
    with_stack(storage(), |stack| stack.len()).unwrap_or(0)
}

/// Copy of the current stack, innermost last.
pub fn snapshot() -> Vec<String> {
    with_stack(storage(), |stack| stack.clone()).unwrap_or_default()
}

/// Run `future` with `request` pushed on top of the caller's current stack.
///
/// The stack is captured when `scope` is called, not when the future is
/// first polled.
pub fn scope<F: Future>(request: impl Into<String>, future: F) -> ContextFuture<F> {
    let mut stack = snapshot();
    stack.push(request.into());
    TASK_STACK.scope(RefCell::new(stack), future)
}

/// Run `future` with a copy of the caller's current stack.
pub fn in_current_context<F: Future>(future: F) -> ContextFuture<F> {
    TASK_STACK.scope(RefCell::new(snapshot()), future)
}

/// Spawn a tokio task that inherits the caller's request context.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(in_current_context(future))
}

/// Run the closure `f` with `request` pushed on top of the caller's current stack.
pub fn sync_scope<R>(request: impl Into<String>, f: impl FnOnce() -> R) -> R {
    let mut stack = snapshot();
    stack.push(request.into());
    TASK_STACK.sync_scope(RefCell::new(stack), f)
}
