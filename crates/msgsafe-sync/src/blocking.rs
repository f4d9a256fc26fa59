//! Sync-over-async bridge.
//!
//! Some call sites (settings screens, app-lifecycle hooks) are synchronous
//! and need a result before returning. `run_blocking` parks the current
//! worker thread without starving the runtime.
//!
//! Only valid on a multi-thread runtime; `block_in_place` panics on a
//! current-thread runtime, which is the correct failure mode for calling
//! this from an event loop that must not block.

use std::future::Future;

use tokio::runtime::Handle;

pub fn run_blocking<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| Handle::current().block_on(future))
}
