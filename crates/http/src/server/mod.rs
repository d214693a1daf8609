//! Connection dispatch.
//!
//! A fixed number of workers is started once; the acceptor hands each accepted
//! connection to the first idle worker and drops it when every worker is busy. Nothing
//! is queued, so a saturated server refuses new clients instead of making them wait.
//!
//! - [`WorkerPool`]: the workers and their busy flags
//! - [`serve`]: the accept loop
//! - [`bind_first_free`]: binds the first free port of a range

mod acceptor;
mod worker_pool;

pub use acceptor::{DEFAULT_PORTS, bind_first_free, serve};
pub use worker_pool::WorkerPool;
