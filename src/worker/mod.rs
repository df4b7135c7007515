//! Worker child-process lifecycle
//!
//! Workers are opaque OS processes. The spawner builds their command line
//! as an explicit argument vector, the pool owns every live handle, and the
//! terminator escalates from SIGTERM to SIGKILL inside a bounded window.

pub mod pool;
pub mod process;
pub mod spawner;
pub mod terminator;

pub use pool::WorkerPool;
pub use process::WorkerProcess;
pub use spawner::WorkerSpawner;
pub use terminator::WorkerTerminator;
