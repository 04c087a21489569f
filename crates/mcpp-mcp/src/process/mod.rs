//! Child process lifecycle.

mod shutdown;

pub use shutdown::{ChildGuard, DEFAULT_GRACE, shutdown_child};
