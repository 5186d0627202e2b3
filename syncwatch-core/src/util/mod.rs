mod id;

pub use id::*;

use std::sync::OnceLock;
use tokio::runtime::{Handle, Runtime};

/// Returns the current tokio handle, falling back to a process-wide runtime
/// when called from outside one.
pub fn runtime_handle() -> Handle {
    static FALLBACK: OnceLock<Runtime> = OnceLock::new();

    Handle::try_current().unwrap_or_else(|_| {
        FALLBACK
            .get_or_init(|| Runtime::new().expect("fallback runtime is created"))
            .handle()
            .clone()
    })
}
