//! Helper utilities for FFI layer

use std::sync::OnceLock;
use tokio::runtime::{Builder, Runtime};

/// Tokio runtime shared by every `ParleyMessaging` instance
///
/// Event dispatch tasks live here, so they keep running no matter which
/// foreign thread called into the bridge.
pub fn get_runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();

    RUNTIME.get_or_init(|| match build_runtime(None) {
        Ok(runtime) => runtime,
        Err(e) => {
            // Constrained platforms can refuse worker threads; fall back to one
            tracing::warn!("Failed to create multi-thread runtime ({}), using a single worker", e);
            match build_runtime(Some(1)) {
                Ok(runtime) => runtime,
                Err(e) => panic!("unable to create tokio runtime: {}", e),
            }
        }
    })
}

fn build_runtime(workers: Option<usize>) -> std::io::Result<Runtime> {
    let mut builder = Builder::new_multi_thread();
    builder.enable_all().thread_name("parley-runtime");
    if let Some(workers) = workers {
        builder.worker_threads(workers);
    }
    builder.build()
}
