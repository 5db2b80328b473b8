pub mod util;
pub mod worker;

// Re-exports the protocol surface.
pub use worker::{
    msg::{ERROR, QUERY, RESULT},
    relay::{ErrorInfo, WorkerEvent, WorkerId},
    ContextKind, WorkerError,
};

// Handle and builder exist on web targets only.
#[cfg(target_arch = "wasm32")]
pub use worker::{WorkerBuilder, WorkerHandle};

// Can import crate::offstage::*.
#[allow(unused_imports)]
use crate as offstage;
