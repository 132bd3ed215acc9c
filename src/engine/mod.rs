mod handle;
mod poller;

pub use handle::EngineHandle;
pub use poller::ReconciliationEngine;
