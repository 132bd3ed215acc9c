mod close;
mod event;
mod project;
mod window;

pub use close::{CloseMarker, CloseStage};
pub use event::StoreEvent;
pub use project::{ProjectName, ProjectNameError, UNASSIGNED};
pub use window::{CloseTarget, WindowKey, WindowMetadata, WindowRecord, WindowRect};
