pub mod close;
pub mod vcs;

pub use close::{CloseReport, LifecycleError, ProjectLifecycleManager, VcsStatus};
pub use vcs::{GitClient, VcsClient};
