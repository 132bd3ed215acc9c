pub mod assignment;
pub mod persistence;

pub use assignment::{AssignmentStore, StoreError, StoreSnapshot};
pub use persistence::ProjectFiles;
