pub mod close;
pub mod common;
pub mod projects;
pub mod push;
pub mod resume;
pub mod snapshots;
pub mod tower;
pub mod watch;
