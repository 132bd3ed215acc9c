pub mod enrich;
#[cfg(test)]
pub mod fake;
pub mod identity;
pub mod source;

pub use enrich::EnrichmentPipeline;
pub use identity::IdentityTable;
pub use source::{WindowSource, WmctrlSource};
