pub mod catalog;
pub mod discovery;
pub mod templated;

pub use catalog::ExternalCatalogGrab;
pub use discovery::PageDiscoveryGrab;
pub use templated::{PageRange, TemplatedRangeGrab};
