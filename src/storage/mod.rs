pub mod cache;
pub mod couch_repository;
pub mod index;
pub mod keys;
pub mod repository;
pub mod revision;
pub mod seed;

pub use couch_repository::CouchStorage;
pub use index::{DirectoryListing, FlowTree};
pub use keys::{Namespace, SingletonKind};
pub use repository::{FlowStorage, LibraryEntry};
pub use seed::{SeedReport, SeedSources, SeedStatus};
