/// Photo ingestion: records, storage coordination and HTTP surface
pub mod http;
pub mod model;
pub mod service;
pub mod store;

pub use model::Photo;
pub use service::{IngestRequest, IngestResult, PhotoService};
pub use store::PhotoStore;
