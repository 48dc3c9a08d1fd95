/// Task registry: the records photos attach to
pub mod http;
pub mod model;
pub mod store;

pub use model::Task;
pub use store::TaskStore;
