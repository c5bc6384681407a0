mod exec;
mod store;
mod value;

pub use store::{MemoryCatalog, MemoryConnector};
