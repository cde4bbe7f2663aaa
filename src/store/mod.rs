pub mod filestore;
pub mod generic;
pub mod memory;

pub use imcore::store::{error, traits};

pub use filestore::FileStore;
pub use memory::MemoryStore;
