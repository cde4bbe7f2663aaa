pub mod error;
pub mod operation;
pub mod protocol;
pub mod signature;
pub mod store;
pub mod types;
