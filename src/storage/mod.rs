pub mod data_store;
pub mod file;
pub mod memory;
pub mod object_store;

pub use data_store::DataStore;
pub use file::FileDataStore;
pub use memory::MemoryDataStore;
pub use object_store::{InMemoryObjectStore, ObjectStore, SerializedObjectStore};
