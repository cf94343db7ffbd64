//! Storage for the seal registry.
//!
//! The traits define the abstract store the matching core talks to; the
//! in-memory backend implements them for embedded use and tests.

mod memory;
mod traits;

pub use memory::InMemoryRegistry;
pub use traits::{
    DerivedFact, RegistryReader, RegistryStore, RegistryTransaction, RegistryWriter, StorageError,
};
