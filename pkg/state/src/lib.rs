pub mod client;
pub mod memory;

pub use client::{ConfigStore, EtcdStore};
pub use memory::MemoryStore;
