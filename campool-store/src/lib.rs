pub mod app_config;
pub mod codec;
pub mod memory;

pub use memory::MemoryStore;
