pub mod directory;
pub mod duplicates;
pub mod memory;

pub use directory::DirectoryStore;
pub use duplicates::DuplicateService;
pub use memory::MemoryStore;
