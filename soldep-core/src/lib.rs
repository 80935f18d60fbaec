pub mod adapter;
pub mod config;
pub mod conflicts;
pub mod console;
pub mod error;
pub mod flatten;
pub mod graph;
pub mod index;
pub mod lockfile;
pub mod normalize;
pub mod project;
pub mod remap;
pub mod resolve;
pub mod version;

#[cfg(test)]
mod session_test;

pub use adapter::{DiskAdapter, IoAdapter};
pub use config::SoldepConfig;
pub use error::SoldepError;
pub use flatten::FlattenOutput;
pub use lockfile::Lockfile;
pub use project::Project;
pub use resolve::Session;

pub type Result<T> = std::result::Result<T, SoldepError>;
