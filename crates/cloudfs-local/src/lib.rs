// Local-disk implementation of the storage collaborator

pub mod filesystem;

pub use filesystem::LocalCloudStorage;
