pub mod filesystem;

pub use filesystem::UploadStorage;
