pub mod link;
pub mod manifest;
pub mod registry;
pub mod zoo;

pub use link::{resolve_download_url, SharingLink};
pub use manifest::Manifest;
pub use registry::{ModelRegistry, PulledModel};
pub use zoo::{FetchedArtifact, LoadOptions, Zoo};
