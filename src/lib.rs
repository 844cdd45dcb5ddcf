//! Model zoo toolkit.
//!
//! Each model entry is a directory with a `result.json` manifest whose
//! `Link` points at a shared file. [`model::Zoo`] resolves that link,
//! downloads the artifact once, unpacks archives and hands the local path to
//! a [`loader::ModelLoader`].

pub mod artifact;
pub mod config;
pub mod datasets;
pub mod error;
pub mod loader;
pub mod model;
pub mod scaffold;

pub use config::Config;
pub use error::{Error, Result};
pub use model::{LoadOptions, Zoo};
