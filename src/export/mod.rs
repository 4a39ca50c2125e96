//! Model export module
//!
//! Packages trained pipelines into a versioned model store that serving code
//! loads by name.

mod model_store;

pub use model_store::{Manifest, ModelStore, Signature, StoredModel};
