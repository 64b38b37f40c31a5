//! `collaborators` crate: the black-box services the engine delegates to.
//!
//! The engine only decides *when* and *whether* to call these.  Fetching
//! clinical resources, rendering documents and validating them all happen
//! behind [`DataRetrieval`], [`DocumentGenerator`] and [`DocumentValidator`].

pub mod error;
pub mod http;
pub mod mock;
pub mod traits;

pub use error::CollaboratorError;
pub use traits::{ClinicalData, DataRetrieval, DocumentGenerator, DocumentValidator};
