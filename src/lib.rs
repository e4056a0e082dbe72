//! A sandboxed mapping-file loader and selector-tree resolver for
//! calibration reference-file selection.
//!
//! [`mapping`] and [`parser`] turn a restricted declarative grammar into a
//! checksummed, structurally validated [`mapping::Mapping`] tree;
//! [`selector`] is the six-variant algebra those trees evaluate a header
//! against; [`cache`] is the process-wide, cycle-safe loader; [`query`] is
//! the public front door most callers want.

pub mod cache;
pub mod checksum;
pub mod collaborators;
pub mod error;
mod matcher;
pub mod mapping;
mod parser;
pub mod query;
mod selector;
mod timestamp;
mod validate;
mod version;
pub mod value;

pub use collaborators::{ExtractHeader, FsLocate, Locate, NullCollaborators, ValidValues};
pub use error::{CrdsError, Result};
pub use mapping::{Expectation, LoadOptions, Mapping};
pub use query::best_references;
pub use selector::{Resolved, Selector};
pub use validate::validate;
pub use value::{Header, Value};
