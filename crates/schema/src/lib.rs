//! Tool naming and parameter-schema handling for toolforge.
//!
//! Pure functions only: the pipelines call into this crate to derive names from endpoint
//! metadata and to prepare synthesized schemas for delivery.

pub mod augment;
pub mod error;
pub mod naming;
pub mod validate;

pub use augment::{augment_schema, is_flexible, remove_custom_fields};
pub use error::{Result, SchemaError};
pub use naming::NamingScheme;
pub use validate::validate_parameters;
