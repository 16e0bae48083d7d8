//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod inflection;
pub mod resource;
pub mod schemas;
pub mod types;
pub mod validation;
