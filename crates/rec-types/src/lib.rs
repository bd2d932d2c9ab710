//! Core types and traits for the recommender service.
//!
//! Request/response DTOs use camelCase field names to stay JSON-compatible with the
//! external annotation tool that drives `/train` and `/predict`.

mod dto;
mod key;
mod traits;

pub use dto::*;
pub use key::*;
pub use traits::*;
