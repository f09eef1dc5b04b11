//! Database models and DTOs for all domain entities.

pub mod finding;
pub mod item;
pub mod pagination;
pub mod pattern;
