//! Business logic services.

pub mod action;
pub mod detection;
pub mod extractor;
pub mod finding;
pub mod intake;
pub mod queue;
pub mod registry;
pub mod worker;
