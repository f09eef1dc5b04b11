//! Request guards for the administrative surface.

pub mod auth;
