//! Command handlers, one module per group of CLI verbs

pub mod build;
pub mod lifecycle;
pub mod setup;
pub mod status;
