//! Map use-case services.
//!
//! # Responsibility
//! - Orchestrate map and node repositories into the operations exposed to
//!   the HTTP and real-time layers.
//! - Keep those layers decoupled from storage details.

pub mod map_service;
pub mod tree_validator;
