//! Core Kernel - Foundational types for the claim intake system
//!
//! This crate provides the building blocks shared by every other crate:
//! - Strongly-typed identifiers for sessions and audit events
//! - The kernel error type
//! - Port plumbing for swappable adapters (document extraction, ingestion)

pub mod identifiers;
pub mod error;
pub mod ports;

pub use identifiers::{SessionId, EventId};
pub use error::CoreError;
pub use ports::{PortError, DomainPort, AdapterConfig, AdapterType};
