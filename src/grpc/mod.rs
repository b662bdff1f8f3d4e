//! gRPC service implementation.
//!
//! Implements `piston.v2.ExecuteCodeService` on top of the [`JobOrchestrator`].
//!
//! [`JobOrchestrator`]: crate::orchestrator::JobOrchestrator

pub mod conversions;
pub mod execute_service;

pub use execute_service::ExecuteCodeService;
