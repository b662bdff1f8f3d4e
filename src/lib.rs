//! # Piston Gateway - Code Execution Admission
//!
//! Rust implementation of the Piston API gateway providing:
//! - Declarative configuration from `PISTON_*` environment variables
//! - Per-language resource limit overrides
//! - Job negotiation against runtime ceilings
//! - Job orchestration with guaranteed engine cleanup
//! - gRPC service layer for external clients
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────────────────────────────┐
//!   gRPC requests →  │  Authenticator → ExecuteCodeService  │
//!                    │                 ↓                    │
//!                    │           JobOrchestrator            │
//!                    │   ┌─────────────┐ ┌──────────────┐   │
//!                    │   │JobNegotiator│ │ JobLifecycle │   │
//!                    │   └─────────────┘ └──────────────┘   │
//!                    └──────┬───────────────┬───────┬───────┘
//!                   RuntimeRegistry      Engine  PackageIndex
//! ```
//!
//! Sandboxing, process supervision and package downloads sit behind the
//! [`engine::Engine`] and [`packages::PackageIndex`] traits.

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod auth;
pub mod config;
pub mod engine;
pub mod grpc;
pub mod job;
pub mod lifecycle;
pub mod orchestrator;
pub mod packages;
pub mod proto;
pub mod runtime;
pub mod server;
pub mod types;

// Internal utilities
pub mod observability;

pub use config::Config;
pub use types::{Error, Result};
