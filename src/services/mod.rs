//! Business logic services
//!
//! This module contains service implementations for:
//! - Role derivation from client certificates
//! - Prometheus metrics
//! - Monitor cycle state

pub mod metrics;
pub mod monitor_state;
pub mod role_deriver;

pub use metrics::Metrics;
pub use monitor_state::{CycleRecord, MonitorState};
pub use role_deriver::{Role, RoleDerivationError, RoleDeriver};
