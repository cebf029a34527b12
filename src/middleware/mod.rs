//! Middleware components
//!
//! This module contains middleware for:
//! - Client certificate role authorization
//! - HTTP request metrics
//! - Reverse proxy header handling

pub mod cert_role;
pub mod forwarded;
pub mod metrics;

pub use cert_role::{protect, require_cert_role, CertRoleError, CertRoleGate, SslClientCert};
pub use forwarded::ExternalBase;
pub use metrics::track_http_metrics;
