//! Client Certificate Role Gate
//!
//! Authorizes requests by the role carried in the caller's client certificate
//! (mTLS). The gate wraps protected routes and resolves every request to one
//! of three outcomes:
//!
//! - no usable certificate: `401 Unauthorized`
//! - role not in the route's allow-list, or any failure while deriving it:
//!   `403 Forbidden`
//! - otherwise the wrapped handler runs and its response is returned as is
//!
//! ## Where the certificate comes from
//!
//! An in-process TLS terminator inserts [`SslClientCert`] into the request
//! extensions. Behind a reverse proxy the PEM certificate arrives in a header
//! (`X-SSL-Client-Cert` unless configured otherwise), URL-encoded the way
//! nginx's `$ssl_client_escaped_cert` produces it:
//!
//! ```nginx
//! location /wm_resource_monitor/ {
//!     proxy_pass http://127.0.0.1:5000;
//!     proxy_set_header X-SSL-Client-Cert $ssl_client_escaped_cert;
//! }
//! ```
//!
//! The role itself is read by a [`RoleDeriver`]; see
//! [`crate::services::role_deriver`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json, Router,
};
use thiserror::Error;

use crate::services::role_deriver::{Role, RoleDeriver};
use crate::utils::error::ErrorResponse;

/// Header used by default to forward the client certificate
pub const DEFAULT_CERT_HEADER: &str = "X-SSL-Client-Cert";

/// PEM client certificate handed over by the transport layer
#[derive(Debug, Clone)]
pub struct SslClientCert(pub String);

/// Outcome of a rejected request
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertRoleError {
    /// The caller could not be identified
    #[error("Client certificate required")]
    Unauthenticated,
    /// The caller was identified but is not permitted
    #[error("Access denied")]
    Forbidden,
}

impl CertRoleError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CertRoleError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CertRoleError::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for CertRoleError {
    fn into_response(self) -> Response {
        let error_type = match self {
            CertRoleError::Unauthenticated => "unauthorized",
            CertRoleError::Forbidden => "forbidden",
        };

        let body = ErrorResponse::new(error_type, self.to_string());

        (self.status_code(), Json(body)).into_response()
    }
}

/// Allow-list plus role derivation strategy for one group of routes
#[derive(Clone)]
pub struct CertRoleGate {
    allowed_roles: Arc<[Role]>,
    deriver: Arc<dyn RoleDeriver>,
    cert_header: Arc<str>,
}

impl std::fmt::Debug for CertRoleGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertRoleGate")
            .field("allowed_roles", &self.allowed_roles)
            .field("cert_header", &self.cert_header)
            .finish_non_exhaustive()
    }
}

impl CertRoleGate {
    pub fn new<I, R>(allowed_roles: I, deriver: Arc<dyn RoleDeriver>) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        let allowed_roles: Arc<[Role]> = allowed_roles.into_iter().map(Into::into).collect();

        if allowed_roles.is_empty() {
            tracing::warn!("Certificate role gate created with an empty allow-list; every request will be denied");
        }

        Self {
            allowed_roles,
            deriver,
            cert_header: Arc::from(DEFAULT_CERT_HEADER),
        }
    }

    /// Read the forwarded certificate from a different header
    pub fn with_cert_header(mut self, header: impl AsRef<str>) -> Self {
        self.cert_header = Arc::from(header.as_ref());
        self
    }

    pub fn allowed_roles(&self) -> &[Role] {
        &self.allowed_roles
    }

    pub fn is_allowed(&self, role: &Role) -> bool {
        self.allowed_roles.contains(role)
    }

    /// Decide whether a caller presenting `cert` may proceed
    pub fn authorize(&self, cert: Option<&str>) -> Result<Role, CertRoleError> {
        let cert = match cert {
            Some(cert) if !cert.is_empty() => cert.trim(),
            _ => {
                tracing::warn!("No client certificate provided");
                return Err(CertRoleError::Unauthenticated);
            }
        };

        let der = pem_to_der(cert).map_err(|e| {
            tracing::error!("Failed to convert PEM to DER: {}", e);
            CertRoleError::Unauthenticated
        })?;

        let derived = catch_unwind(AssertUnwindSafe(|| self.deriver.derive_role(&der)));

        let role = match derived {
            Ok(Ok(role)) => role,
            Ok(Err(e)) => {
                tracing::error!("Role validation error: {}", e);
                return Err(CertRoleError::Forbidden);
            }
            Err(_) => {
                tracing::error!("Role validation error: role derivation panicked");
                return Err(CertRoleError::Forbidden);
            }
        };

        if !self.is_allowed(&role) {
            tracing::warn!(
                "Role '{}' not in allowed roles: {:?}",
                role,
                self.allowed_roles
            );
            return Err(CertRoleError::Forbidden);
        }

        tracing::debug!(role = %role, "Client certificate role accepted");
        Ok(role)
    }

    /// Run `operation` only if `cert` carries a permitted role
    pub fn guard<T, F>(&self, cert: Option<&str>, operation: F) -> Result<T, CertRoleError>
    where
        F: FnOnce() -> T,
    {
        self.authorize(cert)?;
        Ok(operation())
    }

    /// Locate the client certificate for a request
    ///
    /// A certificate from the TLS layer wins over a forwarded header.
    pub fn client_cert(&self, request: &Request) -> Option<String> {
        if let Some(SslClientCert(pem)) = request.extensions().get::<SslClientCert>() {
            return Some(pem.clone());
        }

        forwarded_cert(request.headers(), &self.cert_header)
    }
}

/// Error turning a PEM certificate into DER
#[derive(Debug, Error)]
pub enum PemError {
    #[error("no CERTIFICATE block found")]
    NoCertificate,
    #[error("invalid PEM: {0}")]
    Invalid(#[from] std::io::Error),
}

/// Convert the first `CERTIFICATE` block of a PEM string to DER
///
/// Indentation and blank lines are ignored, so certificates embedded in
/// indented text still decode.
pub fn pem_to_der(pem: &str) -> Result<Vec<u8>, PemError> {
    let normalized = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = normalized.as_bytes();
    let first = rustls_pemfile::certs(&mut reader).next();
    match first {
        Some(Ok(der)) => Ok(der.as_ref().to_vec()),
        Some(Err(e)) => Err(PemError::Invalid(e)),
        None => Err(PemError::NoCertificate),
    }
}

/// Read a certificate forwarded by a reverse proxy
fn forwarded_cert(headers: &HeaderMap, header: &str) -> Option<String> {
    let value = headers.get(header)?.to_str().ok()?;

    // URL-decode if needed (nginx URL-encodes the cert)
    let pem = urlencoding::decode(value)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| value.to_string());

    Some(pem)
}

/// Middleware enforcing a [`CertRoleGate`]
///
/// The derived [`Role`] is added to the request extensions for handlers that
/// want it.
pub async fn require_cert_role(
    State(gate): State<CertRoleGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let cert = gate.client_cert(&request);

    match gate.authorize(cert.as_deref()) {
        Ok(role) => {
            request.extensions_mut().insert(role);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Put every route of `router` behind `gate`
pub fn protect<S>(router: Router<S>, gate: CertRoleGate) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(axum::middleware::from_fn_with_state(gate, require_cert_role))
}
