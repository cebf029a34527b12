//! Role derivation from client certificates
//!
//! A [`RoleDeriver`] maps the DER bytes of a client certificate to the
//! [`Role`] used for authorization. Which certificate field carries the role
//! is a deployment decision, selected with `[security] role_source`:
//!
//! | `role_source` | Role taken from |
//! |---|---|
//! | `none` | nothing, every gated request is denied |
//! | `subject_ou` | first subject Organizational Unit |
//! | `subject_cn` | first subject Common Name |
//! | `subject_o` | first subject Organization |
//! | `extension:<oid>` | value of a custom certificate extension |

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use x509_parser::certificate::X509Certificate;
use x509_parser::der_parser::der::parse_der;
use x509_parser::prelude::FromDer;

/// Authorization class of a caller
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Why a role could not be read from a certificate
#[derive(Debug, Error)]
pub enum RoleDerivationError {
    #[error("No role source configured")]
    NotConfigured,

    #[error("Malformed certificate: {0}")]
    Malformed(String),

    #[error("Certificate has no {0}")]
    MissingField(String),

    #[error("Certificate field {field} is not valid text")]
    InvalidValue { field: String },
}

/// Strategy mapping certificate DER bytes to a role
pub trait RoleDeriver: Send + Sync {
    fn derive_role(&self, der: &[u8]) -> Result<Role, RoleDerivationError>;
}

impl<F> RoleDeriver for F
where
    F: Fn(&[u8]) -> Result<Role, RoleDerivationError> + Send + Sync,
{
    fn derive_role(&self, der: &[u8]) -> Result<Role, RoleDerivationError> {
        self(der)
    }
}

/// Placeholder used until a deployment picks a role source
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredRole;

impl RoleDeriver for UnconfiguredRole {
    fn derive_role(&self, _der: &[u8]) -> Result<Role, RoleDerivationError> {
        Err(RoleDerivationError::NotConfigured)
    }
}

/// Subject attribute a role can be read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectAttribute {
    OrganizationalUnit,
    CommonName,
    Organization,
}

impl SubjectAttribute {
    fn label(self) -> &'static str {
        match self {
            SubjectAttribute::OrganizationalUnit => "subject OU",
            SubjectAttribute::CommonName => "subject CN",
            SubjectAttribute::Organization => "subject O",
        }
    }
}

/// Reads the role from the first matching subject attribute
#[derive(Debug, Clone, Copy)]
pub struct SubjectAttributeRole {
    attribute: SubjectAttribute,
}

impl SubjectAttributeRole {
    pub fn new(attribute: SubjectAttribute) -> Self {
        Self { attribute }
    }
}

impl RoleDeriver for SubjectAttributeRole {
    fn derive_role(&self, der: &[u8]) -> Result<Role, RoleDerivationError> {
        let cert = parse_certificate(der)?;
        let subject = cert.subject();

        let attr = match self.attribute {
            SubjectAttribute::OrganizationalUnit => subject.iter_organizational_unit().next(),
            SubjectAttribute::CommonName => subject.iter_common_name().next(),
            SubjectAttribute::Organization => subject.iter_organization().next(),
        }
        .ok_or_else(|| RoleDerivationError::MissingField(self.attribute.label().to_string()))?;

        let value = attr.as_str().map_err(|_| RoleDerivationError::InvalidValue {
            field: self.attribute.label().to_string(),
        })?;

        non_empty_role(value, self.attribute.label())
    }
}

/// Reads the role from a custom extension identified by OID
#[derive(Debug, Clone)]
pub struct ExtensionRole {
    oid: String,
}

impl ExtensionRole {
    pub fn new(oid: impl Into<String>) -> Self {
        Self { oid: oid.into() }
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }
}

impl RoleDeriver for ExtensionRole {
    fn derive_role(&self, der: &[u8]) -> Result<Role, RoleDerivationError> {
        let cert = parse_certificate(der)?;
        let field = format!("extension {}", self.oid);

        let ext = cert
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == self.oid)
            .ok_or_else(|| RoleDerivationError::MissingField(field.clone()))?;

        let value = extension_text(ext.value)
            .ok_or_else(|| RoleDerivationError::InvalidValue { field: field.clone() })?;

        non_empty_role(value, &field)
    }
}

/// Build the deriver named by a `role_source` setting
pub fn from_role_source(source: &str) -> Result<Arc<dyn RoleDeriver>, RoleSourceError> {
    let source = source.trim();

    let deriver: Arc<dyn RoleDeriver> = match source {
        "" | "none" => Arc::new(UnconfiguredRole),
        "subject_ou" => Arc::new(SubjectAttributeRole::new(SubjectAttribute::OrganizationalUnit)),
        "subject_cn" => Arc::new(SubjectAttributeRole::new(SubjectAttribute::CommonName)),
        "subject_o" => Arc::new(SubjectAttributeRole::new(SubjectAttribute::Organization)),
        other => match other.strip_prefix("extension:") {
            Some(oid) if is_dotted_oid(oid.trim()) => Arc::new(ExtensionRole::new(oid.trim())),
            Some(oid) => return Err(RoleSourceError::InvalidOid(oid.to_string())),
            None => return Err(RoleSourceError::Unknown(other.to_string())),
        },
    };

    Ok(deriver)
}

/// Invalid `role_source` setting
#[derive(Debug, Error, PartialEq)]
pub enum RoleSourceError {
    #[error("Unknown role source {0:?}; expected none, subject_ou, subject_cn, subject_o or extension:<oid>")]
    Unknown(String),

    #[error("Invalid extension OID {0:?}")]
    InvalidOid(String),
}

fn parse_certificate(der: &[u8]) -> Result<X509Certificate<'_>, RoleDerivationError> {
    X509Certificate::from_der(der)
        .map(|(_, cert)| cert)
        .map_err(|e| RoleDerivationError::Malformed(e.to_string()))
}

fn non_empty_role(value: &str, field: &str) -> Result<Role, RoleDerivationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RoleDerivationError::MissingField(field.to_string()));
    }
    Ok(Role::new(value))
}

/// Text of an extension value: a DER UTF8String, PrintableString or
/// IA5String (any length form), otherwise the raw bytes as UTF-8.
fn extension_text(value: &[u8]) -> Option<&str> {
    const UTF8_STRING: u8 = 0x0c;
    const PRINTABLE_STRING: u8 = 0x13;
    const IA5_STRING: u8 = 0x16;

    if matches!(value.first(), Some(&(UTF8_STRING | PRINTABLE_STRING | IA5_STRING))) {
        let parsed = parse_der(value).ok().filter(|(rest, _)| rest.is_empty());
        if let Some(text) = parsed.and_then(|(_, object)| object.as_str().ok()) {
            return Some(text);
        }
    }

    std::str::from_utf8(value).ok()
}

fn is_dotted_oid(oid: &str) -> bool {
    let mut arcs = 0;
    for arc in oid.split('.') {
        if arc.is_empty() || !arc.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        arcs += 1;
    }
    arcs >= 2
}
