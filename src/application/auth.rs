//! Request principals and the bearer-token authenticator that resolves them.
//!
//! Quire never issues credentials. Operators configure the SHA-256 digest of
//! each token, and every request is resolved to a [`Principal`] that handlers
//! receive as an explicit argument.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Principal {
    #[default]
    Anonymous,
    User { name: String, is_admin: bool },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("administrator privileges required")]
pub struct AccessDenied;

impl Principal {
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::User { is_admin: true, .. })
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User { name, .. } => Some(name),
        }
    }

    /// Name recorded in logs for mutations.
    pub fn actor(&self) -> &str {
        self.name().unwrap_or("anonymous")
    }

    pub fn require_admin(&self) -> Result<(), AccessDenied> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AccessDenied)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential name must not be empty")]
    EmptyName,
    #[error("token digest for `{name}` must be 64 hexadecimal characters")]
    InvalidDigest { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    name: String,
    digest: Vec<u8>,
    is_admin: bool,
}

impl Credential {
    pub fn from_hex(
        name: impl Into<String>,
        digest_hex: &str,
        is_admin: bool,
    ) -> Result<Self, CredentialError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CredentialError::EmptyName);
        }

        let digest = hex::decode(digest_hex.trim())
            .ok()
            .filter(|bytes| bytes.len() == 32)
            .ok_or_else(|| CredentialError::InvalidDigest { name: name.clone() })?;

        Ok(Self {
            name,
            digest,
            is_admin,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }
}

#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    credentials: Vec<Credential>,
}

impl Authenticator {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials }
    }

    /// Match a presented token against every configured credential.
    ///
    /// All digests are compared so the time taken does not depend on which
    /// credential (if any) matched.
    pub fn authenticate(&self, token: &str) -> Option<Principal> {
        let presented = digest(token);
        let mut matched: Option<&Credential> = None;

        for credential in &self.credentials {
            let equal: bool = presented.as_slice().ct_eq(&credential.digest).into();
            if equal && matched.is_none() {
                matched = Some(credential);
            }
        }

        matched.map(|credential| Principal::User {
            name: credential.name.clone(),
            is_admin: credential.is_admin,
        })
    }

    /// Resolve an optional token; unknown or missing tokens are anonymous.
    pub fn resolve(&self, token: Option<&str>) -> Principal {
        token
            .and_then(|token| self.authenticate(token))
            .unwrap_or_default()
    }
}

/// Hex-encoded SHA-256 digest of a token, as stored in configuration.
pub fn hash_token(token: &str) -> String {
    hex::encode(digest(token))
}

fn digest(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
