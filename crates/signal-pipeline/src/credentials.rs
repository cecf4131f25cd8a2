//! Credential resolution for model calls
//!
//! Resolution walks an ordered list of [`CredentialSource`] strategies:
//! the operator-wide key first, then the caller's own stored key. Each
//! source yields `Some(credential)` or `None`; the first hit wins.

use crate::collab::{Encryptor, IdentityStore};
use crate::error::{PipelineError, Result};
use crate::principal::{Credential, Principal};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// One strategy for producing a model credential
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Produce a credential for this principal, or `None`
    async fn provide(&self, principal: &Principal) -> Option<Credential>;

    /// Source name, for logging
    fn name(&self) -> &str;
}

/// Operator-wide credential from process configuration
///
/// Served only to designated operator accounts.
pub struct OperatorSource {
    credential: Option<String>,
}

impl OperatorSource {
    /// Create the source from the configured operator credential
    pub fn new(credential: Option<String>) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl CredentialSource for OperatorSource {
    async fn provide(&self, principal: &Principal) -> Option<Credential> {
        if !principal.is_operator {
            return None;
        }
        self.credential.as_deref().map(Credential::new)
    }

    fn name(&self) -> &str {
        "operator"
    }
}

/// Principal-owned credential, encrypted at rest in the identity store
pub struct OwnedKeySource {
    identity: Arc<dyn IdentityStore>,
    crypto: Arc<dyn Encryptor>,
}

impl OwnedKeySource {
    /// Create the source over the identity and encryption collaborators
    pub fn new(identity: Arc<dyn IdentityStore>, crypto: Arc<dyn Encryptor>) -> Self {
        Self { identity, crypto }
    }
}

#[async_trait]
impl CredentialSource for OwnedKeySource {
    async fn provide(&self, principal: &Principal) -> Option<Credential> {
        let subject_id = principal.external_subject_id.as_deref()?;

        let encrypted = match self.identity.get_encrypted_credential(subject_id).await {
            Ok(Some(encrypted)) => encrypted,
            Ok(None) => return None,
            Err(e) => {
                warn!(subject_id = %subject_id, error = %e, "Identity store lookup failed");
                return None;
            }
        };

        // Decryption failure is treated as "no credential", not an error:
        // the caller gets re-prompted instead of a hard failure.
        match self.crypto.decrypt(&encrypted).await {
            Ok(plaintext) => Some(Credential::new(plaintext)),
            Err(e) => {
                warn!(subject_id = %subject_id, error = %e, "Stored credential failed to decrypt");
                None
            }
        }
    }

    fn name(&self) -> &str {
        "owned-key"
    }
}

/// Resolves the model credential to charge for a request
pub struct CredentialResolver {
    sources: Vec<Box<dyn CredentialSource>>,
    identity: Arc<dyn IdentityStore>,
}

impl CredentialResolver {
    /// Build the resolver with the standard source order:
    /// operator key, then the principal's own stored key
    pub fn new(
        operator_credential: Option<String>,
        identity: Arc<dyn IdentityStore>,
        crypto: Arc<dyn Encryptor>,
    ) -> Self {
        let sources: Vec<Box<dyn CredentialSource>> = vec![
            Box::new(OperatorSource::new(operator_credential)),
            Box::new(OwnedKeySource::new(identity.clone(), crypto)),
        ];
        Self { sources, identity }
    }

    /// Resolve a credential for the principal, trying sources in order
    pub async fn resolve(&self, principal: &Principal) -> Option<Credential> {
        for source in &self.sources {
            if let Some(credential) = source.provide(principal).await {
                debug!(source = source.name(), "Credential resolved");
                return Some(credential);
            }
        }
        None
    }

    /// Delete the principal's stored credential so the next request forces
    /// re-supply. Invoked only by the orchestrator's failure path.
    pub async fn purge(&self, principal: &Principal) -> bool {
        let Some(subject_id) = principal.external_subject_id.as_deref() else {
            return false;
        };

        match self.identity.delete_encrypted_credential(subject_id).await {
            Ok(existed) => {
                if existed {
                    warn!(subject_id = %subject_id, "Purged rejected credential");
                }
                existed
            }
            Err(e) => {
                warn!(subject_id = %subject_id, error = %e, "Credential purge failed");
                false
            }
        }
    }
}

/// Management operations for principal-owned credentials
pub struct CredentialManager {
    identity: Arc<dyn IdentityStore>,
    crypto: Arc<dyn Encryptor>,
}

impl CredentialManager {
    /// Create the manager over the identity and encryption collaborators
    pub fn new(identity: Arc<dyn IdentityStore>, crypto: Arc<dyn Encryptor>) -> Self {
        Self { identity, crypto }
    }

    /// Encrypt and store a credential for the principal
    pub async fn store(&self, principal: &Principal, plaintext: &str) -> Result<()> {
        let subject_id = principal
            .external_subject_id
            .as_deref()
            .ok_or_else(|| {
                PipelineError::Other(
                    "cannot store a credential for a caller without a subject id".to_string(),
                )
            })?;

        let encrypted = self.crypto.encrypt(plaintext).await?;
        self.identity
            .set_encrypted_credential(subject_id, &encrypted)
            .await
    }

    /// Remove the principal's stored credential; returns whether one existed
    pub async fn remove(&self, principal: &Principal) -> Result<bool> {
        let Some(subject_id) = principal.external_subject_id.as_deref() else {
            return Ok(false);
        };
        self.identity.delete_encrypted_credential(subject_id).await
    }

    /// Whether the principal currently has a stored credential
    pub async fn status(&self, principal: &Principal) -> Result<bool> {
        let Some(subject_id) = principal.external_subject_id.as_deref() else {
            return Ok(false);
        };
        Ok(self
            .identity
            .get_encrypted_credential(subject_id)
            .await?
            .is_some())
    }
}
