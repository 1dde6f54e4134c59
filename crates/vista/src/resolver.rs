//! Resolve transceiver credential lookups through an authority.

use std::sync::Arc;

use async_trait::async_trait;
use vista_authority::{Authority, AuthorityError};
use vista_core::{Credential, CredentialId};
use vista_store::CredentialStore;
use vista_transceiver::{CredentialResolver, ResolverError};

/// A [`CredentialResolver`] that asks an in-process [`Authority`].
pub struct AuthorityResolver<S: CredentialStore> {
    authority: Arc<Authority<S>>,
}

impl<S: CredentialStore> AuthorityResolver<S> {
    pub fn new(authority: Arc<Authority<S>>) -> Self {
        Self { authority }
    }
}

impl<S: CredentialStore> Clone for AuthorityResolver<S> {
    fn clone(&self) -> Self {
        Self {
            authority: Arc::clone(&self.authority),
        }
    }
}

#[async_trait]
impl<S: CredentialStore + 'static> CredentialResolver for AuthorityResolver<S> {
    async fn resolve(&self, id: &CredentialId) -> Result<Option<Credential>, ResolverError> {
        match self.authority.lookup(id).await {
            Ok(credential) => Ok(Some(credential)),
            Err(AuthorityError::NotFound(_)) => Ok(None),
            Err(e) => Err(ResolverError(e.to_string())),
        }
    }

    async fn is_revoked(&self, id: &CredentialId) -> Result<bool, ResolverError> {
        self.authority
            .is_revoked(id)
            .await
            .map_err(|e| ResolverError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_authority::AuthorityConfig;
    use vista_core::{AuthorityKeyPair, Identity, ManualClock};
    use vista_store::MemoryStore;

    #[tokio::test]
    async fn test_resolves_issued_and_revoked() {
        let authority = Authority::new(
            AuthorityKeyPair::from_seed(&[1; 32]),
            MemoryStore::new(),
            AuthorityConfig::default(),
        )
        .with_clock(Arc::new(ManualClock::at_secs(1000)));
        let authority = Arc::new(authority);
        let resolver = AuthorityResolver::new(authority.clone());

        let auth = authority
            .authorize(&Identity::new("veh-42").unwrap(), 600)
            .await
            .unwrap();
        let id = auth.credential.id();

        assert_eq!(resolver.resolve(&id).await.unwrap(), Some(auth.credential));
        assert!(!resolver.is_revoked(&id).await.unwrap());

        authority.revoke(&id).await.unwrap();
        assert!(resolver.is_revoked(&id).await.unwrap());

        let unknown = CredentialId::from_bytes([0xab; 32]);
        assert_eq!(resolver.resolve(&unknown).await.unwrap(), None);
    }
}
