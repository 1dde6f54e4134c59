//! Concurrency: keyed issuance locks and independent transceiver tasks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vista::authority::AuthorityError;
use vista::store::MemoryStore;
use vista::transceiver::link::memory::RadioMedium;
use vista::transceiver::{CredentialResolver, ResolverError};
use vista::{AuthorityResolver, Credential, CredentialId, ReceiveEvent, ResolutionPolicy};
use vista_testkit::{fast_config, identity, AuthorityFixture};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_live_credential_per_identity() -> anyhow::Result<()> {
    let fx = AuthorityFixture::new();

    let mut handles = Vec::new();
    for attempt in 0..32 {
        let authority = fx.authority.clone();
        handles.push(tokio::spawn(async move {
            let who = identity(&format!("veh-{}", attempt % 8));
            authority.authorize(&who, 600).await.map(|auth| auth.credential)
        }));
    }

    let mut issued = Vec::new();
    let mut refused = 0;
    for handle in handles {
        match handle.await? {
            Ok(credential) => issued.push(credential),
            Err(AuthorityError::AlreadyAuthorized { .. }) => refused += 1,
            Err(e) => return Err(e.into()),
        }
    }

    assert_eq!(issued.len(), 8);
    assert_eq!(refused, 24);
    let mut identities: Vec<_> = issued.iter().map(|c| c.identity.clone()).collect();
    identities.sort();
    identities.dedup();
    assert_eq!(identities.len(), 8);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_revocations_are_idempotent() -> anyhow::Result<()> {
    let fx = AuthorityFixture::new();
    let auth = fx.authorize("veh-42", 600).await;
    let id = auth.credential.id();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let authority = fx.authority.clone();
            tokio::spawn(async move { authority.revoke(&id).await })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    assert_eq!(fx.authority.revocations_since(0).await?.len(), 1);
    Ok(())
}

/// A resolver that answers slowly on every call.
struct SlowResolver {
    inner: AuthorityResolver<MemoryStore>,
    delay: Duration,
}

#[async_trait]
impl CredentialResolver for SlowResolver {
    async fn resolve(&self, id: &CredentialId) -> Result<Option<Credential>, ResolverError> {
        tokio::time::sleep(self.delay).await;
        self.inner.resolve(id).await
    }

    async fn is_revoked(&self, id: &CredentialId) -> Result<bool, ResolverError> {
        tokio::time::sleep(self.delay).await;
        self.inner.is_revoked(id).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_validation_does_not_stall_broadcast() -> anyhow::Result<()> {
    let fx = AuthorityFixture::new();
    let medium = RadioMedium::new();
    fx.clock.set_secs(1001);

    let (slow, _) = fx
        .loaded_transceiver(
            "veh-slow",
            600,
            medium.attach(),
            fast_config(ResolutionPolicy::OnDemand),
        )
        .await;
    let (fast, _) = fx
        .loaded_transceiver(
            "veh-fast",
            600,
            medium.attach(),
            fast_config(ResolutionPolicy::OnDemand),
        )
        .await;

    let slow = slow
        .with_resolver(Arc::new(SlowResolver {
            inner: AuthorityResolver::new(fx.authority.clone()),
            delay: Duration::from_secs(2),
        }))
        .start()?;
    let fast = fast
        .with_resolver(Arc::new(AuthorityResolver::new(fx.authority.clone())))
        .start()?;
    let mut events = fast.subscribe();

    // The slow transceiver's validator is parked on its resolver, yet its
    // broadcaster keeps a 20 ms cadence.
    let mut heard = 0;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(1500);
    while heard < 5 {
        let event = tokio::time::timeout_at(deadline, events.recv()).await??;
        if let ReceiveEvent::Accepted { sender, .. } = event {
            if sender == identity("veh-slow") {
                heard += 1;
            }
        }
    }

    // Stop waits for the in-flight resolution to finish.
    let report = slow.stop().await?;
    assert!(report.emitted >= 5);
    fast.stop().await?;
    Ok(())
}
