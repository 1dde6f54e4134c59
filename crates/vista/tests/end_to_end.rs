//! End-to-end: authority issues, transceivers broadcast and validate.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast;
use vista::transceiver::link::memory::RadioMedium;
use vista::transceiver::Link;
use vista::{
    AuthorityResolver, Identity, ReceiveEvent, ResolutionPolicy, TransceiverState,
    ValidationError,
};
use vista_testkit::{fast_config, identity, squitter, AuthorityFixture};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn next_event(rx: &mut broadcast::Receiver<ReceiveEvent>) -> anyhow::Result<ReceiveEvent> {
    Ok(tokio::time::timeout(Duration::from_secs(5), rx.recv()).await??)
}

async fn next_accepted_from(
    rx: &mut broadcast::Receiver<ReceiveEvent>,
    who: &Identity,
) -> anyhow::Result<u64> {
    loop {
        if let ReceiveEvent::Accepted { sender, seq, .. } = next_event(rx).await? {
            if &sender == who {
                return Ok(seq);
            }
        }
    }
}

#[tokio::test]
async fn test_credential_lifecycle_end_to_end() -> anyhow::Result<()> {
    init_tracing();
    let fx = AuthorityFixture::new();
    let medium = RadioMedium::new();
    let resolver = Arc::new(AuthorityResolver::new(fx.authority.clone()));
    let config = fast_config(ResolutionPolicy::OnDemand);

    // 600 s credentials issued at t=1000.
    let (vehicle, credential) = fx
        .loaded_transceiver("veh-42", 600, medium.attach(), config.clone())
        .await;
    let (peer, _) = fx
        .loaded_transceiver("veh-7", 600, medium.attach(), config)
        .await;
    assert_eq!(credential.not_before, 1000);
    assert_eq!(credential.not_after, 1600);
    assert!(credential.verify(&fx.public_key()));

    fx.clock.set_secs(1001);
    let peer = peer.with_resolver(resolver.clone()).start()?;
    let mut events = peer.subscribe();
    let vehicle = vehicle.with_resolver(resolver).start()?;
    vehicle.set_payload(Bytes::from_static(b"lat=37.7749,lon=-122.4194"))?;

    // Squitter #1 at t=1001 is accepted by the peer.
    let seq = next_accepted_from(&mut events, &identity("veh-42")).await?;
    assert_eq!(seq, 1);
    let entry = peer.peer(&identity("veh-42")).expect("peer entry");
    assert_eq!(entry.credential_id, credential.id());
    assert_eq!(entry.public_key, credential.public_key);

    // At t=1601 the next tick finds the credential expired.
    fx.clock.set_secs(1601);
    let mut state = vehicle.watch_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == TransceiverState::Expired),
    )
    .await??;

    // Nothing more is emitted.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut late = peer.subscribe();
    tokio::time::sleep(Duration::from_millis(200)).await;
    loop {
        match late.try_recv() {
            Ok(ReceiveEvent::Accepted { sender, .. }) | Ok(ReceiveEvent::Rejected { sender: Some(sender), .. }) => {
                assert_ne!(sender, identity("veh-42"), "squitter emitted after expiry");
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    let report = vehicle.stop().await?;
    assert!(report.emitted >= 1);
    assert_eq!(report.last_seq, report.emitted);
    assert!(report.suppressed >= 1);
    peer.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_replayed_frames_rejected() -> anyhow::Result<()> {
    init_tracing();
    let fx = AuthorityFixture::new();
    let medium = RadioMedium::new();
    fx.clock.set_secs(1001);

    let (listener, _) = fx
        .loaded_transceiver(
            "veh-7",
            600,
            medium.attach(),
            fast_config(ResolutionPolicy::CacheOnly),
        )
        .await;
    let sender = fx.authorize("veh-9", 600).await;
    listener.seed_credentials([sender.credential.clone()]);
    let listener = listener.start()?;
    let mut events = listener.subscribe();

    // A raw radio that plays back a duplicated sequence.
    let radio = medium.attach();
    let now = 1_001_000;
    for seq in [1, 2, 2, 3] {
        let msg = squitter(&sender.credential, &sender.secret_key, seq, now, Bytes::new());
        radio.send(Bytes::from(msg.to_bytes())).await?;
    }

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    while accepted.len() + rejected.len() < 4 {
        match next_event(&mut events).await? {
            ReceiveEvent::Accepted { seq, .. } => accepted.push(seq),
            ReceiveEvent::Rejected { error, .. } => rejected.push(error),
        }
    }
    assert_eq!(accepted, vec![1, 2, 3]);
    assert_eq!(rejected, vec![ValidationError::Replay { last: 2, got: 2 }]);

    let report = listener.stop().await?;
    assert_eq!(report.accepted, 3);
    assert_eq!(report.rejected.replay, 1);
    Ok(())
}

#[tokio::test]
async fn test_garbage_and_forged_frames_change_nothing() -> anyhow::Result<()> {
    init_tracing();
    let fx = AuthorityFixture::new();
    let medium = RadioMedium::new();
    fx.clock.set_secs(1001);

    let (listener, _) = fx
        .loaded_transceiver(
            "veh-7",
            600,
            medium.attach(),
            fast_config(ResolutionPolicy::CacheOnly),
        )
        .await;
    let sender = fx.authorize("veh-9", 600).await;
    listener.seed_credentials([sender.credential.clone()]);
    let listener = listener.start()?;
    let mut events = listener.subscribe();

    let radio = medium.attach();
    radio.send(Bytes::from_static(b"\x00\x00\x00\xffnot a squitter")).await?;

    let impostor = vista::SecretKey::from_seed(&[0x77; 32]);
    let forged = squitter(&sender.credential, &impostor, 1, 1_001_000, Bytes::new());
    radio.send(Bytes::from(forged.to_bytes())).await?;

    let mut errors = Vec::new();
    while errors.len() < 2 {
        if let ReceiveEvent::Rejected { error, .. } = next_event(&mut events).await? {
            errors.push(error);
        }
    }
    assert!(matches!(errors[0], ValidationError::Malformed(_)));
    assert_eq!(errors[1], ValidationError::SignatureVerification("squitter"));
    assert!(listener.peer(&identity("veh-9")).is_none());

    listener.stop().await?;
    Ok(())
}
