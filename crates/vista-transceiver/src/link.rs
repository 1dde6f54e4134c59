//! Link abstraction for squitter frames.
//!
//! A link moves opaque frames. It makes no delivery or ordering promises;
//! everything above it tolerates loss, duplication, and reordering.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::LinkError;

/// Result type for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// A broadcast link.
///
/// Implementations must be usable from two tasks at once: the broadcaster
/// sends while the validator receives.
#[async_trait]
pub trait Link: Send + Sync {
    /// Broadcast a frame to whoever is listening.
    async fn send(&self, frame: Bytes) -> Result<()>;

    /// Receive the next frame.
    ///
    /// Must be cancel safe: dropping the future loses no frame.
    async fn recv(&self) -> Result<Bytes>;
}

/// An in-process radio medium.
///
/// Every frame sent by one attached link is delivered to all the others.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, RwLock};
    use tokio::sync::{mpsc, Mutex};

    use vista_core::MAX_SQUITTER_LEN;

    /// Default per-link queue depth.
    pub const DEFAULT_QUEUE_DEPTH: usize = 1000;

    /// Shared state for the medium.
    pub struct RadioMedium {
        /// Inbound queue of each attached link.
        receivers: RwLock<HashMap<u64, mpsc::Sender<Bytes>>>,
        next_id: AtomicU64,
        queue_depth: usize,
    }

    impl RadioMedium {
        /// Create a new medium.
        pub fn new() -> Arc<Self> {
            Self::with_queue_depth(DEFAULT_QUEUE_DEPTH)
        }

        /// Create a medium whose links buffer at most `depth` frames.
        pub fn with_queue_depth(depth: usize) -> Arc<Self> {
            Arc::new(Self {
                receivers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                queue_depth: depth.max(1),
            })
        }

        /// Attach a new link to this medium.
        pub fn attach(self: &Arc<Self>) -> MemoryLink {
            let (tx, rx) = mpsc::channel(self.queue_depth);
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);

            self.receivers
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(id, tx);

            MemoryLink {
                id,
                medium: Arc::clone(self),
                receiver: Mutex::new(rx),
            }
        }

        /// Number of attached links.
        pub fn attached(&self) -> usize {
            self.receivers.read().unwrap_or_else(|e| e.into_inner()).len()
        }

        fn detach(&self, id: u64) {
            self.receivers
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
        }
    }

    /// A link attached to a [`RadioMedium`]. Detaches on drop.
    pub struct MemoryLink {
        id: u64,
        medium: Arc<RadioMedium>,
        receiver: Mutex<mpsc::Receiver<Bytes>>,
    }

    #[async_trait]
    impl Link for MemoryLink {
        async fn send(&self, frame: Bytes) -> Result<()> {
            if frame.len() > MAX_SQUITTER_LEN {
                return Err(LinkError::FrameTooLarge {
                    len: frame.len(),
                    max: MAX_SQUITTER_LEN,
                });
            }

            let receivers = self
                .medium
                .receivers
                .read()
                .unwrap_or_else(|e| e.into_inner());
            if !receivers.contains_key(&self.id) {
                return Err(LinkError::Closed);
            }

            for (id, tx) in receivers.iter() {
                if *id == self.id {
                    continue;
                }
                if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(frame.clone()) {
                    tracing::warn!(link = id, "receive queue full, dropping frame");
                }
            }
            Ok(())
        }

        async fn recv(&self) -> Result<Bytes> {
            let mut rx = self.receiver.lock().await;
            rx.recv().await.ok_or(LinkError::Closed)
        }
    }

    impl Drop for MemoryLink {
        fn drop(&mut self) {
            self.medium.detach(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::RadioMedium;
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_broadcast_reaches_every_other_link() {
        let medium = RadioMedium::new();
        let a = medium.attach();
        let b = medium.attach();
        let c = medium.attach();

        a.send(Bytes::from_static(b"ping")).await.unwrap();

        assert_eq!(b.recv().await.unwrap(), Bytes::from_static(b"ping"));
        assert_eq!(c.recv().await.unwrap(), Bytes::from_static(b"ping"));

        // The sender does not hear itself.
        let own = tokio::time::timeout(Duration::from_millis(50), a.recv()).await;
        assert!(own.is_err());
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let medium = RadioMedium::with_queue_depth(2);
        let a = medium.attach();
        let b = medium.attach();

        for i in 0..5u8 {
            a.send(Bytes::from(vec![i])).await.unwrap();
        }

        assert_eq!(b.recv().await.unwrap(), Bytes::from(vec![0u8]));
        assert_eq!(b.recv().await.unwrap(), Bytes::from(vec![1u8]));
        let extra = tokio::time::timeout(Duration::from_millis(50), b.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let medium = RadioMedium::new();
        let a = medium.attach();
        let frame = Bytes::from(vec![0u8; vista_core::MAX_SQUITTER_LEN + 1]);
        assert!(matches!(
            a.send(frame).await,
            Err(LinkError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_drop_detaches() {
        let medium = RadioMedium::new();
        let a = medium.attach();
        {
            let _b = medium.attach();
            assert_eq!(medium.attached(), 2);
        }
        assert_eq!(medium.attached(), 1);
        a.send(Bytes::from_static(b"alone")).await.unwrap();
    }
}
