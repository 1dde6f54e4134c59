//! Transceiver lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle of a transceiver.
///
/// ```text
/// Uninitialized --load_credential--> Authorized --start--> Active
///                                                            |
///                                          (tick past window) v
///                               Stopped <------stop------- Expired
///                                  ^                          |
///                                  +----------stop------------+ (also from Active)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransceiverState {
    Uninitialized,
    Authorized,
    Active,
    Expired,
    Stopped,
}

impl TransceiverState {
    /// Whether the broadcaster and validator tasks are running.
    pub fn is_running(self) -> bool {
        matches!(self, TransceiverState::Active | TransceiverState::Expired)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: TransceiverState) -> bool {
        use TransceiverState::*;
        matches!(
            (self, next),
            (Uninitialized, Authorized)
                | (Authorized, Active)
                | (Active, Expired)
                | (Active, Stopped)
                | (Expired, Stopped)
        )
    }
}
