// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! OPC UA PubSub: connections owning writer groups (publishers) and reader
//! groups (subscribers), UADP and JSON network message encodings, and the
//! pre-computed-offset realtime path.

mod connection;
mod network_message;
mod reader;
mod rt;
mod writer;

pub use connection::{PubSubConnection, UdpConnectionManager};
#[cfg(feature = "mqtt")]
pub use connection::MqttConnectionManager;
pub use network_message::{DataSetMessage, FieldEncoding, MessageEncoding, NetworkMessage};
pub use reader::{DataSetReader, ReaderGroup, SubscribedField};
pub use rt::RtNetworkMessage;
pub use writer::{
    DataSetField, DataSetWriter, FieldSource, PublishedDataSet, RtLevel, WriterGroup,
};

use uastack_types::StatusCode;

/// The state machine every PubSub entity follows.
///
/// `Disabled → PreOperational → Operational → (Paused | Error)`, where
/// `PreOperational` is entered when the underlying connection is opened but
/// not yet confirmed, and `Operational` on the first send or the
/// established callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PubSubState {
    /// The entity exists but does nothing.
    #[default]
    Disabled,
    /// Enabled, waiting for the transport to come up.
    PreOperational,
    /// Publishing or receiving.
    Operational,
    /// Temporarily stopped, e.g. because the parent is not operational.
    Paused,
    /// The entity failed; the error status says why.
    Error,
}

impl PubSubState {
    /// Validate and perform a state transition.
    pub fn transition(&mut self, target: PubSubState) -> Result<(), StatusCode> {
        use PubSubState::*;
        let valid = matches!(
            (*self, target),
            (Disabled, PreOperational)
                | (PreOperational, Operational)
                | (PreOperational, Error)
                | (PreOperational, Disabled)
                | (Operational, Paused)
                | (Operational, Error)
                | (Operational, Disabled)
                | (Paused, Operational)
                | (Paused, Disabled)
                | (Error, Disabled)
        );
        if valid {
            *self = target;
            Ok(())
        } else {
            Err(StatusCode::BadInvalidState)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_transitions() {
        let mut state = PubSubState::Disabled;
        state.transition(PubSubState::PreOperational).unwrap();
        state.transition(PubSubState::Operational).unwrap();
        state.transition(PubSubState::Paused).unwrap();
        state.transition(PubSubState::Operational).unwrap();
        state.transition(PubSubState::Disabled).unwrap();

        // Cannot go straight from Disabled to Operational
        assert_eq!(
            state.transition(PubSubState::Operational).unwrap_err(),
            StatusCode::BadInvalidState
        );
    }
}
