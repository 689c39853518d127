use std::time::Duration;

use crate::media::{IceServer, PeerConnectionConfig};

/// Timing, routing and negotiation settings of the call state machine.
#[derive(Clone, Debug)]
pub struct CallConfig {
    /// Broker type the signaling subscription listens on.
    pub subscribe_topic: String,
    /// Broker type outbound signaling is published under; the chat socket
    /// server relays it to the room members as `subscribe_topic`.
    pub publish_topic: String,
    pub outgoing_ring_period: Duration,
    pub incoming_ring_period: Duration,
    /// Ring triggers per ringer start before it stops on its own.
    pub max_rings: u32,
    /// Countdown length of the no-answer timer, in ticks.
    pub no_answer_ticks: u32,
    pub no_answer_tick: Duration,
    pub call_timer_period: Duration,
    /// Re-publish the `request` on every no-answer tick while unanswered.
    pub reannounce_request: bool,
    /// Upper bound of remembered message ids.
    pub dedup_capacity: usize,
    pub peer_connection: PeerConnectionConfig,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            subscribe_topic: "call".to_string(),
            publish_topic: "sent".to_string(),
            outgoing_ring_period: Duration::from_secs(5),
            incoming_ring_period: Duration::from_secs(12),
            max_rings: 20,
            no_answer_ticks: 30,
            no_answer_tick: Duration::from_secs(1),
            call_timer_period: Duration::from_secs(1),
            reannounce_request: false,
            dedup_capacity: 4096,
            peer_connection: PeerConnectionConfig::default(),
        }
    }
}

impl CallConfig {
    /// Default settings plus the TURN server configured in the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        config
            .peer_connection
            .ice_servers
            .extend(IceServer::turn_from_lookup(lookup));
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_call_timing() {
        let config = CallConfig::default();
        assert_eq!(config.outgoing_ring_period, Duration::from_secs(5));
        assert_eq!(config.incoming_ring_period, Duration::from_secs(12));
        assert_eq!(config.no_answer_ticks, 30);
        assert!(config.peer_connection.ice_servers.is_empty());
    }

    #[test]
    fn test_turn_server_added_from_lookup() {
        let config = CallConfig::from_lookup(|key| match key {
            "TURN_SERVER_URL" => Some("turn:turn.example.com:3478".to_string()),
            "TURN_SERVER_USERNAME" => Some("alice".to_string()),
            _ => None,
        });
        assert_eq!(config.peer_connection.ice_servers.len(), 1);
        let server = &config.peer_connection.ice_servers[0];
        assert_eq!(server.urls, vec!["turn:turn.example.com:3478".to_string()]);
        assert_eq!(server.username.as_deref(), Some("alice"));
        assert!(server.credential.is_none());

        let without = CallConfig::from_lookup(|_| None);
        assert!(without.peer_connection.ice_servers.is_empty());
    }

    #[test]
    fn test_from_env_keeps_defaults() {
        let config = CallConfig::from_env();
        assert_eq!(config.subscribe_topic, "call");
        assert_eq!(config.publish_topic, "sent");
        assert!(config.peer_connection.ice_servers.len() <= 1);
    }
}
