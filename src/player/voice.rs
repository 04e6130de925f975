use std::fmt;

use crate::model::VoiceUpdate;

/// Where a guild's voice credentials stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoicePhase {
    /// Nothing received yet
    NoSession,
    /// One half of the credentials is known
    AwaitingPeer,
    /// Session id, token and endpoint are all known
    Synchronized,
    /// The bot was removed from voice
    Disconnected,
}

/// Token and endpoint from a voice server notification.
#[derive(Clone, PartialEq, Eq)]
pub struct VoiceServer {
    pub token: String,
    pub endpoint: String,
}

impl fmt::Debug for VoiceServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceServer")
            .field("endpoint", &self.endpoint)
            .field("token", &"<secret>")
            .finish()
    }
}

/// Reconciles the two voice notifications of one guild.
///
/// Each `apply_*` returns the credentials to push when the update completed
/// the set, or changed it since the last successful push.
#[derive(Debug, Clone, Default)]
pub struct VoiceState {
    pub(crate) session_id: Option<String>,
    pub(crate) event: Option<VoiceServer>,
    pushed: Option<VoiceUpdate>,
    disconnected: bool,
}

impl VoiceState {
    pub fn phase(&self) -> VoicePhase {
        if self.disconnected {
            return VoicePhase::Disconnected;
        }

        match (&self.session_id, &self.event) {
            (Some(_), Some(_)) => VoicePhase::Synchronized,
            (None, None) => VoicePhase::NoSession,
            _ => VoicePhase::AwaitingPeer,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn server(&self) -> Option<&VoiceServer> {
        self.event.as_ref()
    }

    pub(crate) fn apply_state_update(&mut self, session_id: String) -> Option<VoiceUpdate> {
        if self.disconnected {
            return None;
        }
        self.session_id = Some(session_id);

        self.pending()
    }

    pub(crate) fn apply_server_update(&mut self, token: String, endpoint: String) -> Option<VoiceUpdate> {
        if self.disconnected {
            return None;
        }
        self.event = Some(VoiceServer { token, endpoint });

        self.pending()
    }

    /// Forgets every credential. Terminal: later notifications are ignored
    /// until the player is destroyed and created again.
    pub(crate) fn disconnect(&mut self) {
        *self = Self {
            disconnected: true,
            ..Self::default()
        };
    }

    pub(crate) fn mark_pushed(&mut self, update: VoiceUpdate) {
        self.pushed = Some(update);
    }

    fn pending(&self) -> Option<VoiceUpdate> {
        let session_id = self.session_id.as_ref()?;
        let server = self.event.as_ref()?;

        let update = VoiceUpdate {
            token: server.token.clone(),
            endpoint: server.endpoint.clone(),
            session_id: session_id.clone(),
        };

        match &self.pushed {
            Some(pushed) if *pushed == update => None,
            _ => Some(update),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_first_waits_for_session() {
        let mut state = VoiceState::default();
        assert_eq!(state.phase(), VoicePhase::NoSession);

        assert!(state.apply_server_update("tok".into(), "ep".into()).is_none());
        assert_eq!(state.phase(), VoicePhase::AwaitingPeer);

        let update = state.apply_state_update("sess".into()).unwrap();
        assert_eq!(update.session_id, "sess");
        assert_eq!(update.token, "tok");
        assert_eq!(update.endpoint, "ep");
        assert_eq!(state.phase(), VoicePhase::Synchronized);
    }

    #[test]
    fn test_unchanged_credentials_are_not_pushed_twice() {
        let mut state = VoiceState::default();
        state.apply_state_update("sess".into());
        let update = state.apply_server_update("tok".into(), "ep".into()).unwrap();
        state.mark_pushed(update);

        // mute/deaf toggles resend the same session id
        assert!(state.apply_state_update("sess".into()).is_none());
        assert!(state.apply_server_update("tok".into(), "ep".into()).is_none());
    }

    #[test]
    fn test_region_change_is_pushed() {
        let mut state = VoiceState::default();
        state.apply_state_update("sess".into());
        let first = state.apply_server_update("tok".into(), "ep".into()).unwrap();
        state.mark_pushed(first);

        let second = state.apply_server_update("tok2".into(), "ep2".into()).unwrap();
        assert_eq!(second.endpoint, "ep2");
    }

    #[test]
    fn test_failed_push_is_retried() {
        let mut state = VoiceState::default();
        state.apply_state_update("sess".into());
        assert!(state.apply_server_update("tok".into(), "ep".into()).is_some());

        // never marked as pushed
        assert!(state.apply_state_update("sess".into()).is_some());
    }

    #[test]
    fn test_disconnect_is_terminal() {
        let mut state = VoiceState::default();
        state.apply_state_update("sess".into());
        let update = state.apply_server_update("tok".into(), "ep".into()).unwrap();
        state.mark_pushed(update);

        state.disconnect();
        assert_eq!(state.phase(), VoicePhase::Disconnected);
        assert!(state.session_id().is_none());
        assert!(state.server().is_none());

        assert!(state.apply_server_update("tok".into(), "ep".into()).is_none());
        assert!(state.apply_state_update("sess2".into()).is_none());
        assert_eq!(state.phase(), VoicePhase::Disconnected);
        assert!(state.session_id().is_none());
    }
}
