//! Adapter lifecycle state machine.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use upup_common::{Error, ProviderKind, Result};

/// Lifecycle state of one adapter instance.
///
/// ```text
/// Unauthenticated -> Authenticating -> Authenticated -> Listing -> Ready
///        ^                 |                                       |  ^
///        +-----------------+ (auth failure)            Uploading <-+  |
///                                                          +----------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    /// No session.
    Unauthenticated,
    /// Waiting on the user or the provider to complete authentication.
    Authenticating,
    /// Session established, nothing listed yet.
    Authenticated,
    /// Waiting on the first listing page.
    Listing,
    /// Files listed; selection and upload allowed.
    Ready,
    /// Transferring selected files.
    Uploading,
    /// The adapter has no implementation for the requested operation.
    NotImplemented,
}

impl AdapterState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: AdapterState) -> bool {
        use AdapterState::*;

        match (self, next) {
            (Unauthenticated, Authenticating) => true,
            (Authenticating, Authenticated | Unauthenticated) => true,
            (Authenticated, Listing | Authenticating) => true,
            (Listing, Ready | Authenticated) => true,
            (Ready, Listing | Uploading | Authenticating) => true,
            (Uploading, Ready | Authenticating) => true,
            (NotImplemented, Authenticating) => true,
            (Authenticated | Ready, NotImplemented) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdapterState::Unauthenticated => "unauthenticated",
            AdapterState::Authenticating => "authenticating",
            AdapterState::Authenticated => "authenticated",
            AdapterState::Listing => "listing",
            AdapterState::Ready => "ready",
            AdapterState::Uploading => "uploading",
            AdapterState::NotImplemented => "not_implemented",
        };
        f.write_str(name)
    }
}

/// State holder enforcing legal transitions for one adapter.
#[derive(Debug, Clone)]
pub struct StateMachine {
    provider: ProviderKind,
    state: AdapterState,
}

impl StateMachine {
    /// Start in `Unauthenticated`.
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            state: AdapterState::Unauthenticated,
        }
    }

    /// Current state.
    pub fn current(&self) -> AdapterState {
        self.state
    }

    /// Move to `next`.
    ///
    /// # Errors
    /// - `Error::InvalidState` if the transition is not allowed; the state
    ///   is left unchanged
    pub fn transition(&mut self, next: AdapterState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidState(format!(
                "{} adapter cannot go from {} to {}",
                self.provider, self.state, next
            )));
        }
        debug!(provider = %self.provider, from = %self.state, to = %next, "Adapter state change");
        self.state = next;
        Ok(())
    }

    /// Fail unless the adapter is in `expected`.
    pub fn require(&self, expected: AdapterState, operation: &str) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState(format!(
                "{} requires {} {} adapter, but it is {}",
                operation, expected, self.provider, self.state
            )));
        }
        Ok(())
    }

    /// Drop an in-flight authentication, listing or upload.
    ///
    /// `Authenticating` falls back to `Unauthenticated`, `Listing` to
    /// `Authenticated` and `Uploading` to `Ready`; other states are kept.
    pub fn abandon(&mut self) {
        let previous = self.state;
        self.state = match previous {
            AdapterState::Authenticating => AdapterState::Unauthenticated,
            AdapterState::Listing => AdapterState::Authenticated,
            AdapterState::Uploading => AdapterState::Ready,
            other => other,
        };
        if previous != self.state {
            debug!(provider = %self.provider, from = %previous, to = %self.state, "Adapter operation abandoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut machine = StateMachine::new(ProviderKind::GoogleDrive);
        for next in [
            AdapterState::Authenticating,
            AdapterState::Authenticated,
            AdapterState::Listing,
            AdapterState::Ready,
            AdapterState::Uploading,
            AdapterState::Ready,
        ] {
            machine.transition(next).unwrap();
        }
        assert_eq!(machine.current(), AdapterState::Ready);
    }

    #[test]
    fn test_auth_failure_returns_to_unauthenticated() {
        let mut machine = StateMachine::new(ProviderKind::OneDrive);
        machine.transition(AdapterState::Authenticating).unwrap();
        machine.transition(AdapterState::Unauthenticated).unwrap();
        machine.transition(AdapterState::Authenticating).unwrap();
    }

    #[test]
    fn test_illegal_transition_keeps_state() {
        let mut machine = StateMachine::new(ProviderKind::ObjectStorage);
        let err = machine.transition(AdapterState::Uploading).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(machine.current(), AdapterState::Unauthenticated);
    }

    #[test]
    fn test_abandon() {
        let mut machine = StateMachine::new(ProviderKind::GoogleDrive);
        machine.transition(AdapterState::Authenticating).unwrap();
        machine.abandon();
        assert_eq!(machine.current(), AdapterState::Unauthenticated);

        machine.transition(AdapterState::Authenticating).unwrap();
        machine.transition(AdapterState::Authenticated).unwrap();
        machine.transition(AdapterState::Listing).unwrap();
        machine.abandon();
        assert_eq!(machine.current(), AdapterState::Authenticated);

        machine.abandon();
        assert_eq!(machine.current(), AdapterState::Authenticated);

        machine.transition(AdapterState::Listing).unwrap();
        machine.transition(AdapterState::Ready).unwrap();
        machine.transition(AdapterState::Uploading).unwrap();
        machine.abandon();
        assert_eq!(machine.current(), AdapterState::Ready);
    }

    #[test]
    fn test_no_state_is_stuck() {
        use AdapterState::*;
        for state in [
            Unauthenticated,
            Authenticating,
            Authenticated,
            Listing,
            Ready,
            Uploading,
            NotImplemented,
        ] {
            let mut machine = StateMachine {
                provider: ProviderKind::GoogleDrive,
                state,
            };
            machine.abandon();
            let current = machine.current();
            assert!(
                current == Unauthenticated || current.can_transition_to(Authenticating),
                "{state} cannot get back to authenticating"
            );
        }
    }

    #[test]
    fn test_not_implemented_is_not_terminal() {
        assert!(AdapterState::Authenticated.can_transition_to(AdapterState::NotImplemented));
        assert!(AdapterState::NotImplemented.can_transition_to(AdapterState::Authenticating));
        assert!(!AdapterState::NotImplemented.can_transition_to(AdapterState::Ready));
    }

    #[test]
    fn test_require() {
        let machine = StateMachine::new(ProviderKind::GoogleDrive);
        assert!(machine.require(AdapterState::Unauthenticated, "authenticate").is_ok());
        assert!(machine.require(AdapterState::Ready, "select").is_err());
    }
}
