//! Upload gate and key tracking.
//!
//! [`UploadGate`] is the single owner of the `upload-enabled` flag and of
//! the ordered log of object keys produced by completed uploads. Clones are
//! cheap handles onto the same state.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info};

use upup_common::{Error, ProviderKind, Result};

/// Number of most recent events kept in the journal.
pub const EVENT_JOURNAL_CAPACITY: usize = 1024;

/// Entry in the gate's event journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// Uploads were enabled.
    Enabled,
    /// Uploads were disabled.
    Disabled,
    /// An adapter started transferring a file.
    TransferStarted {
        provider: ProviderKind,
        file_name: String,
    },
    /// A completed upload registered its key.
    KeyRecorded(String),
}

#[derive(Debug, Default)]
struct GateState {
    enabled: bool,
    keys: Vec<String>,
    events: VecDeque<GateEvent>,
}

impl GateState {
    fn journal(&mut self, event: GateEvent) {
        if self.events.len() == EVENT_JOURNAL_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Apply a new flag value, returning whether it changed.
    fn apply(&mut self, enabled: bool) -> bool {
        if self.enabled == enabled {
            return false;
        }
        self.enabled = enabled;
        self.journal(if enabled {
            GateEvent::Enabled
        } else {
            GateEvent::Disabled
        });
        true
    }
}

#[derive(Debug)]
struct GateInner {
    state: Mutex<GateState>,
    notifier: watch::Sender<bool>,
}

/// Shared handle onto the upload flag and the key log.
///
/// Starts disabled with an empty log. The log is append-only and lives as
/// long as the last handle.
#[derive(Debug, Clone)]
pub struct UploadGate {
    inner: Arc<GateInner>,
}

impl UploadGate {
    /// Create a closed gate with an empty key log.
    pub fn new() -> Self {
        let (notifier, _) = watch::channel(false);
        Self {
            inner: Arc::new(GateInner {
                state: Mutex::new(GateState::default()),
                notifier,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether adapters may currently start transfers.
    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Open or close the gate.
    pub fn set_enabled(&self, enabled: bool) {
        self.update(|_| enabled);
    }

    /// Update the flag from its previous value.
    ///
    /// `f` runs under the gate lock, so concurrent updates never lose a
    /// toggle. It must not call back into the gate.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(bool) -> bool,
    {
        let mut state = self.lock();
        let enabled = f(state.enabled);
        if !state.apply(enabled) {
            return;
        }
        // Sent under the lock so notifications follow journal order.
        self.inner.notifier.send_replace(enabled);
        drop(state);

        info!(enabled, "Upload gate toggled");
    }

    /// Watch the flag for changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.notifier.subscribe()
    }

    /// Wait until the gate is open.
    pub async fn wait_until_enabled(&self) -> Result<()> {
        let mut receiver = self.subscribe();
        receiver
            .wait_for(|enabled| *enabled)
            .await
            .map_err(|_| Error::InvalidState("Upload gate dropped".to_string()))?;
        Ok(())
    }

    /// Claim permission to start one transfer.
    ///
    /// Check and journal entry happen under one lock, so a transfer can
    /// never be recorded as started while the gate is closed.
    ///
    /// # Errors
    /// - `Error::UploadDisabled` if the gate is closed
    pub fn begin_transfer(&self, provider: ProviderKind, file_name: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.enabled {
            return Err(Error::UploadDisabled(format!(
                "{} cannot transfer '{}' while uploads are disabled",
                provider, file_name
            )));
        }
        state.journal(GateEvent::TransferStarted {
            provider,
            file_name: file_name.to_string(),
        });
        debug!(%provider, file_name, "Transfer started");
        Ok(())
    }

    /// Append the key of a completed upload.
    ///
    /// # Errors
    /// - Empty key; the log is left untouched
    pub fn record_key(&self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::InvalidInput("Object key cannot be empty".to_string()));
        }
        let mut state = self.lock();
        state.keys.push(key.clone());
        state.journal(GateEvent::KeyRecorded(key.clone()));
        info!(key = %key, total = state.keys.len(), "Recorded object key");
        Ok(())
    }

    /// Snapshot of the key log, in completion order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys.clone()
    }

    /// Number of recorded keys.
    pub fn key_count(&self) -> usize {
        self.lock().keys.len()
    }

    /// Snapshot of the event journal, oldest first.
    ///
    /// Only the last [`EVENT_JOURNAL_CAPACITY`] events are kept. The key
    /// log itself is never trimmed.
    pub fn events(&self) -> Vec<GateEvent> {
        self.lock().events.iter().cloned().collect()
    }
}

impl Default for UploadGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_gate_starts_closed_and_empty() {
        let gate = UploadGate::new();
        assert!(!gate.is_enabled());
        assert!(gate.keys().is_empty());
        assert!(gate.events().is_empty());
    }

    #[test]
    fn test_record_key_preserves_order() {
        let gate = UploadGate::new();
        gate.record_key("a").unwrap();
        gate.record_key("b").unwrap();
        assert_eq!(gate.keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_keys_are_kept() {
        let gate = UploadGate::new();
        gate.record_key("a").unwrap();
        gate.record_key("a").unwrap();
        assert_eq!(gate.key_count(), 2);
    }

    #[test]
    fn test_empty_key_rejected() {
        let gate = UploadGate::new();
        assert!(matches!(gate.record_key(""), Err(Error::InvalidInput(_))));
        assert!(gate.keys().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let gate = UploadGate::new();
        let other = gate.clone();
        other.set_enabled(true);
        other.record_key("k").unwrap();
        assert!(gate.is_enabled());
        assert_eq!(gate.keys(), vec!["k"]);
    }

    #[test]
    fn test_toggle_journals_only_changes() {
        let gate = UploadGate::new();
        gate.set_enabled(false);
        gate.set_enabled(true);
        gate.set_enabled(true);
        gate.update(|enabled| !enabled);
        assert_eq!(gate.events(), vec![GateEvent::Enabled, GateEvent::Disabled]);
    }

    #[test]
    fn test_begin_transfer_requires_enabled() {
        let gate = UploadGate::new();
        let err = gate
            .begin_transfer(ProviderKind::GoogleDrive, "a.png")
            .unwrap_err();
        assert!(matches!(err, Error::UploadDisabled(_)));
        assert!(gate.events().is_empty());

        gate.set_enabled(true);
        gate.begin_transfer(ProviderKind::GoogleDrive, "a.png").unwrap();
        assert_eq!(
            gate.events(),
            vec![
                GateEvent::Enabled,
                GateEvent::TransferStarted {
                    provider: ProviderKind::GoogleDrive,
                    file_name: "a.png".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_concurrent_updates_never_lose_a_toggle() {
        let gate = UploadGate::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || {
                    for _ in 0..125 {
                        gate.update(|enabled| !enabled);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // 1000 flips from closed end closed, with every flip journalled.
        assert!(!gate.is_enabled());
        let toggles = gate
            .events()
            .iter()
            .filter(|event| matches!(event, GateEvent::Enabled | GateEvent::Disabled))
            .count();
        assert_eq!(toggles, 1000);
    }

    #[test]
    fn test_journal_is_bounded_but_keys_are_not() {
        let gate = UploadGate::new();
        gate.set_enabled(true);
        let total = EVENT_JOURNAL_CAPACITY + 10;
        for i in 0..total {
            gate.begin_transfer(ProviderKind::ObjectStorage, "f").unwrap();
            gate.record_key(format!("k{i}")).unwrap();
        }

        let events = gate.events();
        assert_eq!(events.len(), EVENT_JOURNAL_CAPACITY);
        assert_eq!(
            events.last(),
            Some(&GateEvent::KeyRecorded(format!("k{}", total - 1)))
        );
        assert_eq!(gate.key_count(), total);
        assert_eq!(gate.keys()[0], "k0");
    }

    #[tokio::test]
    async fn test_wait_until_enabled() {
        let gate = UploadGate::new();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_until_enabled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        gate.set_enabled(true);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_subscribe_sees_latest_value() {
        let gate = UploadGate::new();
        let receiver = gate.subscribe();
        gate.set_enabled(true);
        assert!(*receiver.borrow());
    }

    proptest! {
        #[test]
        fn prop_key_log_matches_call_order(keys in proptest::collection::vec("[a-z0-9/._-]{1,16}", 0..32)) {
            let gate = UploadGate::new();
            for key in &keys {
                gate.record_key(key.clone()).unwrap();
            }
            prop_assert_eq!(gate.keys(), keys);
        }

        #[test]
        fn prop_transfers_only_follow_enable(toggles in proptest::collection::vec(any::<Option<bool>>(), 0..40)) {
            // Some(flag) toggles the gate, None attempts a transfer.
            let gate = UploadGate::new();
            for toggle in toggles {
                match toggle {
                    Some(flag) => gate.set_enabled(flag),
                    None => {
                        let _ = gate.begin_transfer(ProviderKind::ObjectStorage, "f");
                    }
                }
            }

            let mut open = false;
            for event in gate.events() {
                match event {
                    GateEvent::Enabled => open = true,
                    GateEvent::Disabled => open = false,
                    GateEvent::TransferStarted { .. } => prop_assert!(open),
                    GateEvent::KeyRecorded(_) => {}
                }
            }
        }
    }
}
