//! Wallet readiness.
//!
//! Submissions are only allowed once two flags are set:
//! - the signer is connected and able to sign
//! - asset metadata has been loaded at least once
//!
//! Changes are broadcast over a watch channel.

use std::sync::atomic::{AtomicBool, Ordering};

use quoter_core::WalletStatus;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Readiness gate consulted before every order or cancel submission.
#[derive(Debug)]
pub struct WalletReadiness {
    /// Signer is connected.
    signer_ready: AtomicBool,
    /// Metadata cache has been populated.
    metadata_loaded: AtomicBool,
    tx: watch::Sender<bool>,
}

impl WalletReadiness {
    /// Create a gate with both flags cleared.
    #[must_use]
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        let readiness = Self {
            signer_ready: AtomicBool::new(false),
            metadata_loaded: AtomicBool::new(false),
            tx,
        };
        (readiness, rx)
    }

    /// Create a gate with both flags already set.
    #[must_use]
    pub fn ready() -> Self {
        let (readiness, _rx) = Self::new();
        readiness.set_signer_ready(true);
        readiness.set_metadata_loaded(true);
        readiness
    }

    pub fn set_signer_ready(&self, ready: bool) {
        let old = self.signer_ready.swap(ready, Ordering::SeqCst);
        if old != ready {
            debug!(signer_ready = ready, "Signer ready flag changed");
            self.notify_change();
        }
    }

    pub fn set_metadata_loaded(&self, loaded: bool) {
        let old = self.metadata_loaded.swap(loaded, Ordering::SeqCst);
        if old != loaded {
            debug!(metadata_loaded = loaded, "Metadata loaded flag changed");
            self.notify_change();
        }
    }

    /// Returns (signer_ready, metadata_loaded).
    #[must_use]
    pub fn flags(&self) -> (bool, bool) {
        (
            self.signer_ready.load(Ordering::SeqCst),
            self.metadata_loaded.load(Ordering::SeqCst),
        )
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Wait until both flags are set.
    pub async fn wait_until_ready(&self) {
        if self.is_ready() {
            return;
        }

        let mut rx = self.tx.subscribe();
        loop {
            if rx.changed().await.is_err() {
                warn!("WalletReadiness sender dropped while waiting");
                return;
            }
            if *rx.borrow() {
                return;
            }
        }
    }

    fn notify_change(&self) {
        let ready = self.is_ready();
        let (signer_ready, metadata_loaded) = self.flags();

        if ready {
            info!("Wallet ready, submissions enabled");
        } else {
            debug!(signer_ready, metadata_loaded, "Wallet readiness updated");
        }

        // No receivers is fine
        let _ = self.tx.send(ready);
    }
}

impl WalletStatus for WalletReadiness {
    fn is_ready(&self) -> bool {
        self.signer_ready.load(Ordering::SeqCst) && self.metadata_loaded.load(Ordering::SeqCst)
    }
}

impl Default for WalletReadiness {
    fn default() -> Self {
        Self::new().0
    }
}
