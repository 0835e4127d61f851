//! Caller-initiated cancellation of a running operation.
//!
//! The CLI raises the interrupt on Ctrl-C; library callers that never cancel
//! pass [`Interrupt::never`].

use std::time::Duration;

use tokio::sync::watch;

/// Receiving side, checked by the correlator and the poll loop.
#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: watch::Receiver<bool>,
}

/// Sending side, held by whoever may cancel.
#[derive(Debug)]
pub struct InterruptHandle {
    tx: watch::Sender<bool>,
}

/// Create a connected handle/interrupt pair.
#[must_use]
pub fn channel() -> (InterruptHandle, Interrupt) {
    let (tx, rx) = watch::channel(false);
    (InterruptHandle { tx }, Interrupt { rx })
}

impl InterruptHandle {
    pub fn raise(&self) {
        self.tx.send_replace(true);
    }
}

impl Interrupt {
    /// An interrupt that is never raised.
    #[must_use]
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once raised. Pends forever if the handle is dropped unraised.
    pub async fn raised(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `duration`. Returns `false` if interrupted first.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(duration) => true,
            () = self.raised() => false,
        }
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::never()
    }
}
