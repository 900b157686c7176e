use tokio::sync::watch;

/// Run-wide stop signal shared by the dispatcher, its workers and the
/// reporter.
///
/// Firing is idempotent and observers that subscribe after the signal fired
/// still see it.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: watch::Sender<bool>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn fire(&self) {
        self.tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal has fired.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        drop(rx.wait_for(|stopped| *stopped).await);
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
