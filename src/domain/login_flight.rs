use tokio::sync::watch;

/// One interactive login attempt shared by every caller that needs it.
///
/// Resolved at most once; waiters observe the same outcome. Dropping the
/// flight unresolved counts as a failed login.
#[derive(Debug)]
pub struct LoginFlight {
    tx: watch::Sender<Option<bool>>,
}

impl LoginFlight {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        LoginFlight { tx }
    }

    pub fn waiter(&self) -> LoginWaiter {
        LoginWaiter {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of waiters still attached.
    pub fn waiting(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn complete(self, success: bool) {
        self.tx.send_replace(Some(success));
    }
}

impl Default for LoginFlight {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct LoginWaiter {
    rx: watch::Receiver<Option<bool>>,
}

impl LoginWaiter {
    pub async fn outcome(mut self) -> bool {
        match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => {
                let outcome = *outcome;
                outcome.unwrap_or(false)
            }
            Err(_) => false, // abandoned
        }
    }
}
