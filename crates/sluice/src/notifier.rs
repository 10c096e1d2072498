//! Notifier — wake every waiter when shared state changes.

use tokio::sync::Notify;

/// Level-triggered wake-up built on [`Notify`].
///
/// Waiters re-check their condition after every notification, so a
/// notification that fires while nobody is waiting is harmless.
#[derive(Debug, Default)]
pub struct Notifier {
    notify: Notify,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake all tasks currently suspended in [`Notifier::wait_until`].
    pub fn notify_all(&self) {
        self.notify.notify_waiters();
    }

    /// Suspend until `check` returns `Some`.
    ///
    /// The waiter is registered before `check` runs, so a notification
    /// racing with the check is never lost.
    pub async fn wait_until<T>(&self, mut check: impl FnMut() -> Option<T>) -> T {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = check() {
                return value;
            }
            notified.await;
        }
    }
}
