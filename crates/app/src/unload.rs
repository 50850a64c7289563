//! Unload hooks: what a config entry must undo when it is unloaded.

use crate::signal_bus::Subscription;

type Release = Box<dyn FnOnce() + Send>;

/// Subscriptions and release callbacks collected during setup, run on unload.
#[derive(Default)]
pub struct UnloadHooks {
    subscriptions: Vec<Subscription>,
    releases: Vec<Release>,
}

impl std::fmt::Debug for UnloadHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnloadHooks")
            .field("subscriptions", &self.subscriptions)
            .field("releases", &self.releases.len())
            .finish()
    }
}

impl UnloadHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription to disconnect on unload.
    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Register a callback releasing something other than a subscription.
    pub fn push_release(&mut self, release: impl FnOnce() + Send + 'static) {
        self.releases.push(Box::new(release));
    }

    /// Number of registered hooks of either kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len() + self.releases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disconnect every subscription, then run every release callback.
    /// Returns how many subscriptions were still live.
    pub fn run(self) -> usize {
        let count = self
            .subscriptions
            .into_iter()
            .map(Subscription::disconnect)
            .filter(|still_connected| *still_connected)
            .count();
        let releases = self.releases.len();
        for release in self.releases {
            release();
        }
        tracing::debug!(disconnected = count, releases, "unload hooks run");
        count
    }
}
