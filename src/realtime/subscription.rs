use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use super::RealtimeError;

/// Handle to a background listener.
///
/// The listener runs until [`Subscription::dispose`] is awaited or the
/// handle is dropped (which aborts it). Owners must keep the handle alive
/// for exactly as long as they want updates.
#[derive(Debug)]
pub struct Subscription {
    name: String,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawn `listener` on the current runtime. It receives the stop signal
    /// and should return soon after it fires.
    pub(crate) fn spawn<F, Fut>(name: impl Into<String>, listener: F) -> Result<Self, RealtimeError>
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RealtimeError::NoRuntime)?;
        let (stop, stop_rx) = oneshot::channel();
        let name = name.into();
        debug!(subscription = %name, "listener started");
        Ok(Self {
            handle: Some(runtime.spawn(listener(stop_rx))),
            stop: Some(stop),
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// False once the listener returned on its own (e.g. its channel closed).
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the listener and wait for it to finish.
    pub async fn dispose(mut self) {
        if let Some(stop) = self.stop.take() {
            // Already finished if the receiver is gone.
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        debug!(subscription = %self.name, "listener disposed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
