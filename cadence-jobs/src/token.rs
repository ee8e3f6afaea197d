//! One-shot stop token scoped to a single run.
//!
//! A token is created when a run starts and closed when it settles. The
//! outer caller fires it at most once; the work function may subscribe to it
//! at most once and answer the request with an acknowledgment value.

use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

#[derive(Default)]
struct TokenState {
    fired: bool,
    closed: bool,
    subscribed: bool,
    request: Option<StopRequest>,
}

/// Stop token for one run.
#[derive(Clone)]
pub(crate) struct StopToken {
    state: Arc<Mutex<TokenState>>,
    wake: CancellationToken,
}

impl StopToken {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TokenState::default())),
            wake: CancellationToken::new(),
        }
    }

    /// Fire the token.
    ///
    /// Only the first call on an open token raises a request; later calls,
    /// and calls after the run settled, get an acknowledgment that resolves
    /// to `None` right away.
    pub(crate) fn fire(&self) -> StopAck {
        let mut state = self.state.lock();
        if state.fired || state.closed {
            return StopAck::idle();
        }

        let (tx, rx) = oneshot::channel();
        state.fired = true;
        state.request = Some(StopRequest { ack: Some(tx) });
        drop(state);

        self.wake.cancel();
        StopAck::pending(rx)
    }

    /// Mark the run as settled and wake any listener that is still waiting.
    ///
    /// A request raised before closing stays available to the listener.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.wake.cancel();
    }

    /// Whether a stop was requested for this run.
    pub(crate) fn is_fired(&self) -> bool {
        self.state.lock().fired
    }

    /// Resolves once the token fires or closes.
    pub(crate) fn woken(&self) -> WaitForCancellationFuture<'_> {
        self.wake.cancelled()
    }

    pub(crate) fn subscribe(&self) -> Option<StopListener> {
        let mut state = self.state.lock();
        if state.subscribed {
            return None;
        }
        state.subscribed = true;
        Some(StopListener {
            token: self.clone(),
        })
    }

    pub(crate) fn same_run(&self, other: &StopToken) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl std::fmt::Debug for StopToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StopToken")
            .field("fired", &state.fired)
            .field("closed", &state.closed)
            .finish()
    }
}

/// The work function's single subscription to its run's stop token.
#[derive(Debug)]
pub struct StopListener {
    token: StopToken,
}

impl StopListener {
    /// Wait for a stop request.
    ///
    /// Returns `None` if the run settles without being stopped.
    pub async fn wait(self) -> Option<StopRequest> {
        self.token.woken().await;
        self.token.state.lock().request.take()
    }

    /// Whether a stop was requested, without waiting.
    pub fn is_requested(&self) -> bool {
        self.token.is_fired()
    }
}

/// A pending stop request handed to the work function.
#[derive(Debug)]
pub struct StopRequest {
    ack: Option<oneshot::Sender<Value>>,
}

impl StopRequest {
    /// Acknowledge the stop, passing `value` to whoever requested it.
    pub fn acknowledge(mut self, value: impl Into<Value>) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(value.into());
        }
    }
}

/// Resolves with the value a stopped job acknowledged with.
///
/// Resolves to `None` when there was nothing to stop, or when the request
/// was dropped without an acknowledgment.
#[must_use = "a stop acknowledgment does nothing unless awaited"]
#[derive(Debug)]
pub struct StopAck {
    rx: Option<oneshot::Receiver<Value>>,
}

impl StopAck {
    pub(crate) fn idle() -> Self {
        Self { rx: None }
    }

    fn pending(rx: oneshot::Receiver<Value>) -> Self {
        Self { rx: Some(rx) }
    }
}

impl Future for StopAck {
    type Output = Option<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.as_mut() {
            None => Poll::Ready(None),
            Some(rx) => Pin::new(rx).poll(cx).map(Result::ok),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fire_delivers_request_to_listener() {
        let token = StopToken::new();
        let listener = token.subscribe().expect("first subscription");

        let ack = token.fire();
        assert!(token.is_fired());

        let request = listener.wait().await.expect("stop requested");
        request.acknowledge("cleaned up");

        assert_eq!(ack.await, Some(json!("cleaned up")));
    }

    #[tokio::test]
    async fn test_subscribe_only_once() {
        let token = StopToken::new();
        assert!(token.subscribe().is_some());
        assert!(token.subscribe().is_none());
    }

    #[tokio::test]
    async fn test_second_fire_resolves_immediately() {
        let token = StopToken::new();
        let _first = token.fire();
        assert_eq!(token.fire().await, None);
    }

    #[tokio::test]
    async fn test_close_without_fire_releases_listener() {
        let token = StopToken::new();
        let listener = token.subscribe().unwrap();
        token.close();

        assert!(listener.wait().await.is_none());
        assert_eq!(token.fire().await, None);
    }

    #[tokio::test]
    async fn test_request_survives_close() {
        let token = StopToken::new();
        let ack = token.fire();
        token.close();

        let listener = token.subscribe().unwrap();
        let request = listener.wait().await.expect("request raised before close");
        request.acknowledge(42);

        assert_eq!(ack.await, Some(json!(42)));
    }

    #[tokio::test]
    async fn test_dropped_request_resolves_none() {
        let token = StopToken::new();
        let listener = token.subscribe().unwrap();
        let ack = token.fire();

        drop(listener.wait().await);
        assert_eq!(ack.await, None);
    }

    #[tokio::test]
    async fn test_dropped_token_resolves_none() {
        let token = StopToken::new();
        let ack = token.fire();
        drop(token);
        assert_eq!(ack.await, None);
    }

    #[test]
    fn test_same_run() {
        let token = StopToken::new();
        let other = StopToken::new();
        assert!(token.same_run(&token.clone()));
        assert!(!token.same_run(&other));
    }
}
