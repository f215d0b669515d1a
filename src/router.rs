//! Uplink event routing
//!
//! The router owns an explicit list of handlers, fixed at construction, and
//! hands every uplink event to each of them. Events for different devices are
//! processed concurrently with no ordering between them.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::core::{Error, Result, UplinkEvent};

/// Receives uplink events from the router
#[async_trait]
pub trait UplinkHandler: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Processes one event; handlers ignore events that are not theirs
    async fn on_uplink(&self, event: &UplinkEvent) -> Result<()>;
}

/// Dispatches uplink events to registered handlers
#[derive(Clone, Default)]
pub struct EventRouter {
    handlers: Vec<Arc<dyn UplinkHandler>>,
}

impl EventRouter {
    /// Creates a router with the given handlers
    pub fn new(handlers: Vec<Arc<dyn UplinkHandler>>) -> Self {
        EventRouter { handlers }
    }

    /// Adds a handler
    pub fn with_handler(mut self, handler: Arc<dyn UplinkHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Hands `event` to every handler
    ///
    /// All handlers run even when one fails; the first error is returned.
    pub async fn dispatch(&self, event: &UplinkEvent) -> Result<()> {
        let results = join_all(self.handlers.iter().map(|h| h.on_uplink(event))).await;

        let mut first_error: Option<Error> = None;
        for (handler, result) in self.handlers.iter().zip(results) {
            if let Err(e) = result {
                error!(
                    handler = handler.name(),
                    dev_eui = %event.dev_eui,
                    f_port = event.f_port,
                    error = %e,
                    "router: uplink handler error"
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Dispatches events from `events` until the channel closes
    ///
    /// Each event is handled on its own task; in-flight events are awaited
    /// before returning.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<UplinkEvent>) -> Result<()> {
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let router = Arc::clone(&self);
                    tasks.spawn(async move {
                        // Errors are logged by dispatch
                        let _ = router.dispatch(&event).await;
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "router: dispatch task failed");
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "router: dispatch task failed");
            }
        }

        debug!("router: uplink channel closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DevEui;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl UplinkHandler for CountingHandler {
        fn name(&self) -> &str {
            "counting"
        }

        async fn on_uplink(&self, _event: &UplinkEvent) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::decode("bad frame"));
            }
            Ok(())
        }
    }

    fn event(n: u8) -> UplinkEvent {
        UplinkEvent {
            dev_eui: DevEui([n; 8]),
            f_port: 202,
            data: Bytes::new(),
            rx_info: vec![],
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_all_handlers() {
        let failing = Arc::new(CountingHandler {
            fail: true,
            ..Default::default()
        });
        let ok = Arc::new(CountingHandler::default());
        let router = EventRouter::new(vec![failing.clone() as Arc<dyn UplinkHandler>])
            .with_handler(ok.clone());
        assert_eq!(router.handler_count(), 2);

        let result = router.dispatch(&event(1)).await;
        assert!(matches!(result, Err(Error::Decode(_))));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ok.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_router() {
        let router = EventRouter::default();
        tokio_test::assert_ok!(router.dispatch(&event(1)).await);
    }

    #[tokio::test]
    async fn test_run_until_closed() {
        let handler = Arc::new(CountingHandler::default());
        let router = Arc::new(EventRouter::new(vec![
            handler.clone() as Arc<dyn UplinkHandler>
        ]));
        let (tx, rx) = mpsc::channel(8);

        let run = tokio::spawn(router.run(rx));
        for n in 0..5 {
            tx.send(event(n)).await.unwrap();
        }
        drop(tx);

        run.await.unwrap().unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 5);
    }
}
