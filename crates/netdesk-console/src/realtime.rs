//! Glue between the page connection and the widgets it feeds

use crate::socket::{DISCONNECT_EVENT, SocketEvent, SocketHandle};
use netdesk_core::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, warn};

/// Widget state updated by pushed events
pub trait RealtimeListener: Send + Sync + 'static {
    /// Whether the listener reacts to events named `name`
    fn handles(&self, name: &str) -> bool;

    /// Merge one pushed event
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed or the event is not
    /// allowed in the current state; the state is left unchanged.
    fn on_event(&mut self, event: &SocketEvent) -> Result<()>;
}

/// Feed every matching event of `socket` into `listener` until the
/// connection closes
pub fn spawn_listener<L: RealtimeListener>(
    socket: &SocketHandle,
    listener: Arc<RwLock<L>>,
) -> JoinHandle<()> {
    let mut events = socket.subscribe();
    let namespace = socket.namespace();

    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    warn!(%namespace, missed, "Listener fell behind, events skipped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if listener.read().handles(&event.name) {
                if let Err(e) = listener.write().on_event(&event) {
                    warn!(%namespace, event = %event.name, "Rejected realtime event: {e}");
                }
            } else {
                debug!(%namespace, event = %event.name, "Unhandled realtime event");
            }

            if event.name == DISCONNECT_EVENT {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::Namespace;
    use netdesk_core::Error;
    use serde_json::{Value, json};

    #[derive(Default)]
    struct Counter {
        seen: Vec<Value>,
    }

    impl RealtimeListener for Counter {
        fn handles(&self, name: &str) -> bool {
            name == "tick"
        }

        fn on_event(&mut self, event: &SocketEvent) -> Result<()> {
            if event.payload.is_null() {
                return Err(Error::Protocol("empty tick".to_string()));
            }
            self.seen.push(event.payload.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_listener_receives_matching_events_until_disconnect() {
        let (socket, loopback) = SocketHandle::loopback(Namespace::Default);
        let counter = Arc::new(RwLock::new(Counter::default()));
        let task = spawn_listener(&socket, Arc::clone(&counter));

        loopback.deliver("tick", json!(1));
        loopback.deliver("other", json!(2));
        loopback.deliver("tick", Value::Null);
        loopback.deliver("tick", json!(3));
        loopback.deliver(DISCONNECT_EVENT, json!("transport close"));

        task.await.unwrap();
        assert_eq!(counter.read().seen, vec![json!(1), json!(3)]);
    }
}
