//! Message publishers and their subscriptions.
//!
//! Every subscription owns a dedicated platform input port. Messages are
//! pushed from the platform's delivery thread through a gate that teardown
//! closes before the port goes away, so a cancelled subscription never
//! sees another message.

use crate::client::ClientInner;
use crate::midi::{MidiMessage, MidiService, PacketFn, PortRef, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type Handler = Box<dyn FnMut(MidiMessage) + Send>;
type Gate = Arc<Mutex<Option<Handler>>>;
type Teardown = Box<dyn FnOnce() + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lazy source of the messages arriving at a client.
///
/// Nothing touches the platform until [`subscribe`](Self::subscribe) or
/// [`stream`](Self::stream) is called; each call then gets a port of its own.
pub struct MidiPublisher<S: MidiService> {
    client: Arc<ClientInner<S>>,
}

impl<S: MidiService> Clone for MidiPublisher<S> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<S: MidiService> MidiPublisher<S> {
    pub(crate) fn new(client: Arc<ClientInner<S>>) -> Self {
        Self { client }
    }

    /// Creates a port, registers it, connects it to every source and feeds
    /// each received message to `handler` on the platform's delivery
    /// thread until the returned [`Subscription`] is cancelled or dropped.
    ///
    /// The subscription must not be cancelled from inside `handler`.
    pub fn subscribe<F>(&self, handler: F) -> Result<Subscription>
    where
        F: FnMut(MidiMessage) + Send + 'static,
    {
        let client = &self.client;
        let port_name = client.generate_port_name();

        let handler: Handler = Box::new(handler);
        let gate: Gate = Arc::new(Mutex::new(Some(handler)));
        let delivery = Arc::clone(&gate);
        let on_packet: PacketFn = Arc::new(move |bytes: &[u8]| {
            let Some(message) = MidiMessage::from_bytes(bytes) else {
                return;
            };
            if let Some(handler) = lock(&delivery).as_mut() {
                handler(message);
            }
        });

        let port = client
            .service
            .create_input_port(client.session, &port_name, on_packet)?;
        client.ports.add(port);
        info!("{}: subscribed through {} ({})", client.name, port, port_name);
        client.refresh_connections();

        let owner = Arc::clone(client);
        let teardown: Teardown = Box::new(move || {
            // Waits out a delivery in progress; nothing is emitted afterwards
            lock(&gate).take();
            owner.ports.remove(port);
            owner.service.dispose_port(port);
            info!("{}: cancelled subscription on {}", owner.name, port);
        });

        Ok(Subscription {
            port,
            port_name,
            teardown: Arc::new(Mutex::new(Some(teardown))),
        })
    }

    /// Subscribes once, queueing messages in an unbounded channel that the
    /// returned [`MidiStream`] drains.
    pub fn stream(&self) -> Result<MidiStream> {
        let (sender, receiver) = channel::unbounded();
        let subscription = self.subscribe(move |message| {
            if sender.send(message).is_err() {
                debug!("Dropping message for a closed stream");
            }
        })?;

        Ok(MidiStream {
            receiver,
            subscription,
        })
    }
}

/// One live subscription to a [`MidiPublisher`]. Dropping it cancels.
pub struct Subscription {
    port: PortRef,
    port_name: String,
    teardown: Arc<Mutex<Option<Teardown>>>,
}

impl Subscription {
    pub fn port(&self) -> PortRef {
        self.port
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_active(&self) -> bool {
        lock(&self.teardown).is_some()
    }

    /// Stops delivery, unregisters the port and disposes it. Idempotent.
    pub fn cancel(&self) {
        cancel(&self.teardown);
    }

    /// A handle that can cancel this subscription from another thread
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            teardown: Arc::clone(&self.teardown),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        cancel(&self.teardown);
    }
}

fn cancel(slot: &Mutex<Option<Teardown>>) {
    let teardown = lock(slot).take();
    if let Some(teardown) = teardown {
        teardown();
    }
}

#[derive(Clone)]
pub struct CancelHandle {
    teardown: Arc<Mutex<Option<Teardown>>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        cancel(&self.teardown);
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.teardown).is_none()
    }
}

/// Pull-based view of one subscription.
///
/// Iterating blocks until the next message arrives. Once the subscription
/// is cancelled, messages queued before the cancellation are still
/// returned and iteration then ends.
pub struct MidiStream {
    receiver: Receiver<MidiMessage>,
    subscription: Subscription,
}

impl MidiStream {
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn port(&self) -> PortRef {
        self.subscription.port()
    }

    /// Blocks for the next message; `None` once the stream has ended
    pub fn recv(&self) -> Option<MidiMessage> {
        self.receiver.recv().ok()
    }

    pub fn try_recv(&self) -> Option<MidiMessage> {
        self.receiver.try_recv().ok()
    }

    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<MidiMessage, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    pub fn cancel(&self) {
        self.subscription.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.subscription.cancel_handle()
    }
}

impl Iterator for MidiStream {
    type Item = MidiMessage;

    fn next(&mut self) -> Option<MidiMessage> {
        self.recv()
    }
}
