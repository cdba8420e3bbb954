//! The device handle: one platform session plus the ports kept connected
//! to every source.

use crate::config::{ClientConfig, DEFAULT_CLIENT_NAME};
use crate::midi::{MidiService, Notification, NotifyFn, PortRef, Result, SessionRef};
use crate::publisher::{MidiPublisher, MidiStream};
use crate::registry::PortRegistry;
use log::{debug, info, warn};
use std::ops::Range;
use std::sync::{Arc, OnceLock, Weak};
use uuid::Uuid;

/// Outcome of one connection refresh pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub sources: usize,
    pub ports: usize,
    pub attempted: usize,
    pub connected: usize,
    pub failed: usize,
}

pub(crate) struct ClientInner<S: MidiService> {
    pub(crate) service: Arc<S>,
    pub(crate) session: SessionRef,
    pub(crate) ports: PortRegistry,
    pub(crate) name: String,
    inclusive_source_range: bool,
}

impl<S: MidiService> ClientInner<S> {
    fn handle_notification(&self, notification: Notification) {
        if notification.requests_refresh() {
            debug!("{}: {} received", self.name, notification);
            self.refresh_connections();
        } else {
            warn!(
                "{}: ignoring unrecognized notification id {}",
                self.name,
                notification.message_id()
            );
        }
    }

    fn source_range(&self, count: usize) -> Range<usize> {
        if self.inclusive_source_range {
            0..count + 1
        } else {
            0..count
        }
    }

    /// Connects every registered port to every source. Failures are left
    /// for the next refresh to fix.
    pub(crate) fn refresh_connections(&self) -> RefreshSummary {
        let ports = self.ports.snapshot();
        let count = self.service.source_count();
        let mut summary = RefreshSummary {
            sources: count,
            ports: ports.len(),
            ..RefreshSummary::default()
        };

        for index in self.source_range(count) {
            for &port in &ports {
                summary.attempted += 1;
                match self.service.connect_source(port, index) {
                    Ok(()) => summary.connected += 1,
                    Err(e) => {
                        summary.failed += 1;
                        debug!("{}: {} -> source {} skipped: {}", self.name, port, index, e);
                    }
                }
            }
        }

        debug!("{}: refresh finished: {:?}", self.name, summary);
        summary
    }

    pub(crate) fn generate_port_name(&self) -> String {
        format!("{}-{}", self.name, Uuid::new_v4().hyphenated())
    }
}

impl<S: MidiService> Drop for ClientInner<S> {
    fn drop(&mut self) {
        info!("{}: releasing {}", self.name, self.session);
        self.service.dispose_session(self.session);
    }
}

/// Handle to a platform MIDI session.
///
/// Clones share the session, which is released once the last clone and
/// every publisher and subscription created from it are gone. Topology
/// notifications from the platform reconnect all registered ports to all
/// sources.
pub struct MidiClient<S: MidiService> {
    inner: Arc<ClientInner<S>>,
}

impl<S: MidiService> Clone for MidiClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: MidiService> MidiClient<S> {
    /// Opens a client named [`DEFAULT_CLIENT_NAME`]
    pub fn new(service: Arc<S>) -> Result<Self> {
        Self::open(service, DEFAULT_CLIENT_NAME)
    }

    pub fn open(service: Arc<S>, name: impl Into<String>) -> Result<Self> {
        Self::build(service, name.into(), false)
    }

    pub fn with_config(service: Arc<S>, config: &ClientConfig) -> Result<Self> {
        Self::build(
            service,
            config.client_name.clone(),
            config.inclusive_source_range,
        )
    }

    fn build(service: Arc<S>, name: String, inclusive_source_range: bool) -> Result<Self> {
        // The listener only ever sees a weak reference, filled in once the
        // client exists; earlier notifications have no ports to connect.
        let owner: Arc<OnceLock<Weak<ClientInner<S>>>> = Arc::new(OnceLock::new());
        let listener_owner = Arc::clone(&owner);
        let listener: NotifyFn = Arc::new(move |notification: Notification| {
            match listener_owner.get().and_then(Weak::upgrade) {
                Some(client) => client.handle_notification(notification),
                None => debug!("{} arrived without a live client", notification),
            }
        });

        let session = service.create_session(&name, listener)?;
        info!("{}: opened {}", name, session);

        let inner = Arc::new(ClientInner {
            service,
            session,
            ports: PortRegistry::new(),
            name,
            inclusive_source_range,
        });
        let _ = owner.set(Arc::downgrade(&inner));

        Ok(Self { inner })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn session(&self) -> SessionRef {
        self.inner.session
    }

    pub fn service(&self) -> &Arc<S> {
        &self.inner.service
    }

    pub fn inclusive_source_range(&self) -> bool {
        self.inner.inclusive_source_range
    }

    /// Registers a port created under this client's session
    pub fn add_port(&self, port: PortRef) {
        if self.inner.ports.add(port) {
            debug!("{}: registered {}", self.inner.name, port);
        }
    }

    pub fn remove_port(&self, port: PortRef) {
        if self.inner.ports.remove(port) {
            debug!("{}: unregistered {}", self.inner.name, port);
        }
    }

    pub fn ports(&self) -> Vec<PortRef> {
        self.inner.ports.snapshot()
    }

    pub fn has_port(&self, port: PortRef) -> bool {
        self.inner.ports.contains(port)
    }

    /// Connects every registered port to every known source.
    ///
    /// Safe to call at any time; already connected pairs stay connected.
    pub fn refresh_connections(&self) -> RefreshSummary {
        self.inner.refresh_connections()
    }

    /// Lazy message publisher; nothing is created until it is subscribed to
    pub fn publisher(&self) -> MidiPublisher<S> {
        MidiPublisher::new(Arc::clone(&self.inner))
    }

    /// Subscribes once and returns the messages as a blocking iterator
    pub fn stream(&self) -> Result<MidiStream> {
        self.publisher().stream()
    }
}
