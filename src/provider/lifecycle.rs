//! Start/stop sequencing for a peer provider
//!
//! Start binds the outbound channel first, then opens one inbound channel and
//! spawns one listener per peer address. Stop runs in reverse: listeners are
//! signalled and joined, and only then is the outbound channel released.
//!
//! Start and stop never interleave. A stop issued while a start is in flight
//! waits for it and then tears down what it opened.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buffers::LocalBuffers;
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::peer::{ListenerHandle, ListenerState, ListenerStats, PeerListener};
use crate::transport::{PeerAddress, PullChannel, PushChannel};

/// Everything a running provider owns
struct Runtime {
    outbound: Arc<PushChannel>,
    listeners: Vec<ListenerHandle>,
    shutdown: CancellationToken,
}

impl Runtime {
    async fn open(
        config: &ProviderConfig,
        buffers: &Arc<LocalBuffers>,
        stats: &Arc<ListenerStats>,
    ) -> Result<Self> {
        let outbound = Arc::new(PushChannel::bind(config.node.local_port).await?);
        let bound_port = outbound.local_addr().port();

        let addresses =
            match PeerAddress::topology(bound_port, &config.node.peers, config.node.can_take_work) {
                Ok(addresses) => addresses,
                Err(e) => {
                    outbound.close().await;
                    return Err(e);
                }
            };

        let shutdown = CancellationToken::new();
        let listeners = addresses
            .into_iter()
            .map(|address| {
                let channel = PullChannel::connect(address, &config.transport);
                PeerListener::new(
                    channel,
                    Arc::clone(buffers),
                    Arc::clone(stats),
                    config.transport.receive_timeout(),
                )
                .spawn(shutdown.child_token())
            })
            .collect();

        Ok(Self {
            outbound,
            listeners,
            shutdown,
        })
    }

    async fn close(self) {
        self.shutdown.cancel();

        for listener in self.listeners {
            let state = listener.join().await;
            if state != ListenerState::Stopped {
                warn!(state = ?state, "Listener exited in an unexpected state");
            }
        }

        self.outbound.close().await;
    }

    /// Synchronous teardown for use from `Drop`
    fn abort(self) {
        self.shutdown.cancel();
        for listener in &self.listeners {
            listener.abort();
        }
        self.outbound.close_now();
    }
}

enum State {
    Stopped,
    Running(Runtime),
}

/// Owns the active flag and the running [`Runtime`]
pub(crate) struct Lifecycle {
    /// Held for the whole of a start or stop, across its awaits
    transition: tokio::sync::Mutex<()>,
    /// Only ever locked briefly, never across an await
    state: Mutex<State>,
    active: AtomicBool,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            transition: tokio::sync::Mutex::new(()),
            state: Mutex::new(State::Stopped),
            active: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Open every channel and spawn every listener, or nothing at all
    pub(crate) async fn start(
        &self,
        config: &ProviderConfig,
        buffers: &Arc<LocalBuffers>,
        stats: &Arc<ListenerStats>,
    ) -> Result<()> {
        let _transition = self.transition.lock().await;
        let running = matches!(*self.state.lock(), State::Running(_));
        if running {
            return Err(Error::AlreadyStarted);
        }

        match Runtime::open(config, buffers, stats).await {
            Ok(runtime) => {
                info!(
                    addr = %runtime.outbound.local_addr(),
                    listeners = runtime.listeners.len(),
                    can_take_work = config.node.can_take_work,
                    "Queue provider started"
                );
                *self.state.lock() = State::Running(runtime);
                self.active.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                error!(error = %e.format_for_log(), "Queue provider failed to start");
                Err(e)
            }
        }
    }

    /// Signal and join every listener, then release the outbound channel
    pub(crate) async fn stop(&self) {
        let _transition = self.transition.lock().await;
        let state = std::mem::replace(&mut *self.state.lock(), State::Stopped);
        let State::Running(runtime) = state else {
            debug!("Stop requested on a stopped provider");
            return;
        };

        self.active.store(false, Ordering::Release);
        runtime.close().await;
        info!("Queue provider stopped");
    }

    /// Outbound channel, if the provider is active
    pub(crate) fn outbound(&self) -> Option<Arc<PushChannel>> {
        if !self.is_active() {
            return None;
        }
        match &*self.state.lock() {
            State::Running(runtime) => Some(Arc::clone(&runtime.outbound)),
            _ => None,
        }
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock() {
            State::Running(runtime) => Some(runtime.outbound.local_addr()),
            _ => None,
        }
    }

    pub(crate) fn listener_states(&self) -> Vec<(PeerAddress, ListenerState)> {
        match &*self.state.lock() {
            State::Running(runtime) => runtime
                .listeners
                .iter()
                .map(|l| (l.address().clone(), l.state()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        let state = std::mem::replace(self.state.get_mut(), State::Stopped);
        if let State::Running(runtime) = state {
            self.active.store(false, Ordering::Release);
            warn!("Queue provider dropped while running, tearing down");
            runtime.abort();
        }
    }
}
