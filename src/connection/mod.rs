// RemoteConnection: lifecycle of the link to the audio engine service
//
// Owns the proxy handle, the connection state and every remote resource
// acquired while connected. All three live behind one mutex:
// - the connect callback installs the proxy and acquires resources one call
//   at a time, re-checking the state before each call
// - teardown takes the resources out under the lock and releases them after
//   dropping it, so it runs at most once per cycle
// - senders use the proxy only while holding the lock

mod events;
mod release;

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use events::{ConnectionEvent, ConnectionEventKind, ReleaseCause};

use self::events::EventPublisher;
use self::release::{Held, Registrations, ReleasePlan};
use crate::config::AppConfig;
use crate::error::{log_connection_error, log_remote_error, ConnectionError, ErrorCode, RemoteError};
use crate::host::{HostControl, RenderSurface, Scene};
use crate::log_feed::{LinePoster, LogSink};
use crate::overlay::OverlayRegistry;
use crate::protocol::Atom;
use crate::remote::{
    EngineClient, EngineService, MessageListener, ServiceBinder, SessionHandle, TRANSPORT_TARGET,
    VOLUME_TARGET,
};
use crate::status::{StatusWatcher, UnbindHandler};

/// Connection state machine.
///
/// `Disconnected -> Connected` only through the connect callback;
/// `Connected -> Disconnecting -> Disconnected` through teardown or a
/// remote disconnect. A new `connect()` is accepted only in `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Disconnecting,
}

struct Inner {
    state: ConnectionState,
    /// A bind was requested and not yet released.
    bound: bool,
    proxy: Option<Arc<dyn EngineService>>,
    held: Held,
    /// Incremented per `connect()` so a stale initialization stops early.
    generation: u64,
    /// The host was told to finish during this cycle.
    finished: bool,
}

/// Collaborators a connection is built from.
pub struct ConnectionParts {
    pub config: AppConfig,
    pub scene: Scene,
    pub binder: Arc<dyn ServiceBinder>,
    pub host: Arc<dyn HostControl>,
    pub surface: Arc<dyn RenderSurface>,
    pub log_sink: Arc<dyn LogSink>,
}

/// Outcome of the post-connect initialization sequence.
#[derive(Debug, PartialEq)]
enum InitOutcome {
    Ready,
    /// Torn down by another path while initializing.
    Aborted,
}

pub struct RemoteConnection {
    inner: Mutex<Inner>,
    config: AppConfig,
    scene: Scene,
    binder: Arc<dyn ServiceBinder>,
    host: Arc<dyn HostControl>,
    poster: Arc<LinePoster>,
    registry: Arc<OverlayRegistry>,
    watcher: Arc<dyn EngineClient>,
    listener: Arc<dyn MessageListener>,
    events: EventPublisher,
}

impl RemoteConnection {
    pub fn new(parts: ConnectionParts) -> Arc<Self> {
        let ConnectionParts {
            config,
            scene,
            binder,
            host,
            surface,
            log_sink,
        } = parts;

        let poster = Arc::new(LinePoster::new(log_sink));
        let registry = Arc::new(OverlayRegistry::new(scene.clone(), surface));
        let listener: Arc<dyn MessageListener> = registry.clone();

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let handler: Weak<dyn UnbindHandler> = weak.clone();
            let watcher: Arc<dyn EngineClient> = Arc::new(StatusWatcher::new(
                Arc::clone(&poster),
                config.engine_name.clone(),
                handler,
            ));
            Self {
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    bound: false,
                    proxy: None,
                    held: Held::default(),
                    generation: 0,
                    finished: false,
                }),
                config,
                scene,
                binder,
                host,
                poster,
                registry,
                watcher,
                listener,
                events: EventPublisher::new(64),
            }
        })
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Request a bind to the engine service.
    ///
    /// Completion arrives later through [`Self::on_service_connected`].
    /// The binder must not deliver that callback synchronously from `bind`.
    pub fn connect(&self) -> Result<(), ConnectionError> {
        let mut inner = self.try_lock_inner().map_err(|err| {
            log_connection_error(&err, "connect");
            err
        })?;

        match inner.state {
            ConnectionState::Disconnecting => return Err(ConnectionError::Disconnecting),
            ConnectionState::Connected => return Err(ConnectionError::AlreadyBound),
            ConnectionState::Disconnected if inner.bound => {
                return Err(ConnectionError::AlreadyBound)
            }
            ConnectionState::Disconnected => {}
        }

        if let Err(err) = self.binder.bind() {
            log_remote_error(&err, "connect");
            return Err(ConnectionError::BindFailed {
                details: err.message(),
            });
        }

        inner.bound = true;
        inner.generation += 1;
        inner.finished = false;
        drop(inner);

        info!("[RemoteConnection] bind requested for scene {:?}", self.scene.name());
        self.events.publish(ConnectionEventKind::BindRequested);
        Ok(())
    }

    /// Connect callback from the binder: install the proxy and initialize.
    pub fn on_service_connected(&self, proxy: Arc<dyn EngineService>) {
        let generation = {
            let mut inner = self.lock_inner();
            if !inner.bound || inner.state != ConnectionState::Disconnected {
                warn!(
                    "[RemoteConnection] ignoring connect callback (state={:?}, bound={})",
                    inner.state, inner.bound
                );
                return;
            }
            inner.proxy = Some(proxy);
            inner.state = ConnectionState::Connected;
            inner.generation
        };

        info!("[RemoteConnection] connected");
        self.events.publish(ConnectionEventKind::Connected);

        match self.initialize(generation) {
            Ok(InitOutcome::Ready) => info!("[RemoteConnection] session ready"),
            Ok(InitOutcome::Aborted) => {
                debug!("[RemoteConnection] initialization abandoned after teardown")
            }
            Err(err) => self.handle_init_failure(err),
        }
    }

    /// Disconnect callback: the engine dropped the connection.
    pub fn on_service_disconnected(&self) {
        if self.release(ReleaseCause::RemoteLost) {
            self.connection_lost();
        } else {
            debug!("[RemoteConnection] disconnect callback after release; ignoring");
        }
    }

    /// Release everything acquired by the current cycle.
    ///
    /// Safe to call any number of times from any thread. Returns true when
    /// this call performed the release.
    pub fn teardown(&self) -> bool {
        self.release(ReleaseCause::Shutdown)
    }

    /// Tear down, then tell the host to close. The host hears about it once
    /// per connection cycle.
    pub fn finish(&self) {
        self.teardown();
        let first = {
            let mut inner = self.lock_inner();
            !mem::replace(&mut inner.finished, true)
        };
        if first {
            self.events.publish(ConnectionEventKind::Finished);
            self.host.finish();
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn state(&self) -> ConnectionState {
        self.lock_inner().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Whether the audio grant is currently held.
    pub fn has_audio(&self) -> bool {
        self.lock_inner().held.audio
    }

    pub fn session(&self) -> Option<SessionHandle> {
        self.lock_inner().held.session.clone()
    }

    pub fn registry(&self) -> &Arc<OverlayRegistry> {
        &self.registry
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn poster(&self) -> &Arc<LinePoster> {
        &self.poster
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Run `call` against the proxy while holding the connection lock.
    ///
    /// Returns `None` without calling when not connected, so a handle that
    /// is being released is never used.
    pub fn with_connected<T>(
        &self,
        call: impl FnOnce(&dyn EngineService) -> Result<T, RemoteError>,
    ) -> Option<Result<T, RemoteError>> {
        let inner = self.lock_inner();
        if inner.state != ConnectionState::Connected {
            return None;
        }
        let proxy = inner.proxy.as_ref()?;
        Some(call(proxy.as_ref()))
    }

    // ========================================================================
    // INITIALIZATION
    // ========================================================================

    fn initialize(&self, generation: u64) -> Result<InitOutcome, RemoteError> {
        let watcher = Arc::clone(&self.watcher);
        if self
            .step(generation, |proxy, held| {
                proxy.add_client(watcher)?;
                held.client = true;
                Ok(())
            })?
            .is_none()
        {
            return Ok(InitOutcome::Aborted);
        }

        let library = self.config.library_dir.clone();
        if self
            .step(generation, |proxy, _| proxy.add_to_search_path(&library))?
            .is_none()
        {
            return Ok(InitOutcome::Aborted);
        }

        for topic in self.config.topics.all() {
            let listener = Arc::clone(&self.listener);
            if self
                .step(generation, |proxy, held| {
                    proxy.subscribe(topic, listener)?;
                    held.subscriptions.push(topic.to_string());
                    Ok(())
                })?
                .is_none()
            {
                return Ok(InitOutcome::Aborted);
            }
        }

        let patch = self.scene.patch_path();
        if self
            .step(generation, |proxy, held| {
                held.session = Some(proxy.open_session(&patch)?);
                Ok(())
            })?
            .is_none()
        {
            return Ok(InitOutcome::Aborted);
        }

        let request = self.config.audio;
        if self
            .step(generation, |proxy, held| {
                let status = proxy.request_audio(request)?;
                if status != 0 {
                    return Err(RemoteError::AudioDenied { code: status });
                }
                held.audio = true;
                Ok(())
            })?
            .is_none()
        {
            return Ok(InitOutcome::Aborted);
        }
        self.events.publish(ConnectionEventKind::AudioGranted);

        let volume = [Atom::Float(self.config.startup.volume)];
        if self
            .step(generation, |proxy, _| {
                proxy.send_message(VOLUME_TARGET, "set", &volume)
            })?
            .is_none()
        {
            return Ok(InitOutcome::Aborted);
        }

        if self.config.startup.autoplay
            && self
                .step(generation, |proxy, _| {
                    proxy.send_message(TRANSPORT_TARGET, "play", &[Atom::Float(1.0)])
                })?
                .is_none()
        {
            return Ok(InitOutcome::Aborted);
        }

        Ok(InitOutcome::Ready)
    }

    /// One remote call of the initialization sequence, made under the lock.
    ///
    /// `Ok(None)` means the cycle `generation` is no longer connected and
    /// nothing was called.
    fn step<T>(
        &self,
        generation: u64,
        call: impl FnOnce(&dyn EngineService, &mut Held) -> Result<T, RemoteError>,
    ) -> Result<Option<T>, RemoteError> {
        let mut inner = self.lock_inner();
        if inner.state != ConnectionState::Connected || inner.generation != generation {
            return Ok(None);
        }
        let Some(proxy) = inner.proxy.clone() else {
            return Ok(None);
        };
        call(proxy.as_ref(), &mut inner.held).map(Some)
    }

    fn handle_init_failure(&self, err: RemoteError) {
        log_remote_error(&err, "initialize");
        match err {
            RemoteError::AudioDenied { .. } => {
                self.poster.post("unable to start audio; exiting now");
                self.finish();
            }
            err if err.is_local_io() => {
                self.poster.post(&format!("{}; exiting now", err.message()));
                self.finish();
            }
            _ => {
                // A racing disconnect callback may already have reported the loss.
                if self.teardown() {
                    self.connection_lost();
                }
            }
        }
    }

    // ========================================================================
    // RELEASE
    // ========================================================================

    fn connection_lost(&self) {
        self.poster.post(&format!(
            "lost connection to {}; exiting now",
            self.config.engine_name
        ));
        self.finish();
    }

    fn release(&self, cause: ReleaseCause) -> bool {
        let plan = {
            let mut inner = self.lock_inner();
            let live = match cause {
                ReleaseCause::RemoteLost => inner.state == ConnectionState::Connected,
                ReleaseCause::Shutdown => {
                    inner.state == ConnectionState::Connected
                        || (inner.state == ConnectionState::Disconnected && inner.bound)
                }
            };
            if !live {
                return false;
            }
            inner.state = ConnectionState::Disconnecting;
            let proxy = inner.proxy.take();
            ReleasePlan {
                proxy: match cause {
                    ReleaseCause::Shutdown => proxy,
                    ReleaseCause::RemoteLost => None,
                },
                held: mem::take(&mut inner.held),
                bound: mem::replace(&mut inner.bound, false),
            }
        };

        info!("[RemoteConnection] releasing resources ({:?})", cause);
        let failures = plan.execute(Registrations {
            watcher: &self.watcher,
            listener: &self.listener,
            binder: self.binder.as_ref(),
        });

        self.lock_inner().state = ConnectionState::Disconnected;
        self.events
            .publish(ConnectionEventKind::Released { cause, failures });
        true
    }

    // ========================================================================
    // LOCK HELPERS
    // ========================================================================

    fn try_lock_inner(&self) -> Result<MutexGuard<'_, Inner>, ConnectionError> {
        self.inner.lock().map_err(|_| ConnectionError::LockPoisoned {
            component: "connection".to_string(),
        })
    }

    // Callbacks have no caller to report to, so they recover the guard.
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UnbindHandler for RemoteConnection {
    fn on_unbind_requested(&self) {
        self.finish();
    }
}
