//! In-process stub of the engine service for tests and the CLI.
//!
//! The stub records every call it receives, keeps the registrations it was
//! given, and can be told to fail specific operations. Callbacks into
//! clients and listeners are always made after the stub's own lock is
//! released, so a callback may freely call back into the stub.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::debug;

use super::{
    AudioRequest, EngineClient, EngineService, MessageListener, ServiceBinder, SessionHandle,
};
use crate::connection::RemoteConnection;
use crate::error::RemoteError;
use crate::protocol::Atom;

/// One call received by [`StubEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    AddClient,
    RemoveClient,
    Subscribe(String),
    Unsubscribe(String),
    AddToSearchPath(PathBuf),
    OpenSession(PathBuf),
    CloseSession(SessionHandle),
    RequestAudio(AudioRequest),
    ReleaseAudio,
    SendMessage {
        target: String,
        verb: String,
        args: Vec<Atom>,
    },
    SendList {
        target: String,
        args: Vec<Atom>,
    },
}

impl EngineCall {
    /// Operation name, as accepted by [`StubEngine::fail_on`].
    pub fn name(&self) -> &'static str {
        match self {
            EngineCall::AddClient => "add_client",
            EngineCall::RemoveClient => "remove_client",
            EngineCall::Subscribe(_) => "subscribe",
            EngineCall::Unsubscribe(_) => "unsubscribe",
            EngineCall::AddToSearchPath(_) => "add_to_search_path",
            EngineCall::OpenSession(_) => "open_session",
            EngineCall::CloseSession(_) => "close_session",
            EngineCall::RequestAudio(_) => "request_audio",
            EngineCall::ReleaseAudio => "release_audio",
            EngineCall::SendMessage { .. } => "send_message",
            EngineCall::SendList { .. } => "send_list",
        }
    }
}

#[derive(Default)]
struct StubState {
    calls: Vec<EngineCall>,
    clients: Vec<Arc<dyn EngineClient>>,
    listeners: Vec<(String, Arc<dyn MessageListener>)>,
    failing: HashSet<String>,
    session_io_failure: Option<String>,
    check_session_files: bool,
    audio_status: i32,
    audio_held: bool,
    open_sessions: Vec<SessionHandle>,
    next_session: u64,
}

/// Deterministic engine stand-in.
#[derive(Default)]
pub struct StubEngine {
    state: Mutex<StubState>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `open_session` fail with a local I/O error when the file is
    /// missing on disk.
    pub fn with_session_files_checked(self) -> Self {
        self.lock().check_session_files = true;
        self
    }

    /// Fail every future call to `operation` with a transport error.
    pub fn fail_on(&self, operation: &str) {
        self.lock().failing.insert(operation.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing.clear();
        state.session_io_failure = None;
    }

    /// Fail every future `open_session` with a local I/O error.
    pub fn fail_session_io(&self, details: &str) {
        self.lock().session_io_failure = Some(details.to_string());
    }

    /// Status returned by future audio requests; nonzero denies them.
    pub fn set_audio_status(&self, status: i32) {
        self.lock().audio_status = status;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls to `operation`, including failed ones.
    pub fn count(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.name() == operation)
            .count()
    }

    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.lock()
            .listeners
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    pub fn audio_held(&self) -> bool {
        self.lock().audio_held
    }

    pub fn open_sessions(&self) -> Vec<SessionHandle> {
        self.lock().open_sessions.clone()
    }

    /// Publish `args` on `topic`. Returns the number of listeners reached.
    pub fn deliver(&self, topic: &str, args: &[Atom]) -> usize {
        let listeners: Vec<_> = self
            .lock()
            .listeners
            .iter()
            .filter(|(subscribed, _)| subscribed == topic)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &listeners {
            listener.receive_list(topic, args);
        }
        listeners.len()
    }

    pub fn notify_audio_changed(
        &self,
        sample_rate: i32,
        input_channels: i32,
        output_channels: i32,
        buffer_size_ms: f32,
    ) {
        for client in self.clients() {
            client.audio_changed(sample_rate, input_channels, output_channels, buffer_size_ms);
        }
    }

    pub fn print(&self, text: &str) {
        for client in self.clients() {
            client.print(text);
        }
    }

    /// Ask every registered client to unbind, as an engine shutting down does.
    pub fn request_unbind(&self) {
        for client in self.clients() {
            client.request_unbind();
        }
    }

    fn clients(&self) -> Vec<Arc<dyn EngineClient>> {
        self.lock().clients.clone()
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Records the call, then fails it if the operation was marked failing.
    fn record(&self, call: EngineCall) -> Result<MutexGuard<'_, StubState>, RemoteError> {
        let mut state = self.lock();
        let name = call.name();
        debug!("[StubEngine] {}", name);
        state.calls.push(call);
        if state.failing.contains(name) {
            return Err(RemoteError::transport(name, "injected failure"));
        }
        Ok(state)
    }
}

impl EngineService for StubEngine {
    fn add_client(&self, client: Arc<dyn EngineClient>) -> Result<(), RemoteError> {
        let mut state = self.record(EngineCall::AddClient)?;
        state.clients.push(client);
        Ok(())
    }

    fn remove_client(&self, client: &Arc<dyn EngineClient>) -> Result<(), RemoteError> {
        let mut state = self.record(EngineCall::RemoveClient)?;
        state
            .clients
            .retain(|registered| !Arc::ptr_eq(registered, client));
        Ok(())
    }

    fn subscribe(
        &self,
        topic: &str,
        listener: Arc<dyn MessageListener>,
    ) -> Result<(), RemoteError> {
        let mut state = self.record(EngineCall::Subscribe(topic.to_string()))?;
        state.listeners.push((topic.to_string(), listener));
        Ok(())
    }

    fn unsubscribe(
        &self,
        topic: &str,
        listener: &Arc<dyn MessageListener>,
    ) -> Result<(), RemoteError> {
        let mut state = self.record(EngineCall::Unsubscribe(topic.to_string()))?;
        state
            .listeners
            .retain(|(subscribed, registered)| !(subscribed == topic && Arc::ptr_eq(registered, listener)));
        Ok(())
    }

    fn add_to_search_path(&self, path: &Path) -> Result<(), RemoteError> {
        self.record(EngineCall::AddToSearchPath(path.to_path_buf()))?;
        Ok(())
    }

    fn open_session(&self, file: &Path) -> Result<SessionHandle, RemoteError> {
        let mut state = self.record(EngineCall::OpenSession(file.to_path_buf()))?;
        if let Some(details) = state.session_io_failure.clone() {
            return Err(RemoteError::SessionIo {
                path: file.display().to_string(),
                details,
            });
        }
        if state.check_session_files {
            fs::metadata(file).map_err(|err| RemoteError::SessionIo {
                path: file.display().to_string(),
                details: err.to_string(),
            })?;
        }
        state.next_session += 1;
        let handle = SessionHandle(format!("session-{}", state.next_session));
        state.open_sessions.push(handle.clone());
        Ok(handle)
    }

    fn close_session(&self, handle: &SessionHandle) -> Result<(), RemoteError> {
        let mut state = self.record(EngineCall::CloseSession(handle.clone()))?;
        state.open_sessions.retain(|open| open != handle);
        Ok(())
    }

    fn request_audio(&self, request: AudioRequest) -> Result<i32, RemoteError> {
        let mut state = self.record(EngineCall::RequestAudio(request))?;
        let status = state.audio_status;
        if status == 0 {
            state.audio_held = true;
        }
        Ok(status)
    }

    fn release_audio(&self) -> Result<(), RemoteError> {
        let mut state = self.record(EngineCall::ReleaseAudio)?;
        state.audio_held = false;
        Ok(())
    }

    fn send_message(&self, target: &str, verb: &str, args: &[Atom]) -> Result<(), RemoteError> {
        self.record(EngineCall::SendMessage {
            target: target.to_string(),
            verb: verb.to_string(),
            args: args.to_vec(),
        })?;
        Ok(())
    }

    fn send_list(&self, target: &str, args: &[Atom]) -> Result<(), RemoteError> {
        self.record(EngineCall::SendList {
            target: target.to_string(),
            args: args.to_vec(),
        })?;
        Ok(())
    }
}

#[derive(Default)]
struct BinderState {
    bound: bool,
    bind_calls: usize,
    unbind_calls: usize,
    refuse: bool,
    connection: Option<Weak<RemoteConnection>>,
}

/// Binder that hands out a [`StubEngine`].
///
/// With `auto_connect`, a successful `bind` delivers the connect callback
/// from a separate thread, the way a platform binder does.
pub struct StubBinder {
    engine: Arc<StubEngine>,
    auto_connect: bool,
    state: Mutex<BinderState>,
}

impl StubBinder {
    pub fn new(engine: Arc<StubEngine>) -> Self {
        Self {
            engine,
            auto_connect: false,
            state: Mutex::new(BinderState::default()),
        }
    }

    pub fn auto_connect(mut self) -> Self {
        self.auto_connect = true;
        self
    }

    /// Connection that receives the connect and disconnect callbacks.
    pub fn attach(&self, connection: &Arc<RemoteConnection>) {
        self.lock().connection = Some(Arc::downgrade(connection));
    }

    /// Make future bind requests fail.
    pub fn refuse_binds(&self) {
        self.lock().refuse = true;
    }

    pub fn engine(&self) -> Arc<StubEngine> {
        Arc::clone(&self.engine)
    }

    pub fn is_bound(&self) -> bool {
        self.lock().bound
    }

    pub fn bind_calls(&self) -> usize {
        self.lock().bind_calls
    }

    pub fn unbind_calls(&self) -> usize {
        self.lock().unbind_calls
    }

    /// Deliver the connect callback on the calling thread.
    pub fn deliver_connected(&self) {
        if let Some(connection) = self.connection() {
            connection.on_service_connected(self.engine.clone());
        }
    }

    /// Deliver the disconnect callback, as when the engine process dies.
    pub fn simulate_disconnect(&self) {
        if let Some(connection) = self.connection() {
            connection.on_service_disconnected();
        }
    }

    fn connection(&self) -> Option<Arc<RemoteConnection>> {
        self.lock().connection.as_ref().and_then(Weak::upgrade)
    }

    fn lock(&self) -> MutexGuard<'_, BinderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ServiceBinder for StubBinder {
    fn bind(&self) -> Result<(), RemoteError> {
        let connection = {
            let mut state = self.lock();
            state.bind_calls += 1;
            if state.refuse {
                return Err(RemoteError::transport("bind", "service not found"));
            }
            state.bound = true;
            state.connection.as_ref().and_then(Weak::upgrade)
        };

        if self.auto_connect {
            if let Some(connection) = connection {
                let engine = Arc::clone(&self.engine);
                std::thread::spawn(move || connection.on_service_connected(engine));
            }
        }
        Ok(())
    }

    fn unbind(&self) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.unbind_calls += 1;
        if !state.bound {
            return Err(RemoteError::transport("unbind", "service not bound"));
        }
        state.bound = false;
        Ok(())
    }
}
