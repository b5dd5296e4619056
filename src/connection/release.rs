// Release discipline for resources acquired during one connection cycle.
//
// Each resource has its own "acquired" record. A release plan takes the
// records out of the connection state under the lock, so no other path can
// see them again, and then releases each one exactly once.

use std::sync::Arc;

use log::{debug, info};

use crate::error::{log_remote_error, RemoteError};
use crate::remote::{EngineClient, EngineService, MessageListener, ServiceBinder, SessionHandle};

/// Remote resources currently held.
#[derive(Debug, Default)]
pub(super) struct Held {
    pub(super) client: bool,
    pub(super) subscriptions: Vec<String>,
    pub(super) session: Option<SessionHandle>,
    pub(super) audio: bool,
}

impl Held {
    fn count(&self) -> usize {
        usize::from(self.client)
            + self.subscriptions.len()
            + usize::from(self.session.is_some())
            + usize::from(self.audio)
    }
}

/// Everything one teardown has to give back.
///
/// `proxy` is `None` when the engine is already gone: the remote
/// registrations died with it and only the local bind is released.
pub(super) struct ReleasePlan {
    pub(super) proxy: Option<Arc<dyn EngineService>>,
    pub(super) held: Held,
    pub(super) bound: bool,
}

/// Things the plan releases registrations for.
pub(super) struct Registrations<'a> {
    pub(super) watcher: &'a Arc<dyn EngineClient>,
    pub(super) listener: &'a Arc<dyn MessageListener>,
    pub(super) binder: &'a dyn ServiceBinder,
}

impl ReleasePlan {
    /// Release in order: client, subscriptions, session, audio, bind.
    /// Failures are logged and counted; later steps still run.
    pub(super) fn execute(self, registrations: Registrations<'_>) -> usize {
        let mut failures = 0;
        let mut attempt = |operation: &str, result: Result<(), RemoteError>| {
            if let Err(err) = result {
                log_remote_error(&err, operation);
                failures += 1;
            }
        };

        let held = self.held;
        match &self.proxy {
            Some(proxy) => {
                if held.client {
                    attempt("remove_client", proxy.remove_client(registrations.watcher));
                }
                for topic in &held.subscriptions {
                    attempt("unsubscribe", proxy.unsubscribe(topic, registrations.listener));
                }
                if let Some(session) = &held.session {
                    attempt("close_session", proxy.close_session(session));
                }
                if held.audio {
                    attempt("release_audio", proxy.release_audio());
                }
            }
            None => {
                debug!(
                    "[RemoteConnection] engine gone, dropping {} remote registrations",
                    held.count()
                );
            }
        }

        if self.bound {
            attempt("unbind", registrations.binder.unbind());
        }

        info!("[RemoteConnection] release finished with {} failures", failures);
        failures
    }
}
