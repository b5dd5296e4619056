// EventRouter: local input forwarded to the engine
//
// Sends go through RemoteConnection::with_connected, so the "is connected"
// check and the remote call happen under the connection lock. Input is
// dropped while disconnected; send failures are logged and otherwise
// ignored.

use std::sync::Arc;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::connection::RemoteConnection;
use crate::error::{log_remote_error, RemoteError};
use crate::host::RenderSurface;
use crate::protocol::Atom;
use crate::remote::{EngineService, ACCELERATE_TARGET, TOUCH_TARGET};

/// One accelerometer sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchAction {
    Down,
    Move,
    Up,
    Cancel,
}

impl TouchAction {
    /// Verb of the engine's touch protocol.
    pub fn verb(self) -> &'static str {
        match self {
            TouchAction::Down => "down",
            TouchAction::Move => "xy",
            TouchAction::Up | TouchAction::Cancel => "up",
        }
    }
}

/// Pointer event in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub action: TouchAction,
    pub pointer_id: u32,
    pub x: f32,
    pub y: f32,
}

pub struct EventRouter {
    connection: Arc<RemoteConnection>,
    surface: Arc<dyn RenderSurface>,
}

impl EventRouter {
    pub fn new(connection: Arc<RemoteConnection>, surface: Arc<dyn RenderSurface>) -> Self {
        Self {
            connection,
            surface,
        }
    }

    /// Forward a motion sample as `#accelerate x y z`.
    ///
    /// Returns true when the sample was handed to the engine.
    pub fn route_motion(&self, sample: MotionSample) -> bool {
        let args = [
            Atom::Float(sample.x),
            Atom::Float(sample.y),
            Atom::Float(sample.z),
        ];
        self.send("route_motion", |proxy| {
            proxy.send_list(ACCELERATE_TARGET, &args)
        })
    }

    /// Forward a touch event as `#touch <verb> <pointer> <nx> <ny>`, with
    /// coordinates normalized to the current surface size.
    ///
    /// Returns true when the event was consumed by the engine.
    pub fn route_touch(&self, event: TouchEvent) -> bool {
        let (width, height) = self.surface.dimensions();
        if width <= 0.0 || height <= 0.0 {
            trace!("[EventRouter] surface has no size yet; dropping touch");
            return false;
        }

        let args = [
            Atom::Float(event.pointer_id as f32),
            Atom::Float(event.x / width),
            Atom::Float(event.y / height),
        ];
        self.send("route_touch", |proxy| {
            proxy.send_message(TOUCH_TARGET, event.action.verb(), &args)
        })
    }

    fn send(
        &self,
        context: &str,
        call: impl FnOnce(&dyn EngineService) -> Result<(), RemoteError>,
    ) -> bool {
        match self.connection.with_connected(call) {
            None => false,
            Some(Ok(())) => true,
            Some(Err(err)) => {
                log_remote_error(&err, context);
                false
            }
        }
    }
}
