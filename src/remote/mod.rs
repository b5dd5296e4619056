//! Remote-call surface of the audio engine service.
//!
//! The platform IPC framework is hidden behind these traits. Every call is
//! a synchronous round-trip; an implementation that needs bounded latency
//! must give up on its own and report [`RemoteError::Timeout`], which the
//! connection treats like any other transport failure.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::protocol::Atom;

pub mod stub;

pub use stub::{EngineCall, StubBinder, StubEngine};

/// Topic carrying image overlay commands.
pub const IMAGE_TOPIC: &str = "rj_image_android";

/// Topic carrying text overlay commands.
pub const TEXT_TOPIC: &str = "rj_text_android";

/// Receiver used for motion samples.
pub const ACCELERATE_TARGET: &str = "#accelerate";

/// Receiver used for touch gestures.
pub const TOUCH_TARGET: &str = "#touch";

/// Receiver used for the startup volume command.
pub const VOLUME_TARGET: &str = "#volume";

/// Receiver used for the startup transport command.
pub const TRANSPORT_TARGET: &str = "#transport";

/// Opaque handle of a session (patch) opened in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(pub String);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Audio resource request. Negative values ask the engine for its default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioRequest {
    pub sample_rate: i32,
    pub input_channels: i32,
    pub output_channels: i32,
    pub buffer_size_hint: i32,
}

impl AudioRequest {
    /// Request that leaves every parameter to the engine.
    pub fn engine_defaults() -> Self {
        Self {
            sample_rate: -1,
            input_channels: -1,
            output_channels: -1,
            buffer_size_hint: -1,
        }
    }
}

impl Default for AudioRequest {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            input_channels: 1,
            output_channels: 2,
            buffer_size_hint: -1,
        }
    }
}

/// Status callbacks the engine delivers to a registered client.
pub trait EngineClient: Send + Sync {
    /// The engine is going away and asks every client to unbind.
    fn request_unbind(&self);

    /// Audio parameters changed; `sample_rate <= 0` means audio stopped.
    fn audio_changed(
        &self,
        sample_rate: i32,
        input_channels: i32,
        output_channels: i32,
        buffer_size_ms: f32,
    );

    /// Free-form diagnostic text printed by the engine.
    fn print(&self, text: &str);
}

/// Receiver of list messages published on a subscribed topic.
pub trait MessageListener: Send + Sync {
    fn receive_list(&self, topic: &str, args: &[Atom]);
}

/// Proxy to a connected engine.
pub trait EngineService: Send + Sync {
    fn add_client(&self, client: Arc<dyn EngineClient>) -> Result<(), RemoteError>;
    fn remove_client(&self, client: &Arc<dyn EngineClient>) -> Result<(), RemoteError>;

    fn subscribe(&self, topic: &str, listener: Arc<dyn MessageListener>)
        -> Result<(), RemoteError>;
    fn unsubscribe(
        &self,
        topic: &str,
        listener: &Arc<dyn MessageListener>,
    ) -> Result<(), RemoteError>;

    fn add_to_search_path(&self, path: &Path) -> Result<(), RemoteError>;

    /// Open the session file. Local read failures come back as
    /// [`RemoteError::SessionIo`].
    fn open_session(&self, file: &Path) -> Result<SessionHandle, RemoteError>;
    fn close_session(&self, handle: &SessionHandle) -> Result<(), RemoteError>;

    /// Returns the engine status code; zero means the audio grant is held.
    fn request_audio(&self, request: AudioRequest) -> Result<i32, RemoteError>;
    fn release_audio(&self) -> Result<(), RemoteError>;

    fn send_message(&self, target: &str, verb: &str, args: &[Atom]) -> Result<(), RemoteError>;
    fn send_list(&self, target: &str, args: &[Atom]) -> Result<(), RemoteError>;
}

/// Platform binding to the engine service.
///
/// `bind` only requests the connection; the result arrives later through
/// [`crate::connection::RemoteConnection::on_service_connected`].
pub trait ServiceBinder: Send + Sync {
    fn bind(&self) -> Result<(), RemoteError>;
    fn unbind(&self) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_default_request_is_all_negative() {
        let request = AudioRequest::engine_defaults();
        assert!(request.sample_rate < 0);
        assert!(request.input_channels < 0);
        assert!(request.output_channels < 0);
        assert!(request.buffer_size_hint < 0);
    }

    #[test]
    fn test_default_request_matches_scene_player_preferences() {
        let request = AudioRequest::default();
        assert_eq!(request.sample_rate, 22050);
        assert_eq!(request.input_channels, 1);
        assert_eq!(request.output_channels, 2);
        assert_eq!(request.buffer_size_hint, -1);
    }
}
