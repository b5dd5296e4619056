// Scene Player Core - overlay protocol and audio engine connection
// Drives scene overlays from engine messages and forwards local input back

// Module declarations
pub mod config;
pub mod connection;
pub mod error;
pub mod host;
pub mod log_feed;
pub mod overlay;
pub mod protocol;
pub mod remote;
pub mod router;
pub mod status;

// Re-exports for convenience
pub use config::AppConfig;
pub use connection::{
    ConnectionEvent, ConnectionEventKind, ConnectionParts, ConnectionState, ReleaseCause,
    RemoteConnection,
};
pub use error::{ConnectionError, ErrorCode, RemoteError};
pub use host::{HostControl, RenderSurface, Scene};
pub use log_feed::{LinePoster, LogFeed, LogSink};
pub use overlay::{Overlay, OverlayKind, OverlayRegistry};
pub use protocol::{Atom, OverlayCommand, OverlayMessage};
pub use router::{EventRouter, MotionSample, TouchAction, TouchEvent};
pub use status::StatusWatcher;

use once_cell::sync::OnceCell;

static LOGGING: OnceCell<()> = OnceCell::new();

/// Install the process-wide log subscriber. Later calls do nothing.
///
/// `log` records from the library are bridged into `tracing`.
pub fn init_logging() {
    LOGGING.get_or_init(|| {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "android")] {
                use tracing_subscriber::layer::SubscriberExt;
                use tracing_subscriber::util::SubscriberInitExt;

                match tracing_android::layer("ScenePlayer") {
                    Ok(layer) => {
                        let _ = tracing_subscriber::registry().with(layer).try_init();
                    }
                    Err(err) => eprintln!("ScenePlayer: android log layer unavailable: {}", err),
                }
            } else {
                let _ = tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .with_target(false)
                    .try_init();
            }
        }
        log::info!("[ScenePlayer] logging initialized");
    });
}
