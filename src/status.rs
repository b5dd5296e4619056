// StatusWatcher: status callbacks from the engine, forwarded to the log
//
// The watcher is registered as an engine client while connected. An unbind
// request is passed on to whoever owns the connection; everything else
// becomes a log line.

use std::sync::{Arc, Weak};

use log::info;

use crate::log_feed::LinePoster;
use crate::remote::EngineClient;

/// Capability to shut the connection down when the engine asks us to.
pub trait UnbindHandler: Send + Sync {
    fn on_unbind_requested(&self);
}

pub struct StatusWatcher {
    poster: Arc<LinePoster>,
    engine_name: String,
    handler: Weak<dyn UnbindHandler>,
}

impl StatusWatcher {
    pub fn new(
        poster: Arc<LinePoster>,
        engine_name: impl Into<String>,
        handler: Weak<dyn UnbindHandler>,
    ) -> Self {
        Self {
            poster,
            engine_name: engine_name.into(),
            handler,
        }
    }
}

/// Human-readable description of an audio parameter change.
pub fn describe_audio(
    sample_rate: i32,
    input_channels: i32,
    output_channels: i32,
    buffer_size_ms: f32,
) -> String {
    if sample_rate > 0 {
        format!(
            "Audio parameters: sample rate: {}, input channels: {}, output channels: {}, buffer size: {}ms",
            sample_rate, input_channels, output_channels, buffer_size_ms
        )
    } else {
        "Audio stopped".to_string()
    }
}

impl EngineClient for StatusWatcher {
    fn request_unbind(&self) {
        info!("[StatusWatcher] engine requested unbind");
        self.poster.post(&format!(
            "{} was stopped externally; exiting now",
            self.engine_name
        ));
        if let Some(handler) = self.handler.upgrade() {
            handler.on_unbind_requested();
        }
    }

    fn audio_changed(
        &self,
        sample_rate: i32,
        input_channels: i32,
        output_channels: i32,
        buffer_size_ms: f32,
    ) {
        self.poster.post(&describe_audio(
            sample_rate,
            input_channels,
            output_channels,
            buffer_size_ms,
        ));
    }

    fn print(&self, text: &str) {
        self.poster.post(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_feed::LogFeed;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
    }

    impl UnbindHandler for CountingHandler {
        fn on_unbind_requested(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn watcher(handler: &Arc<CountingHandler>) -> (StatusWatcher, Arc<LogFeed>) {
        let feed = Arc::new(LogFeed::new(16));
        let poster = Arc::new(LinePoster::new(feed.clone()));
        let weak: Weak<dyn UnbindHandler> = Arc::downgrade(handler) as Weak<dyn UnbindHandler>;
        (StatusWatcher::new(poster, "Pure Data", weak), feed)
    }

    #[test]
    fn test_unbind_request_posts_notice_and_calls_handler() {
        let handler = Arc::new(CountingHandler::default());
        let (watcher, feed) = watcher(&handler);
        watcher.request_unbind();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            feed.lines(),
            vec!["Pure Data was stopped externally; exiting now".to_string()]
        );
    }

    #[test]
    fn test_audio_changes_are_described() {
        let handler = Arc::new(CountingHandler::default());
        let (watcher, feed) = watcher(&handler);
        watcher.audio_changed(44100, 1, 2, 11.5);
        watcher.audio_changed(0, 0, 0, 0.0);
        watcher.audio_changed(-1, 2, 2, 5.0);
        assert_eq!(
            feed.lines(),
            vec![
                "Audio parameters: sample rate: 44100, input channels: 1, output channels: 2, buffer size: 11.5ms".to_string(),
                "Audio stopped".to_string(),
                "Audio stopped".to_string(),
            ]
        );
    }

    #[test]
    fn test_print_is_forwarded_verbatim() {
        let handler = Arc::new(CountingHandler::default());
        let (watcher, feed) = watcher(&handler);
        watcher.print("osc~: no method for 'bang'");
        assert_eq!(feed.lines(), vec!["osc~: no method for 'bang'".to_string()]);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dropped_handler_is_tolerated() {
        let handler = Arc::new(CountingHandler::default());
        let (watcher, feed) = watcher(&handler);
        drop(handler);
        watcher.request_unbind();
        assert_eq!(feed.lines().len(), 1);
    }
}
