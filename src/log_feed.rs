//! Log lines destined for the host's text log widget.
//!
//! Every producer (status callbacks, the connection's lifecycle notices)
//! goes through one [`LinePoster`], which serializes appends so lines reach
//! the sink in a single total order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Consumer of diagnostic text lines.
pub trait LogSink: Send + Sync {
    fn append(&self, line: &str);
}

/// Bounded in-memory log with a live broadcast of new lines.
pub struct LogFeed {
    tx: broadcast::Sender<String>,
    history: Mutex<VecDeque<String>>,
    history_capacity: usize,
}

impl LogFeed {
    pub fn new(history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(history_capacity.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
        }
    }

    /// Lines retained so far, oldest first.
    pub fn lines(&self) -> Vec<String> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Stream of lines appended after this call. Lagged gaps are skipped.
    pub fn stream(&self) -> impl Stream<Item = String> {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|line| async move { line.ok() })
    }
}

impl Default for LogFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

impl LogSink for LogFeed {
    fn append(&self, line: &str) {
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.history_capacity {
                history.pop_front();
            }
            if self.history_capacity > 0 {
                history.push_back(line.to_string());
            }
        }
        let _ = self.tx.send(line.to_string());
    }
}

/// The single ordered post operation shared by every producer.
pub struct LinePoster {
    sink: Arc<dyn LogSink>,
    order: Mutex<()>,
}

impl LinePoster {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            order: Mutex::new(()),
        }
    }

    /// Append `message` as one line; a trailing newline is not duplicated.
    pub fn post(&self, message: &str) {
        let line = message.strip_suffix('\n').unwrap_or(message);
        let _order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        log::info!("[Log] {}", line);
        self.sink.append(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_drops_oldest_when_full() {
        let feed = LogFeed::new(2);
        feed.append("one");
        feed.append("two");
        feed.append("three");
        assert_eq!(feed.lines(), vec!["two".to_string(), "three".to_string()]);
    }

    #[test]
    fn test_poster_strips_single_trailing_newline() {
        let feed = Arc::new(LogFeed::new(8));
        let poster = LinePoster::new(feed.clone());
        poster.post("print: hello\n");
        poster.post("already clean");
        assert_eq!(
            feed.lines(),
            vec!["print: hello".to_string(), "already clean".to_string()]
        );
    }

    #[test]
    fn test_subscribers_receive_new_lines() {
        let feed = LogFeed::new(8);
        let mut rx = feed.subscribe();
        feed.append("Audio stopped");
        assert_eq!(rx.try_recv().unwrap(), "Audio stopped");
    }

    #[test]
    fn test_stream_yields_lines_after_subscription() {
        let feed = LogFeed::new(8);
        feed.append("before");
        let stream = feed.stream();
        feed.append("first");
        feed.append("second");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let lines: Vec<String> = runtime.block_on(stream.take(2).collect());
        assert_eq!(lines, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_concurrent_posts_all_arrive() {
        let feed = Arc::new(LogFeed::new(1024));
        let poster = Arc::new(LinePoster::new(feed.clone()));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let poster = Arc::clone(&poster);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        poster.post(&format!("{}-{}", t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let lines = feed.lines();
        assert_eq!(lines.len(), 200);
        for t in 0..4 {
            let own: Vec<_> = lines
                .iter()
                .filter(|line| line.starts_with(&format!("{}-", t)))
                .cloned()
                .collect();
            let expected: Vec<_> = (0..50).map(|i| format!("{}-{}", t, i)).collect();
            assert_eq!(own, expected);
        }
    }
}
