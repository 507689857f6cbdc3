//! Cancellable one-shot timers for host-paced auto-advance, keyed by
//! `(session_code, question_index)`.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct TimerRegistry {
    handles: Mutex<HashMap<(String, usize), JoinHandle<()>>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` to run after `delay`, replacing any timer already
    /// registered for this `(code, index)` pair.
    pub async fn schedule<F>(&self, code: &str, index: usize, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel(code, index).await;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        self.handles
            .lock()
            .await
            .insert((code.to_string(), index), handle);
    }

    pub async fn cancel(&self, code: &str, index: usize) {
        if let Some(handle) = self.handles.lock().await.remove(&(code.to_string(), index)) {
            handle.abort();
        }
    }

    pub async fn cancel_all(&self, code: &str) {
        let mut handles = self.handles.lock().await;
        let keys: Vec<_> = handles
            .keys()
            .filter(|(c, _)| c == code)
            .cloned()
            .collect();
        for key in keys {
            if let Some(handle) = handles.remove(&key) {
                handle.abort();
            }
        }
    }
}
