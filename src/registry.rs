//! In-process connection bookkeeping: which user is connected to which
//! session, whether they are the host, and the channel used to push frames
//! to their WebSocket task.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::protocol::ServerMessage;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

struct Connection {
    sender: mpsc::UnboundedSender<ServerMessage>,
    is_host: bool,
}

#[derive(Default)]
struct Inner {
    /// session_code -> user_id -> connection
    sessions: HashMap<String, HashMap<String, Connection>>,
    /// user_id -> session_code, for disconnect cleanup without the caller
    /// needing to remember which session a socket belonged to.
    user_sessions: HashMap<String, String>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attach(
        &self,
        code: &str,
        user_id: &str,
        is_host: bool,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let mut inner = self.inner.lock().await;
        inner
            .sessions
            .entry(code.to_string())
            .or_default()
            .insert(user_id.to_string(), Connection { sender, is_host });
        inner.user_sessions.insert(user_id.to_string(), code.to_string());
    }

    pub async fn detach(&self, code: &str, user_id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(users) = inner.sessions.get_mut(code) {
            users.remove(user_id);
            if users.is_empty() {
                inner.sessions.remove(code);
            }
        }
        inner.user_sessions.remove(user_id);
    }

    pub async fn session_of(&self, user_id: &str) -> Option<String> {
        self.inner.lock().await.user_sessions.get(user_id).cloned()
    }

    pub async fn send_to(&self, code: &str, user_id: &str, message: ServerMessage) -> bool {
        let sender = {
            let inner = self.inner.lock().await;
            inner
                .sessions
                .get(code)
                .and_then(|users| users.get(user_id))
                .map(|conn| conn.sender.clone())
        };
        match sender {
            Some(sender) => tokio::time::timeout(SEND_TIMEOUT, async { sender.send(message).is_ok() })
                .await
                .unwrap_or(false),
            None => false,
        }
    }

    /// Fans a message out to every connection in the session concurrently,
    /// then drops any connection whose channel is closed.
    pub async fn broadcast(&self, code: &str, message: ServerMessage) {
        self.broadcast_filtered(code, message, |_| true).await;
    }

    pub async fn broadcast_to_host(&self, code: &str, message: ServerMessage) {
        self.broadcast_filtered(code, message, |conn| conn.is_host).await;
    }

    pub async fn broadcast_to_participants(&self, code: &str, message: ServerMessage) {
        self.broadcast_filtered(code, message, |conn| !conn.is_host).await;
    }

    pub async fn broadcast_except(&self, code: &str, exclude_user_id: &str, message: ServerMessage) {
        let recipients = {
            let inner = self.inner.lock().await;
            inner
                .sessions
                .get(code)
                .map(|users| {
                    users
                        .iter()
                        .filter(|(user_id, _)| user_id.as_str() != exclude_user_id)
                        .map(|(user_id, conn)| (user_id.clone(), conn.sender.clone()))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };
        self.fan_out(code, recipients, message).await;
    }

    async fn broadcast_filtered(&self, code: &str, message: ServerMessage, keep: impl Fn(&Connection) -> bool) {
        let recipients = {
            let inner = self.inner.lock().await;
            inner
                .sessions
                .get(code)
                .map(|users| {
                    users
                        .iter()
                        .filter(|(_, conn)| keep(conn))
                        .map(|(user_id, conn)| (user_id.clone(), conn.sender.clone()))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };
        self.fan_out(code, recipients, message).await;
    }

    async fn fan_out(
        &self,
        code: &str,
        recipients: Vec<(String, mpsc::UnboundedSender<ServerMessage>)>,
        message: ServerMessage,
    ) {
        let mut dead = Vec::new();
        for (user_id, sender) in recipients {
            let ok = tokio::time::timeout(SEND_TIMEOUT, async { sender.send(message.clone()).is_ok() })
                .await
                .unwrap_or(false);
            if !ok {
                dead.push(user_id);
            }
        }
        if dead.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().await;
        if let Some(users) = inner.sessions.get_mut(code) {
            for user_id in &dead {
                users.remove(user_id);
            }
        }
        for user_id in dead {
            inner.user_sessions.remove(&user_id);
        }
    }
}
