//! In-memory platform that records every outbound call
//!
//! Used by the integration tests to drive the whole agent without a network.
//! Members, failures and change echoes are configured up front; inbound
//! events are pushed through [`RecordingPlatform::sender`].

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

use crate::application::errors::BotError;
use crate::domain::entities::{Event, ThreadId, UserId};
use crate::domain::traits::{Platform, PlatformInfo};

/// One outbound platform call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SendText {
        thread_id: ThreadId,
        text: String,
    },
    SetThreadName {
        thread_id: ThreadId,
        name: String,
    },
    SetNickname {
        thread_id: ThreadId,
        member_id: UserId,
        nickname: String,
    },
    SetIcon {
        thread_id: ThreadId,
        emoji: String,
    },
}

pub struct RecordingPlatform {
    info: PlatformInfo,
    calls: Mutex<Vec<Call>>,
    changed: Notify,
    members: Mutex<HashMap<ThreadId, BTreeSet<UserId>>>,
    failing_members: Mutex<BTreeSet<UserId>>,
    fail_renames: AtomicBool,
    fail_icons: AtomicBool,
    slow_first_rename: Mutex<Option<Duration>>,
    echo: AtomicBool,
    bare_icon_echo: AtomicBool,
    events_tx: mpsc::Sender<Event>,
    events_rx: Mutex<Option<mpsc::Receiver<Event>>>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel(100);
        Self {
            info: PlatformInfo {
                account_id: UserId::from("BOT"),
                name: "recording".to_string(),
            },
            calls: Mutex::new(Vec::new()),
            changed: Notify::new(),
            members: Mutex::new(HashMap::new()),
            failing_members: Mutex::new(BTreeSet::new()),
            fail_renames: AtomicBool::new(false),
            fail_icons: AtomicBool::new(false),
            slow_first_rename: Mutex::new(None),
            echo: AtomicBool::new(false),
            bare_icon_echo: AtomicBool::new(false),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    pub fn with_members(self, thread_id: &str, members: &[&str]) -> Self {
        lock(&self.members)
            .entry(ThreadId::from(thread_id))
            .or_default()
            .extend(members.iter().map(|m| UserId::from(*m)));
        self
    }

    /// Make `set_nickname` fail for one member
    pub fn with_failing_member(self, member_id: &str) -> Self {
        lock(&self.failing_members).insert(UserId::from(member_id));
        self
    }

    /// Make every `set_thread_name` fail
    pub fn with_failing_renames(self) -> Self {
        self.fail_renames.store(true, Ordering::SeqCst);
        self
    }

    /// Make every `set_icon` fail
    pub fn with_failing_icons(self) -> Self {
        self.fail_icons.store(true, Ordering::SeqCst);
        self
    }

    /// Hold the first `set_thread_name` for `delay` before it lands
    pub fn with_slow_first_rename(self, delay: Duration) -> Self {
        *lock(&self.slow_first_rename) = Some(delay);
        self
    }

    /// Report successful changes back as events authored by the bot account,
    /// the way a real platform does
    pub fn with_echo(self) -> Self {
        self.echo.store(true, Ordering::SeqCst);
        self
    }

    /// Like [`with_echo`](Self::with_echo), but icon echoes omit the emoji
    pub fn with_bare_icon_echo(self) -> Self {
        self.bare_icon_echo.store(true, Ordering::SeqCst);
        self.with_echo()
    }

    /// Handle for injecting inbound events
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.events_tx.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Texts sent to one thread, in order
    pub fn sent_texts(&self, thread_id: &str) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                Call::SendText { thread_id: t, text } if t.as_str() == thread_id => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }

    /// Wait until at least `count` calls were recorded. Returns false on timeout.
    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let changed = self.changed.notified();
            if lock(&self.calls).len() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                return lock(&self.calls).len() >= count;
            }
        }
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
        self.changed.notify_waiters();
    }

    fn echo(&self, event: Event) {
        if self.echo.load(Ordering::SeqCst) {
            if let Err(e) = self.events_tx.try_send(event) {
                tracing::warn!("Dropping echo: {}", e);
            }
        }
    }
}

impl Default for RecordingPlatform {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn subscribe(&self) -> Result<mpsc::Receiver<Event>, BotError> {
        lock(&self.events_rx)
            .take()
            .ok_or_else(|| BotError::Platform("already subscribed".to_string()))
    }

    async fn send_text(&self, thread_id: &ThreadId, text: &str) -> Result<(), BotError> {
        self.record(Call::SendText {
            thread_id: thread_id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn set_thread_name(&self, thread_id: &ThreadId, name: &str) -> Result<(), BotError> {
        let delay = lock(&self.slow_first_rename).take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record(Call::SetThreadName {
            thread_id: thread_id.clone(),
            name: name.to_string(),
        });
        if self.fail_renames.load(Ordering::SeqCst) {
            return Err(BotError::Platform("rename rejected".to_string()));
        }
        self.echo(Event::ThreadRenamed {
            thread_id: thread_id.clone(),
            new_name: name.to_string(),
            author_id: self.info.account_id.clone(),
        });
        Ok(())
    }

    async fn set_nickname(
        &self,
        thread_id: &ThreadId,
        member_id: &UserId,
        nickname: &str,
    ) -> Result<(), BotError> {
        self.record(Call::SetNickname {
            thread_id: thread_id.clone(),
            member_id: member_id.clone(),
            nickname: nickname.to_string(),
        });
        if lock(&self.failing_members).contains(member_id) {
            return Err(BotError::Platform(format!("cannot change nickname of {}", member_id)));
        }
        self.echo(Event::NicknameChanged {
            thread_id: thread_id.clone(),
            member_id: member_id.clone(),
            new_nickname: nickname.to_string(),
            author_id: self.info.account_id.clone(),
        });
        Ok(())
    }

    async fn set_icon(&self, thread_id: &ThreadId, emoji: &str) -> Result<(), BotError> {
        self.record(Call::SetIcon {
            thread_id: thread_id.clone(),
            emoji: emoji.to_string(),
        });
        if self.fail_icons.load(Ordering::SeqCst) {
            return Err(BotError::Platform("icon change rejected".to_string()));
        }
        let reported = (!self.bare_icon_echo.load(Ordering::SeqCst)).then(|| emoji.to_string());
        self.echo(Event::IconChanged {
            thread_id: thread_id.clone(),
            emoji: reported,
        });
        Ok(())
    }

    async fn members(&self, thread_id: &ThreadId) -> Result<BTreeSet<UserId>, BotError> {
        Ok(lock(&self.members).get(thread_id).cloned().unwrap_or_default())
    }

    fn platform_info(&self) -> PlatformInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_and_failures() {
        let platform = RecordingPlatform::new()
            .with_members("T1", &["A", "B"])
            .with_failing_member("B");

        platform.send_text(&"T1".into(), "hi").await.unwrap();
        platform.set_nickname(&"T1".into(), &"A".into(), "x").await.unwrap();
        assert!(platform.set_nickname(&"T1".into(), &"B".into(), "x").await.is_err());

        assert_eq!(platform.calls().len(), 3);
        assert_eq!(platform.sent_texts("T1"), vec!["hi".to_string()]);
        assert_eq!(platform.members(&"T1".into()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_echo_and_single_subscription() {
        let platform = RecordingPlatform::new().with_echo();
        let mut events = platform.subscribe().await.unwrap();
        assert!(platform.subscribe().await.is_err());

        platform.set_thread_name(&"T1".into(), "Study Group").await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(Event::ThreadRenamed {
                thread_id: "T1".into(),
                new_name: "Study Group".into(),
                author_id: "BOT".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_bare_icon_echo_omits_emoji() {
        let platform = RecordingPlatform::new().with_bare_icon_echo();
        let mut events = platform.subscribe().await.unwrap();

        platform.set_icon(&"T1".into(), "👍").await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(Event::IconChanged { thread_id: "T1".into(), emoji: None })
        );
    }

    #[tokio::test]
    async fn test_wait_for_calls_times_out() {
        let platform = RecordingPlatform::new();
        assert!(!platform.wait_for_calls(1, Duration::from_millis(20)).await);
        platform.send_text(&"T1".into(), "hi").await.unwrap();
        assert!(platform.wait_for_calls(1, Duration::from_millis(20)).await);
    }
}
