use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::{Event, ThreadId, UserId};

/// Platform trait - abstraction over the messaging-platform client.
///
/// Every outbound call reports failure through its `Result`; callers log
/// and move on, nothing here is fatal to the agent.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Open the inbound event stream. The stream is not restartable: a
    /// reconnect means a new subscription.
    async fn subscribe(&self) -> Result<mpsc::Receiver<Event>, BotError>;

    /// Send a text message to a thread
    async fn send_text(&self, thread_id: &ThreadId, text: &str) -> Result<(), BotError>;

    /// Rename a thread
    async fn set_thread_name(&self, thread_id: &ThreadId, name: &str) -> Result<(), BotError>;

    /// Set one member's nickname in a thread
    async fn set_nickname(
        &self,
        thread_id: &ThreadId,
        member_id: &UserId,
        nickname: &str,
    ) -> Result<(), BotError>;

    /// Set the thread's quick-reaction emoji
    async fn set_icon(&self, thread_id: &ThreadId, emoji: &str) -> Result<(), BotError>;

    /// Current members of a thread
    async fn members(&self, thread_id: &ThreadId) -> Result<BTreeSet<UserId>, BotError>;

    /// Get platform session info
    fn platform_info(&self) -> PlatformInfo;
}

/// Platform session information
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    /// Account the agent is logged in as
    pub account_id: UserId,
    pub name: String,
}
