//! Action executor - the only place that mutates moderation state or talks
//! to the platform.
//!
//! Work is split in two phases. `execute` runs under the registry lock: it
//! mutates the registry, saves the affected record category and returns the
//! outbound [`Action`]s. `perform` runs after the lock is released and issues
//! those actions against the platform.

use std::sync::Arc;

use crate::application::errors::{BotError, StorageError};
use crate::application::registry::{Checkpoint, Registry};
use crate::application::services::moderation::SessionRuntime;
use crate::domain::entities::{
    prefixed_usage, BotConfig, Command, LockKind, LockTarget, ThreadId, UserId, Verb, DEFAULT_EMOJI,
};
use crate::domain::traits::{Category, Platform, Store};

/// Outbound platform call, optionally followed by a notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send {
        thread_id: ThreadId,
        text: String,
    },
    RenameThread {
        thread_id: ThreadId,
        name: String,
        on_success: Option<String>,
        on_failure: Option<String>,
    },
    SetNickname {
        thread_id: ThreadId,
        member_id: UserId,
        nickname: String,
        on_success: Option<String>,
    },
    SetIcon {
        thread_id: ThreadId,
        emoji: String,
        on_success: Option<String>,
        on_failure: Option<String>,
    },
    /// Set the nickname of every current member, one call each
    ApplyNickname {
        thread_id: ThreadId,
        nickname: String,
        report: bool,
    },
}

impl Action {
    pub fn thread_id(&self) -> &ThreadId {
        match self {
            Action::Send { thread_id, .. }
            | Action::RenameThread { thread_id, .. }
            | Action::SetNickname { thread_id, .. }
            | Action::SetIcon { thread_id, .. }
            | Action::ApplyNickname { thread_id, .. } => thread_id,
        }
    }

    pub fn send(thread_id: &ThreadId, text: impl Into<String>) -> Self {
        Action::Send {
            thread_id: thread_id.clone(),
            text: text.into(),
        }
    }
}

/// Outcome of a nickname fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub applied: usize,
    pub failed: Vec<UserId>,
}

impl FanOutReport {
    pub fn total(&self) -> usize {
        self.applied + self.failed.len()
    }
}

/// Who issued a command, and where
pub struct Invocation<'a> {
    pub config: &'a BotConfig,
    pub runtime: &'a SessionRuntime,
    pub sender_id: &'a UserId,
    pub thread_id: &'a ThreadId,
}

pub struct ActionExecutor {
    platform: Arc<dyn Platform>,
    store: Arc<dyn Store>,
}

impl ActionExecutor {
    pub fn new(platform: Arc<dyn Platform>, store: Arc<dyn Store>) -> Self {
        Self { platform, store }
    }

    /// Apply a validated command. Every command yields exactly one reply,
    /// carried either by a `Send` or by the notices of the returned action.
    pub async fn execute(
        &self,
        registry: &mut Registry,
        inv: &Invocation<'_>,
        command: Command,
    ) -> Vec<Action> {
        let thread_id = inv.thread_id;
        let reply = |text: String| vec![Action::send(thread_id, text)];

        match command {
            Command::Ping => reply("✅ Pong!".to_string()),
            Command::Uptime => reply(format!(
                "⏱️ Bot uptime: {}",
                format_uptime(inv.runtime.uptime_secs())
            )),
            Command::Help => reply(help_text(&inv.config.prefix)),
            Command::WhoAmI => reply(format!("🆔 Your user ID: {}", inv.sender_id)),
            Command::ThreadInfo => reply(format!("🧵 Thread ID: {}", thread_id)),
            Command::ShowRules => match registry.rules(thread_id) {
                Some(rules) => reply(format!("📜 Group Rules:\n{}", rules)),
                None => reply("ℹ️ No rules set for this group.".to_string()),
            },
            Command::Status => reply(status_text(registry, thread_id)),

            Command::LockOn(target) => {
                let before = registry.checkpoint_thread(thread_id);
                registry.lock(thread_id, &target);
                if let Err(e) = self.commit(registry, before, Category::Locks).await {
                    return reply(persist_failure(&e));
                }
                tracing::info!("[{}] {} lock on", thread_id, target.kind());
                lock_on_actions(thread_id, target)
            }
            Command::LockOff(kind) => {
                let before = registry.checkpoint_thread(thread_id);
                if !registry.unlock(thread_id, kind) {
                    return reply(format!("ℹ️ {} lock already off.", lock_label(kind)));
                }
                if let Err(e) = self.commit(registry, before, Category::Locks).await {
                    return reply(persist_failure(&e));
                }
                tracing::info!("[{}] {} lock off", thread_id, kind);
                reply(format!("✅ {} lock disabled.", lock_label(kind)))
            }

            Command::Ban(user_id) => {
                if inv.config.is_admin(&user_id) {
                    return reply("⚠️ The admin cannot be banned.".to_string());
                }
                let before = registry.checkpoint_bans();
                if !registry.ban(&user_id) {
                    return reply("ℹ️ User already banned.".to_string());
                }
                if let Err(e) = self.commit(registry, before, Category::Bans).await {
                    return reply(persist_failure(&e));
                }
                tracing::info!("Banned {}", user_id);
                reply(format!("🚫 User {} banned.", user_id))
            }
            Command::Unban(user_id) => {
                let before = registry.checkpoint_bans();
                if !registry.unban(&user_id) {
                    return reply("ℹ️ User not found in ban list.".to_string());
                }
                if let Err(e) = self.commit(registry, before, Category::Bans).await {
                    return reply(persist_failure(&e));
                }
                tracing::info!("Unbanned {}", user_id);
                reply(format!("✅ User {} unbanned.", user_id))
            }
            Command::Mute(muted) => {
                let before = registry.checkpoint_thread(thread_id);
                if !registry.set_muted(thread_id, muted) {
                    let text = if muted { "🔇 Group already muted." } else { "ℹ️ Group is not muted." };
                    return reply(text.to_string());
                }
                if let Err(e) = self.commit(registry, before, Category::Mutes).await {
                    return reply(persist_failure(&e));
                }
                reply(if muted { "🔇 Group muted." } else { "🔈 Group unmuted." }.to_string())
            }
            Command::SetRules(rules) => {
                let before = registry.checkpoint_thread(thread_id);
                registry.set_rules(thread_id, rules);
                if let Err(e) = self.commit(registry, before, Category::Rules).await {
                    return reply(persist_failure(&e));
                }
                reply("✅ Group rules updated.".to_string())
            }
        }
    }

    /// Save one category from `registry`. On failure the touched slice is
    /// restored from `before` so memory never runs ahead of disk.
    async fn commit(
        &self,
        registry: &mut Registry,
        before: Checkpoint,
        category: Category,
    ) -> Result<(), StorageError> {
        let Some(record) = registry.record(category) else {
            return Ok(());
        };

        if let Err(e) = self.store.save(record).await {
            tracing::error!("Failed to save {}: {}", category, e);
            registry.restore(before);
            return Err(e);
        }
        Ok(())
    }

    /// Issue one action and any notice attached to it. Failures are logged
    /// and reported where a notice exists; nothing is retried. Returns
    /// whether the platform accepted the primary call.
    pub async fn perform(&self, action: Action) -> bool {
        match action {
            Action::Send { thread_id, text } => self.notify(&thread_id, &text).await,
            Action::RenameThread {
                thread_id,
                name,
                on_success,
                on_failure,
            } => match self.platform.set_thread_name(&thread_id, &name).await {
                Ok(()) => {
                    self.notify_opt(&thread_id, on_success).await;
                    true
                }
                Err(e) => {
                    tracing::error!("[{}] Failed to rename thread: {}", thread_id, e);
                    self.notify_opt(&thread_id, on_failure).await;
                    false
                }
            },
            Action::SetNickname {
                thread_id,
                member_id,
                nickname,
                on_success,
            } => match self.platform.set_nickname(&thread_id, &member_id, &nickname).await {
                Ok(()) => {
                    self.notify_opt(&thread_id, on_success).await;
                    true
                }
                Err(e) => {
                    tracing::error!("[{}] Failed to reset nickname of {}: {}", thread_id, member_id, e);
                    false
                }
            },
            Action::SetIcon {
                thread_id,
                emoji,
                on_success,
                on_failure,
            } => match self.platform.set_icon(&thread_id, &emoji).await {
                Ok(()) => {
                    self.notify_opt(&thread_id, on_success).await;
                    true
                }
                Err(e) => {
                    tracing::error!("[{}] Failed to set icon: {}", thread_id, e);
                    self.notify_opt(&thread_id, on_failure).await;
                    false
                }
            },
            Action::ApplyNickname {
                thread_id,
                nickname,
                report,
            } => {
                let outcome = self.apply_nickname(&thread_id, &nickname).await;
                if report {
                    self.notify(&thread_id, &fan_out_notice(&nickname, &outcome)).await;
                }
                outcome.is_ok()
            }
        }
    }

    /// Best-effort fan-out: one member failing does not stop the others
    pub async fn apply_nickname(
        &self,
        thread_id: &ThreadId,
        nickname: &str,
    ) -> Result<FanOutReport, BotError> {
        let members = self.platform.members(thread_id).await.map_err(|e| {
            tracing::error!("[{}] Failed to list members: {}", thread_id, e);
            e
        })?;

        let mut report = FanOutReport::default();
        for member_id in members {
            match self.platform.set_nickname(thread_id, &member_id, nickname).await {
                Ok(()) => {
                    tracing::debug!("[{}] Nickname set for {}", thread_id, member_id);
                    report.applied += 1;
                }
                Err(e) => {
                    tracing::error!("[{}] Nickname set failed for {}: {}", thread_id, member_id, e);
                    report.failed.push(member_id);
                }
            }
        }

        Ok(report)
    }

    async fn notify(&self, thread_id: &ThreadId, text: &str) -> bool {
        match self.platform.send_text(thread_id, text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("[{}] Failed to send message: {}", thread_id, e);
                false
            }
        }
    }

    async fn notify_opt(&self, thread_id: &ThreadId, text: Option<String>) {
        if let Some(text) = text {
            self.notify(thread_id, &text).await;
        }
    }
}

fn lock_on_actions(thread_id: &ThreadId, target: LockTarget) -> Vec<Action> {
    match target {
        LockTarget::Name(name) => vec![Action::RenameThread {
            thread_id: thread_id.clone(),
            on_success: Some(format!("✅ Group name locked as \"{}\"", name)),
            on_failure: Some("❌ Group name lock saved, but renaming the group failed.".to_string()),
            name,
        }],
        LockTarget::Nickname(nickname) => vec![Action::ApplyNickname {
            thread_id: thread_id.clone(),
            nickname,
            report: true,
        }],
        LockTarget::Photo => vec![Action::send(
            thread_id,
            "🔐 Photo lock enabled. Photo changes will be flagged for the admin.",
        )],
        LockTarget::Theme => vec![Action::send(
            thread_id,
            "🔐 Theme lock enabled. Theme changes will be flagged for the admin.",
        )],
        LockTarget::Emoji => vec![Action::SetIcon {
            thread_id: thread_id.clone(),
            emoji: DEFAULT_EMOJI.to_string(),
            on_success: Some(format!("🔐 Emoji lock enabled, icon set to {}", DEFAULT_EMOJI)),
            on_failure: Some("❌ Emoji lock saved, but setting the icon failed.".to_string()),
        }],
    }
}

fn fan_out_notice(nickname: &str, outcome: &Result<FanOutReport, BotError>) -> String {
    match outcome {
        Ok(report) if report.failed.is_empty() => format!(
            "✅ Nickname lock enabled: \"{}\" (applied to {}/{} members)",
            nickname,
            report.applied,
            report.total()
        ),
        Ok(report) => {
            let failed: Vec<&str> = report.failed.iter().map(UserId::as_str).collect();
            format!(
                "⚠️ Nickname lock enabled: \"{}\" (applied to {}/{} members, failed for {})",
                nickname,
                report.applied,
                report.total(),
                failed.join(", ")
            )
        }
        Err(_) => "❌ Nickname lock saved, but the member list could not be loaded.".to_string(),
    }
}

fn persist_failure(e: &StorageError) -> String {
    format!("❌ Could not save the change ({}). Nothing was modified.", e)
}

pub(crate) fn lock_label(kind: LockKind) -> &'static str {
    match kind {
        LockKind::Name => "Group name",
        LockKind::Nickname => "Nickname",
        LockKind::Photo => "Photo",
        LockKind::Theme => "Theme",
        LockKind::Emoji => "Emoji",
    }
}

pub fn help_text(prefix: &str) -> String {
    let mut help = "🔧 Commands:".to_string();
    for verb in Verb::ALL {
        help.push_str(&format!(
            "\n{} - {}",
            prefixed_usage(prefix, verb.usage()),
            verb.description()
        ));
    }
    help
}

fn status_text(registry: &Registry, thread_id: &ThreadId) -> String {
    let mut text = "📋 Thread status:".to_string();
    let state = registry.thread(thread_id).cloned().unwrap_or_default();

    for kind in LockKind::ALL {
        let value = match kind {
            LockKind::Name => state.locks.name.as_ref().map(|n| format!("\"{}\"", n)),
            LockKind::Nickname => state.locks.nickname.as_ref().map(|n| format!("\"{}\"", n)),
            _ => state.locks.is_locked(kind).then(|| "on".to_string()),
        };
        text.push_str(&format!(
            "\n🔐 {}: {}",
            lock_label(kind),
            value.as_deref().unwrap_or("off")
        ));
    }
    text.push_str(&format!("\n🔇 Muted: {}", if state.muted { "yes" } else { "no" }));
    text.push_str(&format!(
        "\n📜 Rules: {}",
        if state.rules.is_some() { "set" } else { "none" }
    ));
    text
}

fn format_uptime(secs: i64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    format!("{} seconds ({}h {}m {}s)", secs, h, m, s)
}
