//! Moderation service - owns the desired state and ties the interpreter,
//! reconciliation and executor together.
//!
//! Lock order: `config` and `runtime` are only ever taken briefly, and the
//! registry mutex is never held while the platform is called.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

use crate::application::errors::StorageError;
use crate::application::registry::Registry;
use crate::application::services::command_service::{CommandService, Interpretation};
use crate::application::services::executor::{Action, ActionExecutor, Invocation};
use crate::application::services::reconcile_service::ReconcileService;
use crate::domain::entities::{BotConfig, Event, DEFAULT_EMOJI};
use crate::domain::traits::{Platform, PlatformInfo, Record, Store};

/// Per-session facts, rebuilt on every (re)configuration and never persisted
#[derive(Debug, Clone)]
pub struct SessionRuntime {
    pub started_at: DateTime<Utc>,
    pub account: PlatformInfo,
}

impl SessionRuntime {
    pub fn start(account: PlatformInfo) -> Self {
        Self {
            started_at: Utc::now(),
            account,
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}

pub struct ModerationService {
    config: RwLock<BotConfig>,
    runtime: RwLock<SessionRuntime>,
    registry: Mutex<Registry>,
    commands: CommandService,
    reconciler: ReconcileService,
    executor: ActionExecutor,
    platform: Arc<dyn Platform>,
    store: Arc<dyn Store>,
}

impl ModerationService {
    pub fn new(
        config: BotConfig,
        registry: Registry,
        platform: Arc<dyn Platform>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            runtime: RwLock::new(SessionRuntime::start(platform.platform_info())),
            registry: Mutex::new(registry),
            commands: CommandService::new(),
            reconciler: ReconcileService::new(),
            executor: ActionExecutor::new(platform.clone(), store.clone()),
            platform,
            store,
        }
    }

    pub async fn config(&self) -> BotConfig {
        self.config.read().await.clone()
    }

    /// Copy of the current desired state
    pub async fn registry(&self) -> Registry {
        self.registry.lock().await.clone()
    }

    pub async fn runtime(&self) -> SessionRuntime {
        self.runtime.read().await.clone()
    }

    /// Decide on one event and commit any state change. Returns the
    /// platform actions still to be performed; the registry lock is released
    /// before this returns.
    pub async fn handle(&self, event: &Event) -> Vec<Action> {
        let config = self.config().await;
        let mut registry = self.registry.lock().await;

        if let Event::IconChanged { thread_id, emoji } = event {
            if is_icon_echo(emoji.as_deref()) && registry.take_icon_echo(thread_id, Instant::now()) {
                tracing::debug!("[{}] Icon change is our own reset", thread_id);
                return Vec::new();
            }
        }

        let actions = match event {
            Event::Message {
                sender_id,
                thread_id,
                body,
            } => match self.commands.interpret(&config, &registry, sender_id, thread_id, body) {
                Interpretation::Ignore => Vec::new(),
                Interpretation::Reply(text) => vec![Action::send(thread_id, text)],
                Interpretation::Execute(command) => {
                    tracing::debug!("[{}] Executing {:?} from {}", thread_id, command, sender_id);
                    let runtime = self.runtime().await;
                    let inv = Invocation {
                        config: &config,
                        runtime: &runtime,
                        sender_id,
                        thread_id,
                    };
                    self.executor.execute(&mut registry, &inv, command).await
                }
            },
            other => self.reconciler.decide(other, &config, &registry),
        };

        note_icon_resets(&mut registry, &actions);
        actions
    }

    /// Perform actions in order. An icon reset the platform refused will
    /// never be echoed, so its pending marker is dropped.
    pub async fn perform(&self, actions: Vec<Action>) {
        for action in actions {
            let icon_thread = match &action {
                Action::SetIcon { thread_id, .. } => Some(thread_id.clone()),
                _ => None,
            };
            let accepted = self.executor.perform(action).await;
            if let (Some(thread_id), false) = (icon_thread, accepted) {
                self.registry.lock().await.forget_icon_echo(&thread_id);
            }
        }
    }

    /// Handle an event and wait for its platform calls to finish
    pub async fn process(&self, event: &Event) {
        let actions = self.handle(event).await;
        self.perform(actions).await;
    }

    /// Replace the bot config wholesale and restart the session clock
    pub async fn reconfigure(&self, config: BotConfig) -> Result<(), StorageError> {
        self.store.save(Record::Config(config.clone())).await?;
        tracing::info!("Bot configured with admin: {}", config.admin_id);
        *self.config.write().await = config;
        *self.runtime.write().await = SessionRuntime::start(self.platform.platform_info());
        Ok(())
    }

    /// Silent corrective actions that push every stored lock back onto the
    /// platform, used once a session comes up
    pub async fn reassert_actions(&self) -> Vec<Action> {
        let mut registry = self.registry.lock().await;
        let mut actions = Vec::new();

        for (thread_id, locks) in registry.locked_threads() {
            if let Some(name) = &locks.name {
                actions.push(Action::RenameThread {
                    thread_id: thread_id.clone(),
                    name: name.clone(),
                    on_success: None,
                    on_failure: None,
                });
            }
            if let Some(nickname) = &locks.nickname {
                actions.push(Action::ApplyNickname {
                    thread_id: thread_id.clone(),
                    nickname: nickname.clone(),
                    report: false,
                });
            }
            if locks.emoji {
                actions.push(Action::SetIcon {
                    thread_id: thread_id.clone(),
                    emoji: DEFAULT_EMOJI.to_string(),
                    on_success: None,
                    on_failure: None,
                });
            }
        }

        note_icon_resets(&mut registry, &actions);
        actions
    }

    /// Rewrite every persisted category from memory
    pub async fn flush(&self) -> Result<(), StorageError> {
        let config = self.config().await;
        let registry = self.registry.lock().await;

        self.store.save(Record::Config(config)).await?;
        for record in registry.records() {
            self.store.save(record).await?;
        }

        tracing::info!("Moderation state flushed");
        Ok(())
    }
}

/// An icon event that does not contradict the reset we issued: either the
/// platform did not say which emoji, or it reports the default
fn is_icon_echo(emoji: Option<&str>) -> bool {
    emoji.map_or(true, |e| e == DEFAULT_EMOJI)
}

fn note_icon_resets(registry: &mut Registry, actions: &[Action]) {
    let now = Instant::now();
    for action in actions {
        if let Action::SetIcon { thread_id, .. } = action {
            registry.expect_icon_echo(thread_id, now);
        }
    }
}
