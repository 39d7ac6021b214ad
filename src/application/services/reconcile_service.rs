//! Reconciliation - decide how to answer change notifications from the platform
//!
//! Decisions are pure: they read the registry and return actions, they never
//! mutate the desired state. An observed value equal to the locked value is
//! always a no-op, which is what keeps a correction's own echo from
//! triggering another correction. Icon events that carry no emoji cannot be
//! compared, so their echoes are filtered by the caller before deciding.

use crate::application::registry::Registry;
use crate::application::services::executor::Action;
use crate::domain::entities::{BotConfig, Event, ThreadId, UserId, DEFAULT_EMOJI};

#[derive(Debug, Default)]
pub struct ReconcileService;

impl ReconcileService {
    pub fn new() -> Self {
        Self
    }

    pub fn decide(&self, event: &Event, config: &BotConfig, registry: &Registry) -> Vec<Action> {
        if let Some(author) = event.author() {
            if registry.is_banned(author) {
                tracing::debug!("[{}] Ignoring {} by banned {}", event.thread_id(), event.kind(), author);
                return Vec::new();
            }
        }

        let thread_id = event.thread_id();
        let locks = registry.locks(thread_id).cloned().unwrap_or_default();

        match event {
            // Commands go through the command service
            Event::Message { .. } => Vec::new(),

            Event::ThreadRenamed { new_name, author_id, .. } => match &locks.name {
                Some(locked) if locked != new_name => {
                    tracing::info!("[{}] Name changed by {}, reverting", thread_id, author_id);
                    vec![Action::RenameThread {
                        thread_id: thread_id.clone(),
                        name: locked.clone(),
                        on_success: Some(format!(
                            "🔐 Group name lock active. Resetting name to \"{}\".",
                            locked
                        )),
                        on_failure: None,
                    }]
                }
                _ => Vec::new(),
            },

            Event::NicknameChanged {
                member_id,
                new_nickname,
                author_id,
                ..
            } => match &locks.nickname {
                // Admin changes are allowed through once and do not move the lock
                Some(_) if config.is_admin(author_id) => {
                    tracing::debug!("[{}] Admin changed nickname of {}", thread_id, member_id);
                    Vec::new()
                }
                Some(locked) if locked != new_nickname => {
                    tracing::info!("[{}] Nickname of {} changed by {}, reverting", thread_id, member_id, author_id);
                    vec![Action::SetNickname {
                        thread_id: thread_id.clone(),
                        member_id: member_id.clone(),
                        nickname: locked.clone(),
                        on_success: Some(format!(
                            "🔐 Nickname lock active. Resetting nickname of {} to \"{}\".",
                            member_id, locked
                        )),
                    }]
                }
                _ => Vec::new(),
            },

            Event::IconChanged { emoji, .. } => {
                if !locks.emoji || emoji.as_deref() == Some(DEFAULT_EMOJI) {
                    return Vec::new();
                }
                vec![Action::SetIcon {
                    thread_id: thread_id.clone(),
                    emoji: DEFAULT_EMOJI.to_string(),
                    on_success: Some(format!("🔐 Emoji lock active. Resetting icon to {}.", DEFAULT_EMOJI)),
                    on_failure: None,
                }]
            }

            // No reliable way to restore these, so ask the admin
            Event::ThemeChanged { .. } if locks.theme => {
                vec![manual_revert_notice(thread_id, "theme", &config.admin_id)]
            }
            Event::PhotoChanged { .. } if locks.photo => {
                vec![manual_revert_notice(thread_id, "photo", &config.admin_id)]
            }
            Event::ThemeChanged { .. } | Event::PhotoChanged { .. } => Vec::new(),

            Event::MemberAdded { new_member_ids, .. } => {
                if new_member_ids.is_empty() {
                    return Vec::new();
                }
                vec![welcome(thread_id, new_member_ids, config, registry)]
            }
        }
    }
}

fn manual_revert_notice(thread_id: &ThreadId, property: &str, admin_id: &UserId) -> Action {
    Action::send(
        thread_id,
        format!(
            "⚠️ {} lock active: the group {} was changed. Admin {}, please revert it manually.",
            capitalize(property),
            property,
            admin_id
        ),
    )
}

fn welcome(thread_id: &ThreadId, members: &[UserId], config: &BotConfig, registry: &Registry) -> Action {
    let mentions: Vec<String> = members.iter().map(|m| format!("@{}", m)).collect();
    let mut text = format!(
        "👋 Welcome to the group, {}! Please read the rules and enjoy!",
        mentions.join(", ")
    );
    if registry.rules(thread_id).is_some() {
        text.push_str(&format!(" Type {}showrules to see them.", config.prefix));
    }
    Action::send(thread_id, text)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{LockKind, LockTarget};

    fn config() -> BotConfig {
        BotConfig::new("ADMIN", Some("!")).unwrap()
    }

    fn t1() -> ThreadId {
        ThreadId::from("T1")
    }

    fn renamed(name: &str, author: &str) -> Event {
        Event::ThreadRenamed {
            thread_id: t1(),
            new_name: name.into(),
            author_id: author.into(),
        }
    }

    fn nick(value: &str, author: &str) -> Event {
        Event::NicknameChanged {
            thread_id: t1(),
            member_id: "M1".into(),
            new_nickname: value.into(),
            author_id: author.into(),
        }
    }

    #[test]
    fn test_rename_reverted_only_when_value_differs() {
        let mut registry = Registry::new();
        registry.lock(&t1(), &LockTarget::Name("Study Group".into()));
        let service = ReconcileService::new();

        let actions = service.decide(&renamed("Spam Group", "U2"), &config(), &registry);
        assert!(matches!(
            actions.as_slice(),
            [Action::RenameThread { name, .. }] if name == "Study Group"
        ));

        // the correction's own echo
        assert!(service.decide(&renamed("Study Group", "BOT"), &config(), &registry).is_empty());
        assert!(service.decide(&renamed("Study Group", "BOT"), &config(), &registry).is_empty());
    }

    #[test]
    fn test_unlocked_kinds_never_correct() {
        let registry = Registry::new();
        let service = ReconcileService::new();
        let events = [
            renamed("x", "U2"),
            nick("y", "U2"),
            Event::IconChanged { thread_id: t1(), emoji: Some("🔥".into()) },
            Event::ThemeChanged { thread_id: t1() },
            Event::PhotoChanged { thread_id: t1() },
        ];
        for event in &events {
            assert!(service.decide(event, &config(), &registry).is_empty(), "{event:?}");
        }
    }

    #[test]
    fn test_nickname_admin_override_and_echo() {
        let mut registry = Registry::new();
        registry.lock(&t1(), &LockTarget::Nickname("member".into()));
        let service = ReconcileService::new();

        assert!(service.decide(&nick("boss", "ADMIN"), &config(), &registry).is_empty());
        assert!(service.decide(&nick("member", "BOT"), &config(), &registry).is_empty());

        let actions = service.decide(&nick("troll", "U2"), &config(), &registry);
        assert!(matches!(
            actions.as_slice(),
            [Action::SetNickname { member_id, nickname, .. }]
                if member_id.as_str() == "M1" && nickname == "member"
        ));
        // the admin change did not move the lock
        assert_eq!(registry.locks(&t1()).unwrap().nickname.as_deref(), Some("member"));
    }

    #[test]
    fn test_banned_author_is_ignored() {
        let mut registry = Registry::new();
        registry.lock(&t1(), &LockTarget::Name("Study Group".into()));
        registry.ban(&UserId::from("U9"));

        let actions = ReconcileService::new().decide(&renamed("Spam", "U9"), &config(), &registry);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_icon_reset_skips_default_echo() {
        let mut registry = Registry::new();
        registry.lock(&t1(), &LockTarget::Emoji);
        let service = ReconcileService::new();

        let changed = Event::IconChanged { thread_id: t1(), emoji: Some("🔥".into()) };
        assert!(matches!(
            service.decide(&changed, &config(), &registry).as_slice(),
            [Action::SetIcon { emoji, .. }] if emoji == DEFAULT_EMOJI
        ));

        let echo = Event::IconChanged { thread_id: t1(), emoji: Some(DEFAULT_EMOJI.into()) };
        assert!(service.decide(&echo, &config(), &registry).is_empty());
    }

    #[test]
    fn test_theme_and_photo_ask_admin() {
        let mut registry = Registry::new();
        registry.lock(&t1(), &LockTarget::Theme);
        registry.lock(&t1(), &LockTarget::Photo);
        registry.unlock(&t1(), LockKind::Photo);
        let service = ReconcileService::new();

        let theme = service.decide(&Event::ThemeChanged { thread_id: t1() }, &config(), &registry);
        assert!(matches!(
            theme.as_slice(),
            [Action::Send { text, .. }] if text.contains("ADMIN") && text.contains("theme")
        ));
        assert!(service
            .decide(&Event::PhotoChanged { thread_id: t1() }, &config(), &registry)
            .is_empty());
    }

    #[test]
    fn test_welcome_lists_all_members_and_rules_hint() {
        let mut registry = Registry::new();
        let service = ReconcileService::new();
        let joined = Event::MemberAdded {
            thread_id: t1(),
            new_member_ids: vec!["U4".into(), "U5".into()],
        };

        let actions = service.decide(&joined, &config(), &registry);
        assert!(matches!(
            actions.as_slice(),
            [Action::Send { text, .. }] if text.contains("@U4, @U5") && !text.contains("showrules")
        ));

        registry.set_rules(&t1(), "be kind");
        let actions = service.decide(&joined, &config(), &registry);
        assert!(matches!(
            actions.as_slice(),
            [Action::Send { text, .. }] if text.contains("!showrules")
        ));
    }
}
