use super::{LockKind, UserId};
use crate::application::errors::CommandError;

/// Command word recognised after the prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Ping,
    Uptime,
    Help,
    Uid,
    Tid,
    ShowRules,
    Status,
    Lock,
    GroupLock,
    NicknameLock,
    Ban,
    Unban,
    Mute,
    Rules,
}

impl Verb {
    pub const ALL: [Verb; 14] = [
        Verb::Ping,
        Verb::Uptime,
        Verb::Help,
        Verb::Uid,
        Verb::Tid,
        Verb::ShowRules,
        Verb::Status,
        Verb::Lock,
        Verb::GroupLock,
        Verb::NicknameLock,
        Verb::Ban,
        Verb::Unban,
        Verb::Mute,
        Verb::Rules,
    ];

    /// Case-insensitive lookup; `None` for words the agent does not know
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.to_lowercase();
        Self::ALL.into_iter().find(|verb| verb.name() == input)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Verb::Ping => "ping",
            Verb::Uptime => "uptime",
            Verb::Help => "help",
            Verb::Uid => "uid",
            Verb::Tid => "tid",
            Verb::ShowRules => "showrules",
            Verb::Status => "status",
            Verb::Lock => "lock",
            Verb::GroupLock => "grouplock",
            Verb::NicknameLock => "nicknamelock",
            Verb::Ban => "ban",
            Verb::Unban => "unban",
            Verb::Mute => "mute",
            Verb::Rules => "rules",
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            Verb::Lock => "lock <name|nickname|photo|theme|emoji> on|off [text]",
            Verb::GroupLock => "grouplock on <name> | grouplock off",
            Verb::NicknameLock => "nicknamelock on <nickname> | nicknamelock off",
            Verb::Ban => "ban <userID>",
            Verb::Unban => "unban <userID>",
            Verb::Mute => "mute on|off",
            Verb::Rules => "rules <text>",
            other => other.name(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Verb::Ping => "Check the bot is alive",
            Verb::Uptime => "Show how long the session has been up",
            Verb::Help => "Show this message",
            Verb::Uid => "Show your user ID",
            Verb::Tid => "Show this thread's ID",
            Verb::ShowRules => "Show the group rules",
            Verb::Status => "Show active locks for this thread",
            Verb::Lock => "Lock or unlock a group property",
            Verb::GroupLock => "Lock the group name",
            Verb::NicknameLock => "Lock every member's nickname",
            Verb::Ban => "Ignore a user",
            Verb::Unban => "Stop ignoring a user",
            Verb::Mute => "Ignore non-admin commands in this thread",
            Verb::Rules => "Set the group rules",
        }
    }

    /// Verbs that change durable state are admin-only
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Verb::Lock
                | Verb::GroupLock
                | Verb::NicknameLock
                | Verb::Ban
                | Verb::Unban
                | Verb::Mute
                | Verb::Rules
        )
    }
}

/// Desired value supplied by a `lock ... on` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockTarget {
    Name(String),
    Nickname(String),
    Photo,
    Theme,
    Emoji,
}

impl LockTarget {
    pub fn kind(&self) -> LockKind {
        match self {
            LockTarget::Name(_) => LockKind::Name,
            LockTarget::Nickname(_) => LockKind::Nickname,
            LockTarget::Photo => LockKind::Photo,
            LockTarget::Theme => LockKind::Theme,
            LockTarget::Emoji => LockKind::Emoji,
        }
    }
}

/// A validated command, one case per action the agent can take
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Uptime,
    Help,
    WhoAmI,
    ThreadInfo,
    ShowRules,
    Status,
    LockOn(LockTarget),
    LockOff(LockKind),
    Ban(UserId),
    Unban(UserId),
    Mute(bool),
    SetRules(String),
}

impl Command {
    /// Validate the arguments of an already recognised verb
    pub fn parse(verb: Verb, args: &[String]) -> Result<Self, CommandError> {
        match verb {
            Verb::Ping => Ok(Command::Ping),
            Verb::Uptime => Ok(Command::Uptime),
            Verb::Help => Ok(Command::Help),
            Verb::Uid => Ok(Command::WhoAmI),
            Verb::Tid => Ok(Command::ThreadInfo),
            Verb::ShowRules => Ok(Command::ShowRules),
            Verb::Status => Ok(Command::Status),
            Verb::Lock => {
                let kind = args
                    .first()
                    .and_then(|word| LockKind::parse(word))
                    .ok_or_else(|| CommandError::InvalidArgs(verb.usage().to_string()))?;
                parse_toggle(kind, &args[1..])
            }
            Verb::GroupLock => parse_toggle(LockKind::Name, args)
                .map_err(|_| CommandError::InvalidArgs(verb.usage().to_string())),
            Verb::NicknameLock => parse_toggle(LockKind::Nickname, args)
                .map_err(|_| CommandError::InvalidArgs(verb.usage().to_string())),
            Verb::Ban | Verb::Unban => match args {
                [user] => {
                    let user = UserId::new(user.clone());
                    Ok(if verb == Verb::Ban { Command::Ban(user) } else { Command::Unban(user) })
                }
                _ => Err(CommandError::InvalidArgs(verb.usage().to_string())),
            },
            Verb::Mute => match on_off(args.first()) {
                Some(on) => Ok(Command::Mute(on)),
                None => Err(CommandError::InvalidArgs(verb.usage().to_string())),
            },
            Verb::Rules => {
                if args.is_empty() {
                    return Err(CommandError::InvalidArgs(verb.usage().to_string()));
                }
                Ok(Command::SetRules(args.join(" ")))
            }
        }
    }
}

fn on_off(word: Option<&String>) -> Option<bool> {
    match word.map(|w| w.to_lowercase()).as_deref() {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => None,
    }
}

/// Put the command prefix in front of every alternative of a usage line
pub fn prefixed_usage(prefix: &str, usage: &str) -> String {
    usage
        .split(" | ")
        .map(|alternative| format!("{}{}", prefix, alternative))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn parse_toggle(kind: LockKind, args: &[String]) -> Result<Command, CommandError> {
    let usage = || {
        if kind.takes_value() {
            CommandError::InvalidArgs(format!("lock {kind} on <{kind}> | lock {kind} off"))
        } else {
            CommandError::InvalidArgs(format!("lock {kind} on|off"))
        }
    };

    match on_off(args.first()) {
        Some(false) => Ok(Command::LockOff(kind)),
        Some(true) => {
            let text = args[1..].join(" ");
            let target = match kind {
                LockKind::Name | LockKind::Nickname if text.is_empty() => return Err(usage()),
                LockKind::Name => LockTarget::Name(text),
                LockKind::Nickname => LockTarget::Nickname(text),
                LockKind::Photo => LockTarget::Photo,
                LockKind::Theme => LockTarget::Theme,
                LockKind::Emoji => LockTarget::Emoji,
            };
            Ok(Command::LockOn(target))
        }
        None => Err(usage()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_lock_name_joins_remaining_words() {
        let cmd = Command::parse(Verb::Lock, &args("name on Study Group")).unwrap();
        assert_eq!(cmd, Command::LockOn(LockTarget::Name("Study Group".into())));
    }

    #[test]
    fn test_lock_value_required_for_name_and_nickname() {
        let err = Command::parse(Verb::Lock, &args("nickname on")).unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgs(usage) if usage.contains("nickname on")));

        let cmd = Command::parse(Verb::Lock, &args("photo ON")).unwrap();
        assert_eq!(cmd, Command::LockOn(LockTarget::Photo));
    }

    #[test]
    fn test_lock_rejects_unknown_kind_and_toggle() {
        assert!(Command::parse(Verb::Lock, &args("banner on x")).is_err());
        assert!(Command::parse(Verb::Lock, &args("theme maybe")).is_err());
        assert!(Command::parse(Verb::Lock, &[]).is_err());
    }

    #[test]
    fn test_legacy_alias_verbs() {
        let cmd = Command::parse(Verb::GroupLock, &args("on Night Owls")).unwrap();
        assert_eq!(cmd, Command::LockOn(LockTarget::Name("Night Owls".into())));

        let cmd = Command::parse(Verb::NicknameLock, &args("off")).unwrap();
        assert_eq!(cmd, Command::LockOff(LockKind::Nickname));

        let err = Command::parse(Verb::GroupLock, &args("on")).unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgs(usage) if usage.starts_with("grouplock")));
    }

    #[test]
    fn test_prefixed_usage_covers_every_alternative() {
        assert_eq!(
            prefixed_usage("!", "lock nickname on <nickname> | lock nickname off"),
            "!lock nickname on <nickname> | !lock nickname off"
        );
        assert_eq!(prefixed_usage("/", "mute on|off"), "/mute on|off");
    }

    #[test]
    fn test_ban_needs_exactly_one_id() {
        assert_eq!(
            Command::parse(Verb::Ban, &args("U9")).unwrap(),
            Command::Ban(UserId::from("U9"))
        );
        assert!(Command::parse(Verb::Unban, &args("U9 U10")).is_err());
        assert!(Command::parse(Verb::Ban, &[]).is_err());
    }

    #[test]
    fn test_rules_and_mute() {
        assert_eq!(
            Command::parse(Verb::Rules, &args("be kind")).unwrap(),
            Command::SetRules("be kind".into())
        );
        assert!(Command::parse(Verb::Rules, &[]).is_err());
        assert_eq!(Command::parse(Verb::Mute, &args("off")).unwrap(), Command::Mute(false));
        assert!(Command::parse(Verb::Mute, &args("loud")).is_err());
    }

    #[test]
    fn test_verb_lookup_and_admin_gate() {
        assert_eq!(Verb::parse("PING"), Some(Verb::Ping));
        assert_eq!(Verb::parse("dance"), None);
        assert!(Verb::Rules.requires_admin());
        assert!(!Verb::ShowRules.requires_admin());
        assert!(!Verb::Uid.requires_admin());
    }
}
