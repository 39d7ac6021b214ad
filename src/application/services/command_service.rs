use crate::application::errors::CommandError;
use crate::application::messaging::middleware::{Context, MiddlewareChain, MiddlewareError};
use crate::application::messaging::parser::{CommandParser, ParsedCommand};
use crate::application::registry::Registry;
use crate::domain::entities::{prefixed_usage, BotConfig, Command, ThreadId, UserId, Verb};

/// What to do with an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// Plain conversation, or a sender/thread the agent must not answer
    Ignore,
    /// Denial, usage hint or unknown-command notice
    Reply(String),
    Execute(Command),
}

/// Turns raw message bodies into authorized, validated commands
pub struct CommandService {
    gates: MiddlewareChain,
}

impl CommandService {
    pub fn new() -> Self {
        Self {
            gates: MiddlewareChain::moderation(),
        }
    }

    pub fn interpret(
        &self,
        config: &BotConfig,
        registry: &Registry,
        sender_id: &UserId,
        thread_id: &ThreadId,
        body: &str,
    ) -> Interpretation {
        let Some(parsed) = CommandParser::new(&config.prefix).parse(body) else {
            return Interpretation::Ignore;
        };

        let ctx = Context {
            sender_id: sender_id.clone(),
            thread_id: thread_id.clone(),
            verb: Verb::parse(&parsed.verb),
            is_admin: config.is_admin(sender_id),
            sender_banned: registry.is_banned(sender_id),
            thread_muted: registry.is_muted(thread_id),
        };

        let verb = match self.gates.run(ctx) {
            Ok(ctx) => ctx.verb,
            Err(MiddlewareError::Dropped(_)) => return Interpretation::Ignore,
            Err(MiddlewareError::PermissionDenied(_)) => {
                return Interpretation::Reply(error_reply(&config.prefix, &CommandError::PermissionDenied))
            }
        };

        match resolve(verb, &parsed) {
            Ok(command) => Interpretation::Execute(command),
            Err(e) => Interpretation::Reply(error_reply(&config.prefix, &e)),
        }
    }
}

impl Default for CommandService {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(verb: Option<Verb>, parsed: &ParsedCommand) -> Result<Command, CommandError> {
    let verb = verb.ok_or_else(|| CommandError::UnknownCommand(parsed.verb.clone()))?;
    Command::parse(verb, &parsed.args)
}

fn error_reply(prefix: &str, error: &CommandError) -> String {
    match error {
        CommandError::UnknownCommand(_) => {
            format!("❓ Unknown command. Use {}help for help.", prefix)
        }
        CommandError::InvalidArgs(usage) => format!("⚠️ Usage: {}", prefixed_usage(prefix, usage)),
        CommandError::PermissionDenied => "⛔ Only the bot admin can use this command.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::LockTarget;

    fn config() -> BotConfig {
        BotConfig::new("ADMIN", Some("!")).unwrap()
    }

    fn interpret(registry: &Registry, sender: &str, body: &str) -> Interpretation {
        CommandService::new().interpret(&config(), registry, &sender.into(), &"T1".into(), body)
    }

    #[test]
    fn test_plain_text_is_ignored() {
        assert_eq!(interpret(&Registry::new(), "U2", "hello"), Interpretation::Ignore);
    }

    #[test]
    fn test_admin_lock_command_executes() {
        assert_eq!(
            interpret(&Registry::new(), "ADMIN", "!lock name on Study Group"),
            Interpretation::Execute(Command::LockOn(LockTarget::Name("Study Group".into())))
        );
    }

    #[test]
    fn test_non_admin_denied_even_with_bad_args() {
        for body in ["!ban", "!ban U3", "!unban U3", "!mute on", "!rules x", "!lock name off", "!grouplock"] {
            match interpret(&Registry::new(), "U2", body) {
                Interpretation::Reply(text) => assert!(text.starts_with("⛔"), "{body}: {text}"),
                other => panic!("{body}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_open_verbs_for_anyone() {
        for (body, expected) in [
            ("!ping", Command::Ping),
            ("!HELP", Command::Help),
            ("!uid", Command::WhoAmI),
            ("!tid", Command::ThreadInfo),
        ] {
            assert_eq!(interpret(&Registry::new(), "U2", body), Interpretation::Execute(expected));
        }
    }

    #[test]
    fn test_usage_and_unknown_replies() {
        let usage = interpret(&Registry::new(), "ADMIN", "!lock nickname on");
        assert_eq!(
            usage,
            Interpretation::Reply("⚠️ Usage: !lock nickname on <nickname> | !lock nickname off".into())
        );

        let unknown = interpret(&Registry::new(), "U2", "!dance");
        assert_eq!(unknown, Interpretation::Reply("❓ Unknown command. Use !help for help.".into()));
    }

    #[test]
    fn test_banned_and_muted_are_silent() {
        let mut registry = Registry::new();
        registry.ban(&UserId::from("U9"));
        registry.set_muted(&ThreadId::from("T1"), true);

        assert_eq!(interpret(&registry, "U9", "!ping"), Interpretation::Ignore);
        assert_eq!(interpret(&registry, "U2", "!ping"), Interpretation::Ignore);
        assert_eq!(interpret(&registry, "U2", "!dance"), Interpretation::Ignore);
        assert_eq!(interpret(&registry, "ADMIN", "!ping"), Interpretation::Execute(Command::Ping));
    }
}
