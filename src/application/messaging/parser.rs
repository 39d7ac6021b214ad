//! Command parser - Splits a prefixed message body into a verb and arguments

/// A prefixed message split on whitespace. The verb is kept as typed so an
/// unknown word can be echoed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub verb: String,
    pub args: Vec<String>,
}

/// Recognises messages that start with the configured command prefix
pub struct CommandParser<'a> {
    prefix: &'a str,
}

impl<'a> CommandParser<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    /// `None` for plain conversation (no prefix)
    pub fn parse(&self, body: &str) -> Option<ParsedCommand> {
        let rest = body.trim().strip_prefix(self.prefix)?;

        let mut parts = rest.split_whitespace().map(str::to_string);
        let verb = parts.next().unwrap_or_default();
        let args = parts.collect();

        Some(ParsedCommand { verb, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        let parser = CommandParser::new("!");
        assert_eq!(parser.parse("hello there"), None);
        assert_eq!(parser.parse("/ping"), None);
    }

    #[test]
    fn test_split_preserves_argument_order_and_case() {
        let parser = CommandParser::new("!");
        let parsed = parser.parse("  !lock name on  Study   Group ").unwrap();
        assert_eq!(parsed.verb, "lock");
        assert_eq!(parsed.args, vec!["name", "on", "Study", "Group"]);
    }

    #[test]
    fn test_multi_char_prefix_and_bare_prefix() {
        let parser = CommandParser::new(">>");
        assert_eq!(parser.parse(">>PING").unwrap().verb, "PING");

        let bare = parser.parse(">>").unwrap();
        assert!(bare.verb.is_empty());
        assert!(bare.args.is_empty());
    }
}
