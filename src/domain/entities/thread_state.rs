use serde::{Deserialize, Serialize};
use std::fmt;

/// Icon the emoji lock resets a thread to
pub const DEFAULT_EMOJI: &str = "👍";

/// Group property that can be locked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    Name,
    Nickname,
    Photo,
    Theme,
    Emoji,
}

impl LockKind {
    pub const ALL: [LockKind; 5] = [
        LockKind::Name,
        LockKind::Nickname,
        LockKind::Photo,
        LockKind::Theme,
        LockKind::Emoji,
    ];

    pub fn parse(input: &str) -> Option<Self> {
        match input.to_lowercase().as_str() {
            "name" | "group" | "title" => Some(LockKind::Name),
            "nickname" | "nick" => Some(LockKind::Nickname),
            "photo" | "image" => Some(LockKind::Photo),
            "theme" => Some(LockKind::Theme),
            "emoji" | "icon" => Some(LockKind::Emoji),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::Name => "name",
            LockKind::Nickname => "nickname",
            LockKind::Photo => "photo",
            LockKind::Theme => "theme",
            LockKind::Emoji => "emoji",
        }
    }

    /// Name and nickname locks carry a value; the rest are flags
    pub fn takes_value(&self) -> bool {
        matches!(self, LockKind::Name | LockKind::Nickname)
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted lock record for one thread.
///
/// An unset lock is absent from the serialized form, so the stored payload
/// only ever lists active locks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ThreadLocks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub photo: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub theme: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub emoji: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl ThreadLocks {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn is_locked(&self, kind: LockKind) -> bool {
        match kind {
            LockKind::Name => self.name.is_some(),
            LockKind::Nickname => self.nickname.is_some(),
            LockKind::Photo => self.photo,
            LockKind::Theme => self.theme,
            LockKind::Emoji => self.emoji,
        }
    }

    /// Removes a lock. Returns false when it was already off.
    pub fn clear(&mut self, kind: LockKind) -> bool {
        match kind {
            LockKind::Name => self.name.take().is_some(),
            LockKind::Nickname => self.nickname.take().is_some(),
            LockKind::Photo => std::mem::take(&mut self.photo),
            LockKind::Theme => std::mem::take(&mut self.theme),
            LockKind::Emoji => std::mem::take(&mut self.emoji),
        }
    }

    pub fn active(&self) -> impl Iterator<Item = LockKind> + '_ {
        LockKind::ALL.into_iter().filter(|kind| self.is_locked(*kind))
    }
}

/// Everything the agent wants to hold true about a thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadState {
    pub locks: ThreadLocks,
    pub rules: Option<String>,
    pub muted: bool,
}
