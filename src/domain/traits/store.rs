use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::application::errors::StorageError;
use crate::domain::entities::{BotConfig, ThreadId, ThreadLocks, UserId};

/// Everything read back from durable storage at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub config: Option<BotConfig>,
    pub locks: BTreeMap<ThreadId, ThreadLocks>,
    pub bans: BTreeSet<UserId>,
    pub mutes: BTreeSet<ThreadId>,
    pub rules: BTreeMap<ThreadId, String>,
}

/// One persisted record category with its full new contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Config(BotConfig),
    Locks(BTreeMap<ThreadId, ThreadLocks>),
    Bans(BTreeSet<UserId>),
    Mutes(BTreeSet<ThreadId>),
    Rules(BTreeMap<ThreadId, String>),
}

impl Record {
    pub fn category(&self) -> Category {
        match self {
            Record::Config(_) => Category::Config,
            Record::Locks(_) => Category::Locks,
            Record::Bans(_) => Category::Bans,
            Record::Mutes(_) => Category::Mutes,
            Record::Rules(_) => Category::Rules,
        }
    }
}

/// Persisted record category, one file or table each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Config,
    Locks,
    Bans,
    Mutes,
    Rules,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Config,
        Category::Locks,
        Category::Bans,
        Category::Mutes,
        Category::Rules,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Config => "config",
            Category::Locks => "locks",
            Category::Bans => "bans",
            Category::Mutes => "mutes",
            Category::Rules => "rules",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store trait - abstraction for data persistence
#[async_trait]
pub trait Store: Send + Sync {
    /// Read every category. A missing or malformed category loads as its
    /// empty default; loading never fails.
    async fn load(&self) -> Snapshot;

    /// Replace one category on disk. Returns once the new contents are durable.
    async fn save(&self, record: Record) -> Result<(), StorageError>;
}
