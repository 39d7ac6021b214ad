//! Desired-state registry - in-memory mirror of the persisted moderation state
//!
//! Pure data: no I/O happens here. Every mutator reports whether anything
//! changed so the caller knows which record category must be saved.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use crate::domain::entities::{LockKind, LockTarget, ThreadId, ThreadLocks, ThreadState, UserId};
use crate::domain::traits::{Category, Record, Snapshot};

/// How long an issued icon reset waits for its change notification
pub const ICON_ECHO_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    threads: HashMap<ThreadId, ThreadState>,
    bans: BTreeSet<UserId>,
    // never persisted
    icon_echoes: HashMap<ThreadId, Instant>,
}

/// The slice of the registry one command may change, kept for rollback
#[derive(Debug, Clone)]
pub enum Checkpoint {
    Thread(ThreadId, Option<ThreadState>),
    Bans(BTreeSet<UserId>),
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from what the store loaded at startup
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut registry = Self {
            bans: snapshot.bans.clone(),
            ..Default::default()
        };

        for (thread_id, locks) in &snapshot.locks {
            registry.entry(thread_id).locks = locks.clone();
        }
        for thread_id in &snapshot.mutes {
            registry.entry(thread_id).muted = true;
        }
        for (thread_id, rules) in &snapshot.rules {
            registry.entry(thread_id).rules = Some(rules.clone());
        }

        registry
    }

    fn entry(&mut self, thread_id: &ThreadId) -> &mut ThreadState {
        self.threads.entry(thread_id.clone()).or_default()
    }

    pub fn thread(&self, thread_id: &ThreadId) -> Option<&ThreadState> {
        self.threads.get(thread_id)
    }

    pub fn locks(&self, thread_id: &ThreadId) -> Option<&ThreadLocks> {
        self.thread(thread_id).map(|state| &state.locks)
    }

    pub fn is_banned(&self, user_id: &UserId) -> bool {
        self.bans.contains(user_id)
    }

    pub fn is_muted(&self, thread_id: &ThreadId) -> bool {
        self.thread(thread_id).is_some_and(|state| state.muted)
    }

    pub fn rules(&self, thread_id: &ThreadId) -> Option<&str> {
        self.thread(thread_id).and_then(|state| state.rules.as_deref())
    }

    /// Store a lock, overwriting any previous value for the same kind
    pub fn lock(&mut self, thread_id: &ThreadId, target: &LockTarget) {
        let locks = &mut self.entry(thread_id).locks;
        match target {
            LockTarget::Name(name) => locks.name = Some(name.clone()),
            LockTarget::Nickname(nickname) => locks.nickname = Some(nickname.clone()),
            LockTarget::Photo => locks.photo = true,
            LockTarget::Theme => locks.theme = true,
            LockTarget::Emoji => locks.emoji = true,
        }
    }

    /// Remove a lock. Returns false when it was not set.
    pub fn unlock(&mut self, thread_id: &ThreadId, kind: LockKind) -> bool {
        self.threads
            .get_mut(thread_id)
            .is_some_and(|state| state.locks.clear(kind))
    }

    /// Returns false when the user was already banned
    pub fn ban(&mut self, user_id: &UserId) -> bool {
        self.bans.insert(user_id.clone())
    }

    /// Returns false when the user was not banned
    pub fn unban(&mut self, user_id: &UserId) -> bool {
        self.bans.remove(user_id)
    }

    /// Returns true when the mute flag actually changed
    pub fn set_muted(&mut self, thread_id: &ThreadId, muted: bool) -> bool {
        if self.is_muted(thread_id) == muted {
            return false;
        }
        self.entry(thread_id).muted = muted;
        true
    }

    pub fn set_rules(&mut self, thread_id: &ThreadId, rules: impl Into<String>) {
        self.entry(thread_id).rules = Some(rules.into());
    }

    pub fn checkpoint_thread(&self, thread_id: &ThreadId) -> Checkpoint {
        Checkpoint::Thread(thread_id.clone(), self.threads.get(thread_id).cloned())
    }

    pub fn checkpoint_bans(&self) -> Checkpoint {
        Checkpoint::Bans(self.bans.clone())
    }

    /// Put back what a checkpoint captured, leaving everything else alone
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        match checkpoint {
            Checkpoint::Thread(thread_id, Some(state)) => {
                self.threads.insert(thread_id, state);
            }
            Checkpoint::Thread(thread_id, None) => {
                self.threads.remove(&thread_id);
            }
            Checkpoint::Bans(bans) => self.bans = bans,
        }
    }

    /// Note that an icon reset was issued for `thread_id`
    pub fn expect_icon_echo(&mut self, thread_id: &ThreadId, at: Instant) {
        self.icon_echoes.insert(thread_id.clone(), at);
    }

    /// Consume a pending icon reset. True when one was issued within
    /// [`ICON_ECHO_WINDOW`] of `now`.
    pub fn take_icon_echo(&mut self, thread_id: &ThreadId, now: Instant) -> bool {
        self.icon_echoes
            .remove(thread_id)
            .is_some_and(|at| now.saturating_duration_since(at) <= ICON_ECHO_WINDOW)
    }

    /// Drop a pending icon reset whose platform call failed
    pub fn forget_icon_echo(&mut self, thread_id: &ThreadId) {
        self.icon_echoes.remove(thread_id);
    }

    /// Threads with at least one active lock
    pub fn locked_threads(&self) -> impl Iterator<Item = (&ThreadId, &ThreadLocks)> {
        self.threads
            .iter()
            .filter(|(_, state)| !state.locks.is_empty())
            .map(|(thread_id, state)| (thread_id, &state.locks))
    }

    pub fn locks_record(&self) -> Record {
        Record::Locks(
            self.locked_threads()
                .map(|(thread_id, locks)| (thread_id.clone(), locks.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    pub fn bans_record(&self) -> Record {
        Record::Bans(self.bans.clone())
    }

    pub fn mutes_record(&self) -> Record {
        Record::Mutes(
            self.threads
                .iter()
                .filter(|(_, state)| state.muted)
                .map(|(thread_id, _)| thread_id.clone())
                .collect(),
        )
    }

    pub fn rules_record(&self) -> Record {
        Record::Rules(
            self.threads
                .iter()
                .filter_map(|(thread_id, state)| {
                    state.rules.as_ref().map(|rules| (thread_id.clone(), rules.clone()))
                })
                .collect(),
        )
    }

    /// Current contents of a category. `None` for categories the registry
    /// does not own (config).
    pub fn record(&self, category: Category) -> Option<Record> {
        match category {
            Category::Locks => Some(self.locks_record()),
            Category::Bans => Some(self.bans_record()),
            Category::Mutes => Some(self.mutes_record()),
            Category::Rules => Some(self.rules_record()),
            Category::Config => None,
        }
    }

    /// Every category this registry owns, for a full flush
    pub fn records(&self) -> Vec<Record> {
        Category::ALL
            .into_iter()
            .filter_map(|category| self.record(category))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t1() -> ThreadId {
        ThreadId::from("T1")
    }

    #[test]
    fn test_restore_thread_checkpoint_only_touches_that_thread() {
        let mut registry = Registry::new();
        registry.lock(&ThreadId::from("T2"), &LockTarget::Theme);

        let checkpoint = registry.checkpoint_thread(&t1());
        registry.lock(&t1(), &LockTarget::Name("Study Group".into()));
        registry.lock(&ThreadId::from("T2"), &LockTarget::Photo);
        registry.restore(checkpoint);

        assert!(registry.thread(&t1()).is_none());
        assert!(registry.locks(&ThreadId::from("T2")).unwrap().photo);

        registry.ban(&UserId::from("U1"));
        let checkpoint = registry.checkpoint_bans();
        registry.ban(&UserId::from("U2"));
        registry.restore(checkpoint);
        assert!(registry.is_banned(&UserId::from("U1")));
        assert!(!registry.is_banned(&UserId::from("U2")));
    }

    #[test]
    fn test_icon_echo_is_consumed_once_and_expires() {
        let mut registry = Registry::new();
        let now = Instant::now();

        assert!(!registry.take_icon_echo(&t1(), now));
        registry.expect_icon_echo(&t1(), now);
        assert!(registry.take_icon_echo(&t1(), now));
        assert!(!registry.take_icon_echo(&t1(), now));

        registry.expect_icon_echo(&t1(), now);
        assert!(!registry.take_icon_echo(&t1(), now + ICON_ECHO_WINDOW + Duration::from_secs(1)));

        registry.expect_icon_echo(&t1(), now);
        registry.forget_icon_echo(&t1());
        assert!(!registry.take_icon_echo(&t1(), now));
    }

    #[test]
    fn test_lock_overwrites_and_unlock_removes() {
        let mut registry = Registry::new();
        registry.lock(&t1(), &LockTarget::Name("Study Group".into()));
        registry.lock(&t1(), &LockTarget::Name("Night Owls".into()));
        assert_eq!(registry.locks(&t1()).unwrap().name.as_deref(), Some("Night Owls"));

        assert!(registry.unlock(&t1(), LockKind::Name));
        assert!(!registry.unlock(&t1(), LockKind::Name));
        assert!(!registry.unlock(&ThreadId::from("T9"), LockKind::Theme));
        assert!(registry.thread(&ThreadId::from("T9")).is_none());
    }

    #[test]
    fn test_locks_record_skips_threads_without_active_locks() {
        let mut registry = Registry::new();
        registry.lock(&t1(), &LockTarget::Photo);
        registry.set_rules(&ThreadId::from("T2"), "no spam");
        registry.unlock(&t1(), LockKind::Photo);

        assert_eq!(registry.locks_record(), Record::Locks(BTreeMap::new()));
        match registry.rules_record() {
            Record::Rules(rules) => assert_eq!(rules.len(), 1),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_mute_changes_are_reported() {
        let mut registry = Registry::new();
        assert!(!registry.set_muted(&t1(), false));
        assert!(registry.set_muted(&t1(), true));
        assert!(!registry.set_muted(&t1(), true));
        assert!(registry.is_muted(&t1()));
        assert_eq!(registry.mutes_record(), Record::Mutes(BTreeSet::from([t1()])));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut registry = Registry::new();
        registry.lock(&t1(), &LockTarget::Nickname("member".into()));
        registry.lock(&t1(), &LockTarget::Emoji);
        registry.set_muted(&ThreadId::from("T2"), true);
        registry.set_rules(&t1(), "be kind");
        registry.ban(&UserId::from("U9"));

        let mut snapshot = Snapshot::default();
        for record in registry.records() {
            match record {
                Record::Locks(locks) => snapshot.locks = locks,
                Record::Bans(bans) => snapshot.bans = bans,
                Record::Mutes(mutes) => snapshot.mutes = mutes,
                Record::Rules(rules) => snapshot.rules = rules,
                Record::Config(_) => unreachable!(),
            }
        }

        assert_eq!(Registry::from_snapshot(&snapshot), registry);
    }
}
