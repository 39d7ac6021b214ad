//! Gate middleware for the command pipeline
//!
//! Each gate can let a command through, drop it silently, or deny it with
//! a user-visible notice. The chain runs in insertion order.

use crate::domain::entities::{ThreadId, UserId, Verb};

/// Context passed through middleware chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub sender_id: UserId,
    pub thread_id: ThreadId,
    /// `None` when the word after the prefix is not a known verb
    pub verb: Option<Verb>,
    pub is_admin: bool,
    pub sender_banned: bool,
    pub thread_muted: bool,
}

/// Middleware trait - processors that can intercept command handling
pub trait Middleware: Send + Sync {
    fn process(&self, ctx: Context, next: Next<'_>) -> MiddlewareResult;
}

/// Result of middleware processing
pub type MiddlewareResult = Result<Context, MiddlewareError>;

/// Middleware errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareError {
    /// Stop processing without replying
    Dropped(&'static str),
    /// Stop processing and tell the sender why
    PermissionDenied(String),
}

impl std::fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiddlewareError::Dropped(reason) => write!(f, "Dropped: {}", reason),
            MiddlewareError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
        }
    }
}

impl std::error::Error for MiddlewareError {}

/// Next middleware in chain
pub struct Next<'a> {
    remaining: &'a [Box<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub fn new(middlewares: &'a [Box<dyn Middleware>]) -> Self {
        Self { remaining: middlewares }
    }

    /// Process remaining middleware
    pub fn run(self, ctx: Context) -> MiddlewareResult {
        match self.remaining.split_first() {
            Some((first, rest)) => first.process(ctx, Next::new(rest)),
            None => Ok(ctx),
        }
    }
}

/// Middleware chain builder
#[derive(Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    pub fn run(&self, ctx: Context) -> MiddlewareResult {
        Next::new(&self.middlewares).run(ctx)
    }

    /// The gates every command passes through, in order
    pub fn moderation() -> Self {
        Self::new()
            .add(LoggingMiddleware)
            .add(BanGate)
            .add(MuteGate)
            .add(AdminGate)
    }
}

/// Banned senders get no interaction at all
pub struct BanGate;

impl Middleware for BanGate {
    fn process(&self, ctx: Context, next: Next<'_>) -> MiddlewareResult {
        if ctx.sender_banned {
            return Err(MiddlewareError::Dropped("sender is banned"));
        }
        next.run(ctx)
    }
}

/// In a muted thread only the admin is heard
pub struct MuteGate;

impl Middleware for MuteGate {
    fn process(&self, ctx: Context, next: Next<'_>) -> MiddlewareResult {
        if ctx.thread_muted && !ctx.is_admin {
            return Err(MiddlewareError::Dropped("thread is muted"));
        }
        next.run(ctx)
    }
}

/// State-changing verbs are admin-only
pub struct AdminGate;

impl Middleware for AdminGate {
    fn process(&self, ctx: Context, next: Next<'_>) -> MiddlewareResult {
        match ctx.verb {
            Some(verb) if verb.requires_admin() && !ctx.is_admin => {
                Err(MiddlewareError::PermissionDenied(format!(
                    "only the admin can use {}",
                    verb.name()
                )))
            }
            _ => next.run(ctx),
        }
    }
}

/// Logging middleware for debugging
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn process(&self, ctx: Context, next: Next<'_>) -> MiddlewareResult {
        let verb = ctx.verb.map(|v| v.name()).unwrap_or("<unknown>");
        tracing::debug!("[{}] {} from {}", ctx.thread_id, verb, ctx.sender_id);

        let thread_id = ctx.thread_id.clone();
        let result = next.run(ctx);

        if let Err(e) = &result {
            tracing::debug!("[{}] {}", thread_id, e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(verb: Option<Verb>) -> Context {
        Context {
            sender_id: "U2".into(),
            thread_id: "T1".into(),
            verb,
            is_admin: false,
            sender_banned: false,
            thread_muted: false,
        }
    }

    #[test]
    fn test_open_verbs_pass_for_anyone() {
        let chain = MiddlewareChain::moderation();
        assert!(chain.run(ctx(Some(Verb::Ping))).is_ok());
        assert!(chain.run(ctx(None)).is_ok());
    }

    #[test]
    fn test_ban_drops_before_anything_else() {
        let chain = MiddlewareChain::moderation();
        let mut banned = ctx(Some(Verb::Ban));
        banned.sender_banned = true;
        assert_eq!(chain.run(banned), Err(MiddlewareError::Dropped("sender is banned")));
    }

    #[test]
    fn test_mute_only_silences_non_admins() {
        let chain = MiddlewareChain::moderation();
        let mut muted = ctx(Some(Verb::Ping));
        muted.thread_muted = true;
        assert!(matches!(chain.run(muted.clone()), Err(MiddlewareError::Dropped(_))));

        muted.is_admin = true;
        assert!(chain.run(muted).is_ok());
    }

    #[test]
    fn test_admin_gate_denies_moderation_verbs() {
        let chain = MiddlewareChain::moderation();
        let result = chain.run(ctx(Some(Verb::Mute)));
        assert!(matches!(result, Err(MiddlewareError::PermissionDenied(_))));

        let mut admin = ctx(Some(Verb::Mute));
        admin.is_admin = true;
        assert!(chain.run(admin).is_ok());
    }
}
