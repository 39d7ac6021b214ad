use super::{ThreadId, UserId};

/// Inbound notification from the messaging platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Message {
        sender_id: UserId,
        thread_id: ThreadId,
        body: String,
    },
    ThreadRenamed {
        thread_id: ThreadId,
        new_name: String,
        author_id: UserId,
    },
    NicknameChanged {
        thread_id: ThreadId,
        member_id: UserId,
        new_nickname: String,
        author_id: UserId,
    },
    /// `emoji` is the observed icon when the platform reports it.
    IconChanged {
        thread_id: ThreadId,
        emoji: Option<String>,
    },
    ThemeChanged {
        thread_id: ThreadId,
    },
    PhotoChanged {
        thread_id: ThreadId,
    },
    MemberAdded {
        thread_id: ThreadId,
        new_member_ids: Vec<UserId>,
    },
}

impl Event {
    pub fn thread_id(&self) -> &ThreadId {
        match self {
            Event::Message { thread_id, .. }
            | Event::ThreadRenamed { thread_id, .. }
            | Event::NicknameChanged { thread_id, .. }
            | Event::IconChanged { thread_id, .. }
            | Event::ThemeChanged { thread_id }
            | Event::PhotoChanged { thread_id }
            | Event::MemberAdded { thread_id, .. } => thread_id,
        }
    }

    /// The account that caused the event, when the platform names one
    pub fn author(&self) -> Option<&UserId> {
        match self {
            Event::Message { sender_id, .. } => Some(sender_id),
            Event::ThreadRenamed { author_id, .. } | Event::NicknameChanged { author_id, .. } => {
                Some(author_id)
            }
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::Message { .. } => "message",
            Event::ThreadRenamed { .. } => "thread-renamed",
            Event::NicknameChanged { .. } => "nickname-changed",
            Event::IconChanged { .. } => "icon-changed",
            Event::ThemeChanged { .. } => "theme-changed",
            Event::PhotoChanged { .. } => "photo-changed",
            Event::MemberAdded { .. } => "member-added",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_only_for_attributed_events() {
        let rename = Event::ThreadRenamed {
            thread_id: "T1".into(),
            new_name: "x".into(),
            author_id: "U2".into(),
        };
        assert_eq!(rename.author(), Some(&UserId::from("U2")));
        assert_eq!(rename.thread_id().as_str(), "T1");

        let theme = Event::ThemeChanged { thread_id: "T1".into() };
        assert_eq!(theme.author(), None);
        assert_eq!(theme.kind(), "theme-changed");
    }
}
