//! Console adapter for development/testing
//!
//! Simulated platform events are read from stdin, one per line:
//!
//! ```text
//! U1@T1: !ping                 message from U1 in T1
//! #rename T1 U2 New name       U2 renamed T1
//! #nick T1 U2 M3 new nick      U2 changed the nickname of M3
//! #icon T1 [emoji]             icon changed, emoji optional
//! #theme T1                    theme changed
//! #photo T1                    photo changed
//! #join T1 U4 U5               members added
//! ```
//!
//! Outbound calls are printed to stdout.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::{Event, ThreadId, UserId};
use crate::domain::traits::{Platform, PlatformInfo};

static MESSAGE_LINE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^(\S+)@(\S+):\s?(.*)$").ok());

type Membership = Arc<Mutex<HashMap<ThreadId, BTreeSet<UserId>>>>;

/// Console platform adapter for local development
pub struct ConsoleAdapter {
    info: PlatformInfo,
    members: Membership,
}

impl ConsoleAdapter {
    pub fn new(account_id: impl Into<UserId>) -> Self {
        Self {
            info: PlatformInfo {
                account_id: account_id.into(),
                name: "console".to_string(),
            },
            members: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new("console")
    }
}

/// Parse one stdin line into an event. Blank or unrecognised lines give `None`.
pub fn parse_line(line: &str) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(directive) = line.strip_prefix('#') else {
        let caps = MESSAGE_LINE.as_ref()?.captures(line)?;
        return Some(Event::Message {
            sender_id: caps[1].into(),
            thread_id: caps[2].into(),
            body: caps[3].to_string(),
        });
    };

    let mut words = directive.split_whitespace();
    let (verb, thread_id) = (words.next()?, ThreadId::from(words.next()?));

    let event = match verb {
        "rename" => {
            let author_id = UserId::from(words.next()?);
            let new_name = rest(words)?;
            Event::ThreadRenamed {
                thread_id,
                new_name,
                author_id,
            }
        }
        "nick" => {
            let author_id = UserId::from(words.next()?);
            let member_id = UserId::from(words.next()?);
            let new_nickname = rest(words)?;
            Event::NicknameChanged {
                thread_id,
                member_id,
                new_nickname,
                author_id,
            }
        }
        "icon" => Event::IconChanged {
            thread_id,
            emoji: words.next().map(str::to_string),
        },
        "theme" => Event::ThemeChanged { thread_id },
        "photo" => Event::PhotoChanged { thread_id },
        "join" => {
            let new_member_ids: Vec<UserId> = words.map(UserId::from).collect();
            if new_member_ids.is_empty() {
                return None;
            }
            Event::MemberAdded {
                thread_id,
                new_member_ids,
            }
        }
        _ => return None,
    };
    Some(event)
}

fn rest<'a>(words: impl Iterator<Item = &'a str>) -> Option<String> {
    let text = words.collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Remember who has been seen in which thread
fn observe(members: &Membership, event: &Event) {
    let seen: Vec<UserId> = match event {
        Event::Message { sender_id, .. } => vec![sender_id.clone()],
        Event::NicknameChanged { member_id, .. } => vec![member_id.clone()],
        Event::MemberAdded { new_member_ids, .. } => new_member_ids.clone(),
        _ => return,
    };

    let mut members = members.lock().unwrap_or_else(|e| e.into_inner());
    members
        .entry(event.thread_id().clone())
        .or_default()
        .extend(seen);
}

#[async_trait]
impl Platform for ConsoleAdapter {
    async fn subscribe(&self) -> Result<mpsc::Receiver<Event>, BotError> {
        tracing::info!("Starting console platform (dev mode), reading events from stdin");

        let (tx, rx) = mpsc::channel(100);
        let members = self.members.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Failed to read stdin: {}", e);
                        break;
                    }
                };

                let Some(event) = parse_line(&line) else {
                    if !line.trim().is_empty() {
                        tracing::warn!("Unrecognised input: {}", line.trim());
                    }
                    continue;
                };

                observe(&members, &event);
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            tracing::info!("Console input closed");
        });

        Ok(rx)
    }

    async fn send_text(&self, thread_id: &ThreadId, text: &str) -> Result<(), BotError> {
        println!("[{}] [BOT] {}", thread_id, text);
        Ok(())
    }

    async fn set_thread_name(&self, thread_id: &ThreadId, name: &str) -> Result<(), BotError> {
        println!("[{}] [RENAME] {}", thread_id, name);
        Ok(())
    }

    async fn set_nickname(
        &self,
        thread_id: &ThreadId,
        member_id: &UserId,
        nickname: &str,
    ) -> Result<(), BotError> {
        println!("[{}] [NICK] {} -> {}", thread_id, member_id, nickname);
        Ok(())
    }

    async fn set_icon(&self, thread_id: &ThreadId, emoji: &str) -> Result<(), BotError> {
        println!("[{}] [ICON] {}", thread_id, emoji);
        Ok(())
    }

    async fn members(&self, thread_id: &ThreadId) -> Result<BTreeSet<UserId>, BotError> {
        let members = self.members.lock().unwrap_or_else(|e| e.into_inner());
        Ok(members.get(thread_id).cloned().unwrap_or_default())
    }

    fn platform_info(&self) -> PlatformInfo {
        self.info.clone()
    }
}
