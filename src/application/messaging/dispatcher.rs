//! Event dispatcher - Routes platform events to per-thread lanes
//!
//! A single consumer pulls from the platform stream. Every thread gets its
//! own lane: a worker that decides and commits each event in arrival order,
//! and a performer that makes the resulting platform calls in that same
//! order. The registry lock is released before the performer runs, so a slow
//! platform round-trip never blocks other threads or the next decision.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::application::services::{Action, ModerationService};
use crate::domain::entities::{Event, ThreadId};

/// Events (and action batches) buffered per thread before the sender waits
const THREAD_QUEUE_DEPTH: usize = 64;

struct Lane {
    events: mpsc::Sender<Event>,
    actions: mpsc::Sender<Vec<Action>>,
}

pub struct EventDispatcher {
    service: Arc<ModerationService>,
    lanes: HashMap<ThreadId, Lane>,
    tasks: JoinSet<()>,
}

impl EventDispatcher {
    pub fn new(service: Arc<ModerationService>) -> Self {
        Self {
            service,
            lanes: HashMap::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Queue already decided actions behind anything pending for their
    /// threads. Used for the startup re-push.
    pub async fn submit(&mut self, actions: Vec<Action>) {
        let mut batches: Vec<(ThreadId, Vec<Action>)> = Vec::new();
        for action in actions {
            let thread_id = action.thread_id().clone();
            match batches.iter_mut().find(|(id, _)| *id == thread_id) {
                Some((_, batch)) => batch.push(action),
                None => batches.push((thread_id, vec![action])),
            }
        }

        for (thread_id, batch) in batches {
            let lane = self.lane(&thread_id);
            if lane.actions.send(batch).await.is_err() {
                tracing::warn!("[{}] Performer gone, dropping actions", thread_id);
                self.lanes.remove(&thread_id);
            }
        }
    }

    /// Consume events until the stream ends or `shutdown` resolves, then
    /// let every lane drain, platform calls included.
    pub async fn run<F>(mut self, mut events: mpsc::Receiver<Event>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping event loop");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.route(event).await,
                    None => {
                        tracing::info!("Event stream closed");
                        break;
                    }
                },
            }
        }

        // closing the queues ends each worker, then its performer, once drained
        self.lanes.clear();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                tracing::warn!("Lane task ended abnormally: {}", e);
            }
        }
    }

    async fn route(&mut self, event: Event) {
        let thread_id = event.thread_id().clone();
        let lane = self.lane(&thread_id);
        if lane.events.send(event).await.is_err() {
            tracing::warn!("[{}] Worker gone, dropping event", thread_id);
            self.lanes.remove(&thread_id);
        }
    }

    fn lane(&mut self, thread_id: &ThreadId) -> &Lane {
        let service = &self.service;
        let tasks = &mut self.tasks;
        self.lanes.entry(thread_id.clone()).or_insert_with(|| {
            let (events_tx, events_rx) = mpsc::channel(THREAD_QUEUE_DEPTH);
            let (actions_tx, actions_rx) = mpsc::channel(THREAD_QUEUE_DEPTH);
            tasks.spawn(worker(service.clone(), thread_id.clone(), events_rx, actions_tx.clone()));
            tasks.spawn(performer(service.clone(), thread_id.clone(), actions_rx));
            tracing::debug!("[{}] Lane started", thread_id);
            Lane {
                events: events_tx,
                actions: actions_tx,
            }
        })
    }
}

async fn worker(
    service: Arc<ModerationService>,
    thread_id: ThreadId,
    mut events: mpsc::Receiver<Event>,
    actions: mpsc::Sender<Vec<Action>>,
) {
    while let Some(event) = events.recv().await {
        tracing::debug!("[{}] {}", thread_id, event.kind());

        let batch = service.handle(&event).await;
        if batch.is_empty() {
            continue;
        }
        if actions.send(batch).await.is_err() {
            tracing::warn!("[{}] Performer gone, dropping actions", thread_id);
            break;
        }
    }
    tracing::debug!("[{}] Worker stopped", thread_id);
}

async fn performer(service: Arc<ModerationService>, thread_id: ThreadId, mut actions: mpsc::Receiver<Vec<Action>>) {
    while let Some(batch) = actions.recv().await {
        service.perform(batch).await;
    }
    tracing::debug!("[{}] Performer stopped", thread_id);
}
