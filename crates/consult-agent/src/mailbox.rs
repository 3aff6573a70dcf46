use std::collections::VecDeque;
use std::sync::Arc;

use consult_core::types::{SpeakerRole, TranscriptTurn};
use tokio::sync::{Mutex, Notify};

use crate::error::AgentError;

/// Commands a room agent processes serially, FIFO.
pub enum AgentCommand {
    Transcript(TranscriptTurn),
    SetCustomerContext { fingerprint: String, prefix: String },
    Reset,
}

/// Bounded FIFO mailbox for one room agent.
///
/// Unlike a plain `tokio::sync::mpsc::channel`, this queue can evict an
/// already-queued item to make room for a new one: when full, the oldest
/// queued *transcript* turn from a non-customer speaker is dropped first
/// (agent turns and resets are less time-critical to analyze than the
/// customer's own words). If every queued item is a customer turn (or a
/// context/reset command), nothing is evicted and the push fails with
/// `Overloaded` — the room itself is never torn down.
pub struct Mailbox {
    queue: Mutex<VecDeque<AgentCommand>>,
    capacity: usize,
    notify: Notify,
}

impl Mailbox {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        })
    }

    pub async fn push(&self, command: AgentCommand) -> Result<(), AgentError> {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            let evict_at = queue.iter().position(|c| match c {
                AgentCommand::Transcript(t) => t.speaker_role != SpeakerRole::Customer,
                _ => false,
            });
            match evict_at {
                Some(idx) => {
                    queue.remove(idx);
                }
                None => return Err(AgentError::Overloaded),
            }
        }
        queue.push_back(command);
        drop(queue);
        self.notify.notify_one();
        Ok(())
    }

    /// Waits for and removes the oldest queued command. Never returns
    /// `None` — callers loop forever until the agent task is dropped.
    pub async fn pop(&self) -> AgentCommand {
        loop {
            {
                let mut queue = self.queue.lock().await;
                if let Some(command) = queue.pop_front() {
                    return command;
                }
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn turn(role: SpeakerRole, text: &str) -> TranscriptTurn {
        TranscriptTurn {
            turn_id: consult_core::types::TurnId(1),
            speaker_role: role,
            speaker_name: "x".to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            confidence: None,
        }
    }

    #[tokio::test]
    async fn evicts_oldest_non_customer_turn_when_full() {
        let mailbox = Mailbox::new(2);
        mailbox
            .push(AgentCommand::Transcript(turn(SpeakerRole::Agent, "hold please")))
            .await
            .unwrap();
        mailbox
            .push(AgentCommand::Transcript(turn(SpeakerRole::Customer, "hello")))
            .await
            .unwrap();
        mailbox
            .push(AgentCommand::Transcript(turn(SpeakerRole::Customer, "still there?")))
            .await
            .unwrap();

        let first = mailbox.pop().await;
        match first {
            AgentCommand::Transcript(t) => assert_eq!(t.text, "hello"),
            _ => panic!("expected transcript command"),
        }
    }

    #[tokio::test]
    async fn fails_overloaded_when_nothing_droppable() {
        let mailbox = Mailbox::new(1);
        mailbox
            .push(AgentCommand::Transcript(turn(SpeakerRole::Customer, "a")))
            .await
            .unwrap();
        let err = mailbox
            .push(AgentCommand::Transcript(turn(SpeakerRole::Customer, "b")))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Overloaded));
    }
}
