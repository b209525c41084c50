//! Append-only dialogue log.

use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Who spoke a dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The person asking questions.
    User,
    /// The generated answer.
    Assistant,
}

/// One message of the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueTurn {
    /// Message author.
    pub role: Speaker,
    /// Message text as typed or generated; never escaped.
    pub content: String,
    /// When the turn was recorded.
    pub at: OffsetDateTime,
}

impl DialogueTurn {
    /// RFC 3339 rendering of [`DialogueTurn::at`].
    pub fn timestamp(&self) -> String {
        self.at.format(&Rfc3339).unwrap_or_default()
    }
}

/// Ordered dialogue log. Turns are only ever appended, as (user, assistant) pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    turns: Vec<DialogueTurn>,
}

impl History {
    /// Create an empty history.
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Number of recorded turns (twice the number of completed exchanges).
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no question has completed yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// All turns in chronological order.
    pub fn turns(&self) -> &[DialogueTurn] {
        &self.turns
    }

    /// Completed (question, answer) exchanges, most recent first.
    pub fn exchanges_newest_first(&self) -> impl Iterator<Item = (&DialogueTurn, &DialogueTurn)> {
        self.turns
            .chunks_exact(2)
            .rev()
            .map(|pair| (&pair[0], &pair[1]))
    }

    /// Append a completed exchange: the question, then its answer.
    pub(crate) fn record_exchange(&mut self, question: String, answer: String) {
        let at = OffsetDateTime::now_utc();
        self.turns.push(DialogueTurn {
            role: Speaker::User,
            content: question,
            at,
        });
        self.turns.push(DialogueTurn {
            role: Speaker::Assistant,
            content: answer,
            at,
        });
    }
}
