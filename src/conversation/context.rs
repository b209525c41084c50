//! Prompt assembly from retrieved chunks, dialogue history and the new question.
//!
//! Everything that decides what the model sees goes through [`ContextWindowBuilder`], so a
//! truncating or summarizing strategy can replace [`FullHistory`] without touching the engine.

use super::history::{History, Speaker};
use crate::generation::ChatMessage;
use crate::index::SearchHit;
use std::sync::OnceLock;
use tiktoken_rs::{CoreBPE, cl100k_base};

const ANSWER_INSTRUCTIONS: &str = "Use the following pieces of context to answer the user's question.\n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n";
const NO_CONTEXT: &str = "No context is available: no passages from the uploaded documents matched.";
const CONDENSE_INSTRUCTIONS: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.";

/// Builds the chat messages sent to the generative model.
pub trait ContextWindowBuilder: Send + Sync {
    /// Messages asking the model to answer `question` using `hits` as context.
    fn answer_messages(&self, history: &History, hits: &[SearchHit], question: &str)
    -> Vec<ChatMessage>;

    /// Messages asking the model to rewrite a follow-up `question` as a standalone question.
    fn condense_messages(&self, history: &History, question: &str) -> Vec<ChatMessage>;
}

/// Resubmits every prior turn on every question.
///
/// Prompt size therefore grows with the conversation; see [`estimate_tokens`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FullHistory;

impl ContextWindowBuilder for FullHistory {
    fn answer_messages(
        &self,
        history: &History,
        hits: &[SearchHit],
        question: &str,
    ) -> Vec<ChatMessage> {
        let context = if hits.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            hits.iter()
                .map(|hit| hit.chunk.text.trim())
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(format!("{ANSWER_INSTRUCTIONS}{context}")));
        messages.extend(history.turns().iter().map(|turn| match turn.role {
            Speaker::User => ChatMessage::user(turn.content.clone()),
            Speaker::Assistant => ChatMessage::assistant(turn.content.clone()),
        }));
        messages.push(ChatMessage::user(question));
        messages
    }

    fn condense_messages(&self, history: &History, question: &str) -> Vec<ChatMessage> {
        let transcript = history
            .turns()
            .iter()
            .map(|turn| match turn.role {
                Speaker::User => format!("Human: {}", turn.content),
                Speaker::Assistant => format!("Assistant: {}", turn.content),
            })
            .collect::<Vec<_>>()
            .join("\n");

        vec![ChatMessage::user(format!(
            "{CONDENSE_INSTRUCTIONS}\n\nChat History:\n{transcript}\nFollow Up Input: {question}\nStandalone question:"
        ))]
    }
}

static ENCODING: OnceLock<Option<CoreBPE>> = OnceLock::new();

/// Approximate prompt size in cl100k tokens (characters / 4 if the encoding is unavailable).
pub fn estimate_tokens(messages: &[ChatMessage]) -> usize {
    let encoding = ENCODING.get_or_init(|| match cl100k_base() {
        Ok(encoding) => Some(encoding),
        Err(error) => {
            tracing::warn!(error = %error, "cl100k encoding unavailable; estimating by length");
            None
        }
    });

    messages
        .iter()
        .map(|message| match encoding {
            Some(encoding) => encoding.encode_ordinary(&message.content).len(),
            None => message.content.chars().count().div_ceil(4),
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ChatRole;
    use crate::index::Chunk;

    fn hit(text: &str) -> SearchHit {
        SearchHit {
            chunk: Chunk {
                ordinal: 0,
                text: text.to_string(),
            },
            score: 1.0,
        }
    }

    #[test]
    fn answer_messages_carry_context_history_and_question() {
        let mut history = History::new();
        history.record_exchange("Q1".into(), "A1".into());

        let messages =
            FullHistory.answer_messages(&history, &[hit("fact one\n"), hit("fact two")], "Q2");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[0].content.ends_with("fact one\n\nfact two"));
        assert_eq!(messages[1], ChatMessage::user("Q1"));
        assert_eq!(messages[2], ChatMessage::assistant("A1"));
        assert_eq!(messages[3], ChatMessage::user("Q2"));
    }

    #[test]
    fn answer_messages_note_missing_context() {
        let messages = FullHistory.answer_messages(&History::new(), &[], "Anything?");
        assert!(messages[0].content.contains("No context is available"));
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn condense_messages_include_transcript_and_follow_up() {
        let mut history = History::new();
        history.record_exchange("Who wrote it?".into(), "Ada.".into());

        let messages = FullHistory.condense_messages(&history, "When?");
        assert_eq!(messages.len(), 1);
        let prompt = &messages[0].content;
        assert!(prompt.contains("Human: Who wrote it?\nAssistant: Ada."));
        assert!(prompt.contains("Follow Up Input: When?"));
    }

    #[test]
    fn estimate_tokens_grows_with_content() {
        let short = estimate_tokens(&[ChatMessage::user("hello")]);
        let long = estimate_tokens(&[
            ChatMessage::user("hello"),
            ChatMessage::assistant("a considerably longer reply about many things"),
        ]);
        assert!(short > 0);
        assert!(long > short);
    }
}
