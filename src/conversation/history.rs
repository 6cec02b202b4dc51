//! Turns platform history into a role-tagged conversation window.

use super::Utterance;
use crate::{BotIdentity, RawMessage};

/// Convert newest-first platform messages into an oldest-first window.
///
/// Messages without an author or without text carry nothing worth sending
/// and are dropped. Messages written by this bot become `assistant`
/// utterances; everything else is `user`.
pub fn normalize(messages: Vec<RawMessage>, identity: &BotIdentity) -> Vec<Utterance> {
    messages
        .into_iter()
        .rev()
        .filter(|message| {
            message.user.as_deref().is_some_and(|user| !user.is_empty())
                && !message.text.is_empty()
        })
        .map(|message| {
            if identity.authored(&message) {
                Utterance::assistant(message.text)
            } else {
                Utterance::user(message.text)
            }
        })
        .collect()
}
