//! Context assembly: budget truncation and prompt framing.

use super::Utterance;

/// Fixed `system` utterances wrapped around every conversation window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptFraming {
    pub preludes: Vec<Utterance>,
    pub postludes: Vec<Utterance>,
}

impl PromptFraming {
    /// Build framing from the configured system messages. An empty message
    /// contributes no utterance.
    pub fn from_system_messages(prelude: &str, postlude: &str) -> Self {
        let framing = |text: &str| {
            if text.is_empty() {
                Vec::new()
            } else {
                vec![Utterance::system(text)]
            }
        };
        Self {
            preludes: framing(prelude),
            postludes: framing(postlude),
        }
    }
}

/// The final sequence sent to the completion backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub utterances: Vec<Utterance>,
}

impl Prompt {
    /// Render as newline-separated `"<role>: <text>"` lines.
    pub fn render(&self) -> String {
        self.utterances
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }
}

/// Keep the most recent utterances whose cumulative rendered length fits in
/// `budget`.
///
/// Walks from newest to oldest and stops at the first utterance that pushes
/// the running total over the budget; that utterance and everything older is
/// dropped. When the newest utterance alone is over budget the result is
/// empty. The result is always a suffix of the input.
pub fn truncate_to_budget(mut window: Vec<Utterance>, budget: usize) -> Vec<Utterance> {
    let mut total = 0usize;
    for index in (0..window.len()).rev() {
        total += window[index].rendered_len();
        if total > budget {
            return window.split_off(index + 1);
        }
    }
    window
}

/// `preludes ++ window ++ postludes`.
pub fn assemble(framing: &PromptFraming, window: Vec<Utterance>) -> Prompt {
    let mut utterances =
        Vec::with_capacity(framing.preludes.len() + window.len() + framing.postludes.len());
    utterances.extend(framing.preludes.iter().cloned());
    utterances.extend(window);
    utterances.extend(framing.postludes.iter().cloned());
    Prompt { utterances }
}
