//! Turn-level transcript assembly from partial transcription events.

use serde::Serialize;

/// One sealed user-utterance/model-response exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptTurn {
    pub user_text: String,
    pub model_text: String,
}

/// Folds partial transcription text into turn records.
///
/// Partials concatenate in arrival order; a turn-completion event seals the
/// current accumulators into an immutable record and resets them.
#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    user_partial: String,
    model_partial: String,
    turns: Vec<TranscriptTurn>,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: &str) {
        self.user_partial.push_str(text);
    }

    pub fn push_model(&mut self, text: &str) {
        self.model_partial.push_str(text);
    }

    /// Seal the current turn, append it to the log, and return a copy.
    pub fn seal_turn(&mut self) -> TranscriptTurn {
        let turn = TranscriptTurn {
            user_text: std::mem::take(&mut self.user_partial),
            model_text: std::mem::take(&mut self.model_partial),
        };
        self.turns.push(turn.clone());
        turn
    }

    /// The ordered log of sealed turns.
    pub fn turns(&self) -> &[TranscriptTurn] {
        &self.turns
    }

    pub fn user_partial(&self) -> &str {
        &self.user_partial
    }

    pub fn model_partial(&self) -> &str {
        &self.model_partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partials_concatenate_in_arrival_order_and_seal() {
        let mut assembler = TranscriptAssembler::new();
        assembler.push_user("He");
        assembler.push_user("llo");
        assembler.push_model("Hi");

        let turn = assembler.seal_turn();
        assert_eq!(
            turn,
            TranscriptTurn {
                user_text: "Hello".into(),
                model_text: "Hi".into(),
            }
        );
        assert_eq!(assembler.user_partial(), "");
        assert_eq!(assembler.model_partial(), "");
        assert_eq!(assembler.turns(), &[turn]);
    }

    #[test]
    fn turns_accumulate_in_order() {
        let mut assembler = TranscriptAssembler::new();
        assembler.push_user("one");
        assembler.seal_turn();
        assembler.push_user("two");
        assembler.push_model("reply");
        assembler.seal_turn();

        let turns = assembler.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].user_text, "one");
        assert_eq!(turns[1].model_text, "reply");
    }

    #[test]
    fn sealing_with_no_partials_records_an_empty_turn() {
        let mut assembler = TranscriptAssembler::new();
        let turn = assembler.seal_turn();
        assert_eq!(turn.user_text, "");
        assert_eq!(turn.model_text, "");
        assert_eq!(assembler.turns().len(), 1);
    }
}
