/// System prompt for the voice assistant.
///
/// Answers are synthesized and spoken aloud, so the model is steered away
/// from anything that reads well but listens badly.
pub const SYSTEM_PROMPT: &str = "You are a friendly voice assistant. Your answers are read aloud by a \
speech synthesizer, so keep them short and conversational. Use plain \
sentences with no markup, no lists, and no code. If a question cannot be \
answered briefly, give the most useful short answer and offer to go deeper.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_speakable() {
        assert!(!SYSTEM_PROMPT.is_empty());
        assert!(SYSTEM_PROMPT.contains("voice"));
        assert!(!SYSTEM_PROMPT.contains('\n'));
    }
}
