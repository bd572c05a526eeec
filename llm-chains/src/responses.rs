//! Fixed user-facing sentences.

/// Retrieval produced no context; the model is never called.
pub const NO_CONTEXT_RESPONSE: &str =
    "Sorry, this question doesn't seem to be answered within the information I was provided.";

/// Nothing trustworthy could be produced.
pub const FAIL_RESPONSE: &str =
    "Sorry, I could not find relevant information to address this question.";

/// An upstream stage failed.
pub const ERROR_RESPONSE: &str = "Sorry, I am having trouble answering questions right now.";

/// Appended when some sub-queries of a compound question went unanswered.
pub const CAVEAT: &str = "I could not find any other information.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::CONTEXT_ONLY;

    #[test]
    fn strict_prompt_uses_the_fail_sentence() {
        assert!(CONTEXT_ONLY.contains(FAIL_RESPONSE));
    }
}
