//! Translation prompts and input bounding.
//!
//! [`PromptBuilder::build_chat`] produces the `(system_msg, user_msg)` pair
//! for an OpenAI-compatible chat endpoint.  The system message is specific to
//! the direction; the user message carries a couple of examples and the text.

use crate::language::Direction;

// ---------------------------------------------------------------------------
// System instructions
// ---------------------------------------------------------------------------

const SYSTEM_INSTRUCTION_VI_EN: &str = "\
You are a Vietnamese to English interpreter for spoken conversation.
The input is a speech recognition transcript and may lack punctuation or diacritics.

Rules:
1. Translate the Vietnamese input into natural spoken English.
2. Keep names, numbers and technical terms as they are.
3. Reply with ONLY the English translation, no explanation or quotes.";

const SYSTEM_INSTRUCTION_EN_VI: &str = "\
You are an English to Vietnamese interpreter for spoken conversation.
The input is a speech recognition transcript and may lack punctuation.

Rules:
1. Translate the English input into natural spoken Vietnamese with full diacritics.
2. Keep names, numbers and technical terms as they are.
3. Reply with ONLY the Vietnamese translation, no explanation or quotes.";

// ---------------------------------------------------------------------------
// Few-shot examples
// ---------------------------------------------------------------------------

const EXAMPLES_VI_EN: &str = "
Examples:
Input: \"xin chào bạn có khỏe không\"
Output: \"Hello, how are you?\"

Input: \"nhà vệ sinh ở đâu vậy\"
Output: \"Where is the restroom?\"
";

const EXAMPLES_EN_VI: &str = "
Examples:
Input: \"hello how are you\"
Output: \"Xin chào, bạn có khỏe không?\"

Input: \"how much does this cost\"
Output: \"Cái này giá bao nhiêu?\"
";

// ---------------------------------------------------------------------------
// truncate_tokens
// ---------------------------------------------------------------------------

/// Keep at most `max` whitespace-delimited tokens of `text`, re-joined with
/// single spaces.
///
/// ```
/// use voice_translate::translate::truncate_tokens;
///
/// assert_eq!(truncate_tokens("a  b c d", 2), "a b");
/// assert_eq!(truncate_tokens("  xin   chào ", 128), "xin chào");
/// ```
pub fn truncate_tokens(text: &str, max: usize) -> String {
    text.split_whitespace()
        .take(max)
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds translation prompts for one direction.
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    direction: Direction,
}

impl PromptBuilder {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }

    /// Build a `(system_msg, user_msg)` pair.
    pub fn build_chat(&self, text: &str) -> (String, String) {
        let mut user_msg = String::with_capacity(512);
        user_msg.push_str(self.examples());
        user_msg.push_str(&format!(
            "\n{} transcript:\n{}\n\n{} translation:\n",
            self.direction.source().name(),
            text,
            self.direction.target().name()
        ));

        (self.system_instruction().to_string(), user_msg)
    }

    fn system_instruction(&self) -> &'static str {
        match self.direction {
            Direction::ViToEn => SYSTEM_INSTRUCTION_VI_EN,
            Direction::EnToVi => SYSTEM_INSTRUCTION_EN_VI,
        }
    }

    fn examples(&self) -> &'static str {
        match self.direction {
            Direction::ViToEn => EXAMPLES_VI_EN,
            Direction::EnToVi => EXAMPLES_EN_VI,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
