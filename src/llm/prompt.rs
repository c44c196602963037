//! Prompt builder for the voice assistant persona.
//!
//! [`PromptBuilder`] produces the `(system_msg, user_msg)` pair sent to an
//! OpenAI-compatible `/chat/completions` endpoint.  The reply is spoken on a
//! small speaker, so every persona asks for short plain sentences without
//! markdown.
//!
//! Arabic (`"ar"`) and English (`"en"`) have dedicated personas; any other
//! language code falls back to English instructions that ask the model to
//! answer in the user's language.

// ---------------------------------------------------------------------------
// System instructions
// ---------------------------------------------------------------------------

const SYSTEM_INSTRUCTION_AR: &str = "\
أنت مساعد صوتي ذكي ومفيد. أجب بشكل مختصر ومفيد باللغة العربية.
سيتم تحويل إجابتك إلى كلام مسموع، لذلك لا تستخدم الرموز أو القوائم أو التنسيق.";

const SYSTEM_INSTRUCTION_EN: &str = "\
You are a smart, helpful voice assistant. Answer briefly and usefully.
Your answer will be read aloud, so do not use markdown, lists, emoji or symbols.
Reply in the same language the user speaks.";

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds chat messages for the assistant.
///
/// # Example
/// ```rust
/// use voice_relay::llm::PromptBuilder;
///
/// let builder = PromptBuilder::new("ar");
/// let (system, user) = builder.build_chat("مرحبا");
/// assert!(system.contains("مساعد صوتي"));
/// assert_eq!(user, "مرحبا");
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
}

impl PromptBuilder {
    /// Builder with the built-in persona for an ISO-639-1 language code.
    pub fn new(language: &str) -> Self {
        let system = match language {
            "ar" => SYSTEM_INSTRUCTION_AR,
            _ => SYSTEM_INSTRUCTION_EN,
        };
        Self {
            system: system.to_string(),
        }
    }

    /// Builder with an operator-supplied system prompt.
    pub fn with_system_prompt(system: &str) -> Self {
        Self {
            system: system.trim().to_string(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system
    }

    /// Build a `(system_msg, user_msg)` pair.  The user message is the
    /// transcript, trimmed.
    pub fn build_chat(&self, user_text: &str) -> (String, String) {
        (self.system.clone(), user_text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arabic_persona_answers_in_arabic() {
        let builder = PromptBuilder::new("ar");
        let (system, _) = builder.build_chat("مرحبا");
        assert!(system.contains("باللغة العربية"));
        assert!(system.contains("مختصر"));
    }

    #[test]
    fn english_persona_forbids_markdown() {
        let builder = PromptBuilder::new("en");
        let (system, _) = builder.build_chat("hello");
        assert!(system.contains("voice assistant"));
        assert!(system.contains("markdown"));
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let builder = PromptBuilder::new("th");
        assert!(builder.system_prompt().contains("same language the user speaks"));
    }

    #[test]
    fn user_message_is_trimmed_transcript() {
        let builder = PromptBuilder::new("ar");
        let (_, user) = builder.build_chat("  كيف حالك؟ \n");
        assert_eq!(user, "كيف حالك؟");
    }

    #[test]
    fn custom_prompt_replaces_persona() {
        let builder = PromptBuilder::with_system_prompt("  Be terse.  ");
        let (system, _) = builder.build_chat("x");
        assert_eq!(system, "Be terse.");
    }
}
