use crate::ChatMessage;

pub const DEFAULT_MODEL: &str = "llama3.2";

/// Longest selection preview shown on the prompt surface, in characters.
pub const PREVIEW_MAX_CHARS: usize = 120;

const PREVIEW_ELLIPSIS: &str = "...";

/// Standing instruction prepended to every rewrite request.
pub const SYSTEM_PROMPT_IMPROVE_WRITING: &str = "You are an expert AI writing assistant. Your task is to revise the user's text based on their instruction.
- Directly rewrite the text provided.
- Do not add any commentary, preamble, or post-amble. For example, never say \"Here is the revised text:\".
- Output only the improved text.
- If the text is already perfect and requires no changes, output the original text exactly as it was provided.
- Never wrap your response in quotes or code blocks.
";

/// Combines the standing instruction, the selection and the user's
/// instruction into the single prompt sent to the model.
pub fn build_final_prompt(selected_text: &str, instruction: &str) -> String {
    format!(
        "{SYSTEM_PROMPT_IMPROVE_WRITING}\n\nUser's selected text:\n{selected_text}\n\nUser's instruction:\n{instruction}\n\nRevised text:"
    )
}

/// The message list for a rewrite: one user message, nothing else.
pub fn build_messages(selected_text: &str, instruction: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(build_final_prompt(
        selected_text,
        instruction,
    ))]
}

/// One-line preview of a selection: whitespace runs collapse to a single
/// space, and long text keeps its head and tail around an ellipsis.
pub fn preview_selection(text: &str) -> String {
    let formatted = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let total = formatted.chars().count();
    if total <= PREVIEW_MAX_CHARS {
        return formatted;
    }

    // Roughly 60/40 between head and tail.
    let available = PREVIEW_MAX_CHARS - PREVIEW_ELLIPSIS.len();
    let head_len = available * 6 / 10;
    let tail_len = available - head_len;

    let head: String = formatted.chars().take(head_len).collect();
    let tail: String = formatted.chars().skip(total - tail_len).collect();
    format!("{}{PREVIEW_ELLIPSIS}{}", head.trim(), tail.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_prompt_embeds_selection_and_instruction_in_order() {
        let prompt = build_final_prompt("this is bad grammar", "fix grammar");
        assert!(prompt.starts_with(SYSTEM_PROMPT_IMPROVE_WRITING));
        assert!(prompt.ends_with(
            "User's selected text:\nthis is bad grammar\n\nUser's instruction:\nfix grammar\n\nRevised text:"
        ));
    }

    #[test]
    fn short_preview_only_collapses_whitespace() {
        assert_eq!(preview_selection("  one\n\ntwo   three "), "one two three");
    }

    #[test]
    fn long_preview_keeps_head_and_tail() {
        let text = format!("{}{}", "a".repeat(100), "b".repeat(100));
        let preview = preview_selection(&text);
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS);
        assert!(preview.starts_with(&"a".repeat(70)));
        assert!(preview.contains("..."));
        assert!(preview.ends_with(&"b".repeat(47)));
    }
}
