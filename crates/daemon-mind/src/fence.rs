/// Strip one surrounding Markdown code fence, with or without a language tag.
/// Text that is not fenced on both ends comes back trimmed but otherwise intact.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.len() < 6 || !trimmed.starts_with("```") || !trimmed.ends_with("```") {
        return trimmed;
    }
    let inner = &trimmed[3..trimmed.len() - 3];
    // ```json\n{...}\n```: drop the tag line
    match inner.split_once('\n') {
        Some((tag, rest)) if is_language_tag(tag) => rest.trim(),
        _ => inner.trim(),
    }
}

fn is_language_tag(line: &str) -> bool {
    let tag = line.trim();
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '.'))
}
