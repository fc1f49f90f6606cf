use std::borrow::Cow;

/// Maximum number of characters a tool hands back to the model.
pub const OUTPUT_BUDGET: usize = 8000;

/// Keeps the last `budget` characters of `text`, after a notice line.
pub fn keep_last(text: &str, budget: usize) -> Cow<'_, str> {
    let len = text.chars().count();
    if len <= budget {
        return Cow::Borrowed(text);
    }
    let start = text
        .char_indices()
        .nth(len - budget)
        .map_or(text.len(), |(idx, _)| idx);
    Cow::Owned(format!(
        "[truncated, showing last {budget} chars]\n{}",
        &text[start..]
    ))
}

/// Keeps the first `budget` characters of `text`, after a notice line.
pub fn keep_first(text: &str, budget: usize) -> Cow<'_, str> {
    let Some((end, _)) = text.char_indices().nth(budget) else {
        return Cow::Borrowed(text);
    };
    Cow::Owned(format!(
        "[truncated, showing first {budget} chars]\n{}",
        &text[..end]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_untouched() {
        assert!(matches!(keep_last("abc", 3), Cow::Borrowed("abc")));
        assert!(matches!(keep_first("abc", 3), Cow::Borrowed("abc")));
        assert_eq!(keep_last("", 0), "");
    }

    #[test]
    fn test_keep_last() {
        assert_eq!(
            keep_last("abcdef", 2),
            "[truncated, showing last 2 chars]\nef"
        );
    }

    #[test]
    fn test_keep_first() {
        assert_eq!(
            keep_first("abcdef", 2),
            "[truncated, showing first 2 chars]\nab"
        );
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let text = "é".repeat(OUTPUT_BUDGET + 1);
        let tail = keep_last(&text, OUTPUT_BUDGET);
        let body = tail.split_once('\n').unwrap().1;
        assert_eq!(body.chars().count(), OUTPUT_BUDGET);

        let head = keep_first(&text, OUTPUT_BUDGET);
        let body = head.split_once('\n').unwrap().1;
        assert_eq!(body.chars().count(), OUTPUT_BUDGET);
        assert_eq!(keep_first(&"é".repeat(10), 10), "é".repeat(10));
    }
}
