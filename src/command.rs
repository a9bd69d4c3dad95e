/// Default invocation marker for assistant queries.
pub const DEFAULT_INVOCATION_MARKER: &str = "@GPTちゃん";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Marker followed by a non-empty question.
    AssistantInvocation(String),
    /// Marker with nothing after it. Never reaches the gateway.
    NoOp,
    /// Anything else; a translation candidate.
    PlainText(String),
}

pub fn classify(text: &str, marker: &str) -> Classification {
    match text.strip_prefix(marker) {
        Some(rest) => {
            let question = rest.trim();
            if question.is_empty() {
                Classification::NoOp
            } else {
                Classification::AssistantInvocation(question.to_string())
            }
        }
        None => Classification::PlainText(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = DEFAULT_INVOCATION_MARKER;

    #[test]
    fn test_invocation_strips_marker() {
        assert_eq!(
            classify("@GPTちゃん hello", MARKER),
            Classification::AssistantInvocation("hello".to_string())
        );
    }

    #[test]
    fn test_invocation_without_space() {
        assert_eq!(
            classify("@GPTちゃん今日の天気は？", MARKER),
            Classification::AssistantInvocation("今日の天気は？".to_string())
        );
    }

    #[test]
    fn test_invocation_trims_question() {
        assert_eq!(
            classify("@GPTちゃん   what is rust?  \n", MARKER),
            Classification::AssistantInvocation("what is rust?".to_string())
        );
    }

    #[test]
    fn test_marker_alone_is_noop() {
        assert_eq!(classify("@GPTちゃん", MARKER), Classification::NoOp);
        assert_eq!(classify("@GPTちゃん   ", MARKER), Classification::NoOp);
        assert_eq!(classify("@GPTちゃん\n\t", MARKER), Classification::NoOp);
    }

    #[test]
    fn test_marker_elsewhere_is_plain_text() {
        assert_eq!(
            classify("hey @GPTちゃん hello", MARKER),
            Classification::PlainText("hey @GPTちゃん hello".to_string())
        );
    }

    #[test]
    fn test_later_markers_are_kept_in_question() {
        assert_eq!(
            classify("@GPTちゃん who is @GPTちゃん?", MARKER),
            Classification::AssistantInvocation("who is @GPTちゃん?".to_string())
        );
    }

    #[test]
    fn test_plain_text_keeps_full_text() {
        assert_eq!(
            classify("Hello there", MARKER),
            Classification::PlainText("Hello there".to_string())
        );
    }

    #[test]
    fn test_custom_marker() {
        assert_eq!(
            classify("!ask ping", "!ask"),
            Classification::AssistantInvocation("ping".to_string())
        );
        assert_eq!(
            classify("@GPTちゃん ping", "!ask"),
            Classification::PlainText("@GPTちゃん ping".to_string())
        );
    }
}
