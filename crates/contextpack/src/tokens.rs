//! Tokeniser-aware truncation (§4.E: "Truncation is tokeniser-aware; a
//! BPE-class tokeniser produces the counts"). Uses the same `cl100k_base`
//! encoding the upstream chat model's family is trained on; the exact
//! vendor tokeniser is not publicly invocable, so this is the accepted
//! approximation for budget enforcement.

use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;

fn bpe() -> &'static CoreBPE {
    static BPE: OnceLock<CoreBPE> = OnceLock::new();
    BPE.get_or_init(|| tiktoken_rs::cl100k_base().expect("bundled cl100k_base ranks are valid"))
}

pub fn count_tokens(text: &str) -> usize {
    bpe().encode_ordinary(text).len()
}

/// Truncate `text` to at most `max_tokens` tokens, returning the truncated
/// text and whether truncation occurred. Truncation drops tokens from the
/// end, keeping the earliest (highest-priority) content intact.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> (String, bool) {
    let encoding = bpe();
    let tokens = encoding.encode_ordinary(text);
    if tokens.len() <= max_tokens {
        return (text.to_string(), false);
    }
    let truncated = encoding
        .decode(tokens[..max_tokens].to_vec())
        .unwrap_or_default();
    (truncated, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_not_truncated() {
        let (out, truncated) = truncate_to_tokens("hello world", 100);
        assert_eq!(out, "hello world");
        assert!(!truncated);
    }

    #[test]
    fn long_text_is_truncated_to_budget() {
        let text = "token ".repeat(500);
        let (out, truncated) = truncate_to_tokens(&text, 10);
        assert!(truncated);
        assert!(count_tokens(&out) <= 10);
    }

    #[test]
    fn count_tokens_is_nonzero_for_nonempty_text() {
        assert!(count_tokens("Sending 200 USD to Ana") > 0);
    }
}
