//! Deterministic post-processing applied to every answer before it is
//! returned: word-count truncation and a keyword toxicity heuristic.

#[derive(Debug, Clone)]
pub struct GuardrailConfig {
    pub default_max_words: u32,
    pub ellipsis: String,
    pub deny_list: Vec<String>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            default_max_words: 150,
            ellipsis: "…".to_string(),
            deny_list: ["estúpido", "idiota", "odiar", "matar"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Soft-truncate by word count, appending the ellipsis marker when text was
/// dropped. Splits on whitespace only; never cuts inside a word.
pub fn truncate_words(text: &str, max_words: u32, ellipsis: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words as usize {
        return text.to_string();
    }
    let mut out = words[..max_words as usize].join(" ");
    out.push_str(ellipsis);
    out
}

/// Keyword heuristic, not a classifier: 1.0 when no deny-list term appears
/// (case-insensitive substring match), minus 0.2 per hit, floored at 0.0.
/// False negatives are expected.
pub fn toxicity_score(text: &str, deny_list: &[String]) -> f64 {
    let lowered = text.to_lowercase();
    let hits = deny_list.iter().filter(|bad| lowered.contains(bad.as_str())).count();
    if hits == 0 {
        1.0
    } else {
        (1.0 - 0.2 * hits as f64).max(0.0)
    }
}

pub fn non_empty_answer(text: &str) -> bool {
    !text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GuardrailConfig {
        GuardrailConfig::default()
    }

    #[test]
    fn truncates_long_text_with_ellipsis() {
        let text = std::iter::repeat("palabra").take(100).collect::<Vec<_>>().join(" ");
        let out = truncate_words(&text, 10, "…");
        assert!(out.ends_with('…'));
        assert_eq!(out.split_whitespace().count(), 10);
    }

    #[test]
    fn short_text_is_untouched() {
        let out = truncate_words("hola mundo", 10, "…");
        assert_eq!(out, "hola mundo");
        assert!(!out.ends_with('…'));
    }

    #[test]
    fn truncation_respects_word_boundaries() {
        let out = truncate_words("uno dos tres cuatro cinco", 3, "…");
        assert_eq!(out, "uno dos tres…");
    }

    #[test]
    fn exact_limit_is_not_truncated() {
        let out = truncate_words("uno dos tres", 3, "…");
        assert_eq!(out, "uno dos tres");
    }

    #[test]
    fn deny_list_hit_lowers_score() {
        let cfg = config();
        assert_eq!(toxicity_score("quiero MATAR el proceso", &cfg.deny_list), 0.8);
        assert_eq!(toxicity_score("respuesta tranquila", &cfg.deny_list), 1.0);
    }

    #[test]
    fn multiple_hits_stack_and_floor_at_zero() {
        let cfg = config();
        let text = "estúpido idiota odiar matar estúpido odiar";
        // Four distinct terms match; score floors rather than going negative.
        assert_eq!(toxicity_score(text, &cfg.deny_list), 1.0 - 0.2 * 4.0);
        let everything: Vec<String> = (0..6).map(|i| format!("bad{i}")).collect();
        let loaded = "bad0 bad1 bad2 bad3 bad4 bad5";
        assert_eq!(toxicity_score(loaded, &everything), 0.0);
    }

    #[test]
    fn non_empty_ignores_whitespace() {
        assert!(non_empty_answer(" hola "));
        assert!(!non_empty_answer("   "));
        assert!(!non_empty_answer(""));
    }
}
