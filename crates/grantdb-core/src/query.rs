//! Query normalization and tokenization.
//!
//! `tokenize` is the single tokenizer for the whole system: the keyword
//! index calls it at build time and at query time, so lexical scores stay
//! comparable. Keep it pure and total.

/// Domain abbreviations expanded into queries for recall. Expansions are
/// appended, never substituted, so the original terms keep matching.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("rfp", "request for proposal"),
    ("rfa", "request for applications"),
    ("loi", "letter of inquiry"),
    ("kpi", "key performance indicator"),
    ("mou", "memorandum of understanding"),
    ("cbo", "community based organization"),
    ("fte", "full time equivalent"),
    ("roi", "return on investment"),
];

/// Lowercases, strips everything that is not alphanumeric or whitespace,
/// and splits on whitespace. Deterministic, no hidden state.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(ToString::to_string)
        .collect()
}

/// Normalizes raw query text before it is tokenized or embedded.
#[derive(Debug, Clone)]
pub struct QueryProcessor {
    expand_query: bool,
}

impl QueryProcessor {
    pub fn new(expand_query: bool) -> Self {
        Self { expand_query }
    }

    /// Strips characters outside `[\w\s.,!?-]`, collapses whitespace, and
    /// optionally appends abbreviation expansions for whole-word matches.
    pub fn process(&self, raw_query: &str) -> String {
        let cleaned: String = raw_query
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace() || ".,!?-".contains(*c))
            .collect();
        let mut processed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

        if self.expand_query {
            let words = tokenize(&processed);
            for (abbreviation, expansion) in ABBREVIATIONS {
                if words.iter().any(|w| w == abbreviation) {
                    processed.push(' ');
                    processed.push_str(expansion);
                }
            }
        }
        processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_matches_reference_scenario() {
        assert_eq!(
            tokenize("RFP for Early-Childhood Education!"),
            vec!["rfp", "for", "early", "childhood", "education"]
        );
    }

    #[test]
    fn tokenize_is_deterministic() {
        let text = "Mixed CASE, punct!!  and   spacing\t42";
        assert_eq!(tokenize(text), tokenize(text));
    }

    #[test]
    fn tokenize_drops_empty_tokens() {
        assert_eq!(tokenize("  ...  ---  "), Vec::<String>::new());
        assert_eq!(tokenize(""), Vec::<String>::new());
    }

    #[test]
    fn process_collapses_whitespace_and_strips_symbols() {
        let processor = QueryProcessor::new(false);
        assert_eq!(
            processor.process("  budget   template\t(draft) <v2>  "),
            "budget template draft v2"
        );
        // Allowed punctuation survives.
        assert_eq!(
            processor.process("what changed, exactly?!"),
            "what changed, exactly?!"
        );
    }

    #[test]
    fn expansion_is_additive_and_whole_word() {
        let processor = QueryProcessor::new(true);
        let expanded = processor.process("RFP deadline");
        assert!(expanded.starts_with("RFP deadline"));
        assert!(expanded.contains("request for proposal"));

        // "rfps" is a different token, so no expansion fires.
        let not_expanded = processor.process("rfps galore");
        assert!(!not_expanded.contains("request for proposal"));
    }

    #[test]
    fn expansion_is_case_insensitive() {
        let processor = QueryProcessor::new(true);
        let expanded = processor.process("loi requirements for the KPI report");
        assert!(expanded.contains("letter of inquiry"));
        assert!(expanded.contains("key performance indicator"));
    }

    #[test]
    fn expansion_disabled_is_a_no_op() {
        let processor = QueryProcessor::new(false);
        assert_eq!(processor.process("RFP deadline"), "RFP deadline");
    }
}
