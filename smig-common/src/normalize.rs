//! Display-name normalization.
//!
//! The two systems format user display names differently (case, accents,
//! stray whitespace), so matching happens on a canonical key: lower-cased
//! and transliterated to ASCII. The function is total and deterministic,
//! which is what makes re-running a matching pass idempotent.

use deunicode::deunicode;

/// Derive the canonical matching key for a display name.
///
/// "José Díaz" and "jose diaz" produce the same key.
pub fn match_key(display_name: &str) -> String {
    deunicode(&display_name.to_lowercase()).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_and_diacritic_variants_collapse() {
        assert_eq!(match_key("José Díaz"), match_key("jose diaz"));
        assert_eq!(match_key("MÜLLER"), match_key("muller"));
        assert_eq!(match_key("Zoë"), "zoe");
    }

    #[test]
    fn ascii_names_pass_through_lowercased() {
        assert_eq!(match_key("Rodolfo Bortolin"), "rodolfo bortolin");
    }

    #[test]
    fn total_on_degenerate_input() {
        assert_eq!(match_key(""), "");
        assert_eq!(match_key("   "), "");
        // Unmappable characters never panic.
        let _ = match_key("名前\u{FFFF}");
    }

    #[test]
    fn deterministic_across_calls() {
        let a = match_key("Ана Ћирић");
        let b = match_key("Ана Ћирић");
        assert_eq!(a, b);
    }
}
