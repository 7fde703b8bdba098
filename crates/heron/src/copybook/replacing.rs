//
// copybook/replacing.rs
//
// REPLACING phrase applied to copybook content before it is spliced
//

use regex::Regex;

use super::directive::{ReplacingMode, ReplacingOperand, Replacement};

/// Characters that continue a COBOL word
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

struct Matcher {
    regex: Regex,
    check_left: bool,
    check_right: bool,
    replacement: String,
}

impl Matcher {
    fn compile(replacement: &Replacement) -> Option<Self> {
        let (pattern, literal) = match &replacement.from {
            ReplacingOperand::PseudoText(text) => {
                let tokens: Vec<String> = text.split_whitespace().map(regex::escape).collect();
                (tokens.join(r"\s+"), false)
            }
            ReplacingOperand::Word(word) => {
                let literal = word.starts_with('"') || word.starts_with('\'');
                (regex::escape(word.trim()), literal)
            }
        };
        if pattern.is_empty() {
            return None;
        }

        // LEADING and TRAILING match part of a word, anchored at one edge
        let from = replacement.from.text().trim();
        let check_left = replacement.mode != ReplacingMode::Trailing
            && from.chars().next().map(is_word_char).unwrap_or(false);
        let check_right = replacement.mode != ReplacingMode::Leading
            && from.chars().next_back().map(is_word_char).unwrap_or(false);
        let flags = if literal { "" } else { "(?i)" };

        let regex = match Regex::new(&format!("{}{}", flags, pattern)) {
            Ok(regex) => regex,
            Err(e) => {
                log::warn!("Skipping REPLACING operand {:?}: {}", from, e);
                return None;
            }
        };

        let replacement = match &replacement.to {
            ReplacingOperand::PseudoText(text) => text.trim().to_string(),
            ReplacingOperand::Word(word) => word.clone(),
        };

        Some(Self {
            regex,
            check_left,
            check_right,
            replacement,
        })
    }

    /// First match at or after `from` that sits on word boundaries
    fn find_from(&self, content: &str, mut from: usize) -> Option<(usize, usize)> {
        while from <= content.len() {
            let m = self.regex.find_at(content, from)?;
            let left_ok = !self.check_left
                || !content[..m.start()]
                    .chars()
                    .next_back()
                    .map(is_word_char)
                    .unwrap_or(false);
            let right_ok = !self.check_right
                || !content[m.end()..]
                    .chars()
                    .next()
                    .map(is_word_char)
                    .unwrap_or(false);
            if left_ok && right_ok {
                return Some((m.start(), m.end()));
            }
            from = m.start()
                + content[m.start()..]
                    .chars()
                    .next()
                    .map(char::len_utf8)
                    .unwrap_or(1);
        }
        None
    }
}

/// Apply `replacements` to `content` in a single left-to-right pass.
///
/// At each position the earliest match wins, ties going to the pair listed
/// first. Replaced text is not scanned again.
pub fn apply_replacing(content: &str, replacements: &[Replacement]) -> String {
    let matchers: Vec<Matcher> = replacements.iter().filter_map(Matcher::compile).collect();
    if matchers.is_empty() {
        return content.to_string();
    }

    let mut out = String::with_capacity(content.len());
    let mut pos = 0;
    loop {
        let mut best: Option<(usize, usize, usize)> = None;
        for (i, matcher) in matchers.iter().enumerate() {
            if let Some((start, end)) = matcher.find_from(content, pos) {
                if best.map(|(s, _, _)| start < s).unwrap_or(true) {
                    best = Some((start, end, i));
                }
            }
        }
        let Some((start, end, i)) = best else { break };
        out.push_str(&content[pos..start]);
        out.push_str(&matchers[i].replacement);
        pos = end;
    }
    out.push_str(&content[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pseudo(from: &str, to: &str) -> Replacement {
        Replacement {
            from: ReplacingOperand::PseudoText(from.to_string()),
            to: ReplacingOperand::PseudoText(to.to_string()),
            mode: ReplacingMode::Full,
        }
    }

    fn word(from: &str, to: &str) -> Replacement {
        Replacement {
            from: ReplacingOperand::Word(from.to_string()),
            to: ReplacingOperand::Word(to.to_string()),
            mode: ReplacingMode::Full,
        }
    }

    fn partial(mode: ReplacingMode, from: &str, to: &str) -> Replacement {
        Replacement {
            mode,
            ..pseudo(from, to)
        }
    }

    #[test]
    fn test_partial_word_with_delimited_tag() {
        let content = "       01 :PFX:-REC.\n          05 :PFX:-ID PIC 9(5).\n";
        let out = apply_replacing(content, &[pseudo(":PFX:", "WS")]);
        assert_eq!(out, "       01 WS-REC.\n          05 WS-ID PIC 9(5).\n");
    }

    #[test]
    fn test_word_respects_boundaries_and_case() {
        let content = "MOVE amount TO AMOUNT-X AMOUNT.";
        let out = apply_replacing(content, &[word("AMOUNT", "TOTAL")]);
        assert_eq!(out, "MOVE TOTAL TO AMOUNT-X TOTAL.");
    }

    #[test]
    fn test_leading_matches_word_starts() {
        let content = "       01 AA-REC.\n          05 AA-ID PIC 9.\n          05 X-AA PIC X.\n";
        let out = apply_replacing(content, &[partial(ReplacingMode::Leading, "AA", "BB")]);
        assert_eq!(
            out,
            "       01 BB-REC.\n          05 BB-ID PIC 9.\n          05 X-AA PIC X.\n"
        );
    }

    #[test]
    fn test_trailing_matches_word_ends() {
        let content = "       01 REC-IN.\n          05 IN-KEY PIC 9.\n";
        let out = apply_replacing(content, &[partial(ReplacingMode::Trailing, "-IN", "-OUT")]);
        assert_eq!(out, "       01 REC-OUT.\n          05 IN-KEY PIC 9.\n");
    }

    #[test]
    fn test_full_mode_leaves_partial_words() {
        let out = apply_replacing("01 AA-REC AA.", &[pseudo("AA", "BB")]);
        assert_eq!(out, "01 AA-REC BB.");
    }

    #[test]
    fn test_pseudo_text_spans_whitespace_runs() {
        let content = "       PIC   X(10)\n    VALUE SPACES.";
        let out = apply_replacing(content, &[pseudo(" PIC X(10) ", "PIC X(20)")]);
        assert_eq!(out, "       PIC X(20)\n    VALUE SPACES.");
    }

    #[test]
    fn test_empty_replacement_deletes() {
        let out = apply_replacing("01 A PIC X VALUE 'Y'.", &[pseudo("VALUE 'Y'", "")]);
        assert_eq!(out, "01 A PIC X .");
    }

    #[test]
    fn test_replaced_text_is_not_rescanned() {
        let out = apply_replacing("A B", &[word("A", "B"), word("B", "C")]);
        assert_eq!(out, "B C");
    }

    #[test]
    fn test_first_listed_wins_on_tie() {
        let out = apply_replacing("X-Y", &[pseudo("X-Y", "ONE"), pseudo("X", "TWO")]);
        assert_eq!(out, "ONE");
    }

    #[test]
    fn test_empty_pattern_is_ignored() {
        let out = apply_replacing("01 A.", &[pseudo("   ", "B")]);
        assert_eq!(out, "01 A.");
    }
}
