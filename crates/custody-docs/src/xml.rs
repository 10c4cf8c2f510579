//! XML escaping and fixed-width text wrapping.

/// Escape the five XML special characters. Characters outside the XML 1.0
/// `Char` production are dropped.
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars().filter(|&c| is_xml_char(c)) {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Greedy word wrap at `max` characters per line.
///
/// Input line breaks are preserved, runs of whitespace collapse to a
/// single space, and words longer than `max` are hard-split.
pub fn wrap_text(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut lines = Vec::new();
    for raw in text.lines() {
        let mut line = String::new();
        let mut line_len = 0usize;
        for word in raw.split_whitespace() {
            let word_len = word.chars().count();
            let candidate_len = if line.is_empty() { word_len } else { line_len + 1 + word_len };
            if candidate_len <= max {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(word);
                line_len = candidate_len;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if word_len > max {
                let chars: Vec<char> = word.chars().collect();
                for chunk in chars.chunks(max) {
                    lines.push(chunk.iter().collect());
                }
            } else {
                line.push_str(word);
                line_len = word_len;
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn escapes_all_specials() {
        assert_eq!(
            escape_xml(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&apos;s&lt;/a&gt;"
        );
    }

    #[test]
    fn drops_characters_illegal_in_xml() {
        assert_eq!(escape_xml("Wat\u{1}ch"), "Watch");
        assert_eq!(escape_xml("Bo\u{b}b\u{FFFE}"), "Bob");
        assert_eq!(escape_xml("a\tb\nc"), "a\tb\nc");
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 15);
        assert_eq!(lines, vec!["the quick brown", "fox jumps over", "the lazy dog"]);
    }

    #[test]
    fn hard_splits_long_words() {
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn keeps_explicit_line_breaks_and_drops_blank_lines() {
        let lines = wrap_text("first line\r\n\nsecond", 30);
        assert_eq!(lines, vec!["first line", "second"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(wrap_text("", 30).is_empty());
        assert!(wrap_text("   ", 30).is_empty());
    }

    proptest! {
        #[test]
        fn no_line_exceeds_width(text in "[a-zA-Z ]{0,200}", width in 1usize..40) {
            for line in wrap_text(&text, width) {
                prop_assert!(line.chars().count() <= width);
                prop_assert!(!line.is_empty());
            }
        }

        #[test]
        fn wrapping_preserves_words(text in "[a-z]{1,8}( [a-z]{1,8}){0,20}") {
            let joined = wrap_text(&text, 30).join(" ");
            prop_assert_eq!(joined, text);
        }

        #[test]
        fn escaped_text_has_no_raw_markup(text in ".{0,80}") {
            let escaped = escape_xml(&text);
            prop_assert!(!escaped.contains('<'));
            prop_assert!(!escaped.contains('>'));
            prop_assert!(!escaped.contains('"'));
            prop_assert!(escaped.chars().all(is_xml_char));
        }
    }
}
