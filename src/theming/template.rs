//! Recursive-descent scanner for the template language in spec.md §4.7:
//! `{{identifier | filter(arg)? | ...}}` references and `{# ... #}`
//! comments, both removed/expanded before emission.

use crate::theming::filters::Filter;

/// One piece of a parsed template: literal text, or a variable reference
/// with its filter pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Variable { identifier: String, filters: Vec<Filter> },
}

/// A template source fully parsed into an ordered list of segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub segments: Vec<Segment>,
}

/// Parses `source`, stripping `{# ... #}` comments and turning
/// `{{...}}` references into [`Segment::Variable`]. Malformed variable
/// syntax (missing closing `}}`) is treated as literal text from that
/// point onward, matching a forgiving parser rather than hard-failing on
/// templates authored by hand.
pub fn parse(source: &str) -> Template {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let bytes = source.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if source[i..].starts_with("{#") {
            if let Some(end) = source[i..].find("#}") {
                i += end + 2;
                continue;
            } else {
                // Unterminated comment: treat the rest as removed, same
                // as a terminated one, rather than emitting it literally.
                break;
            }
        }

        if source[i..].starts_with("{{") {
            if let Some(end) = source[i..].find("}}") {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let inner = &source[i + 2..i + end];
                segments.push(parse_variable(inner));
                i += end + 2;
                continue;
            }
        }

        let ch = source[i..].chars().next().unwrap();
        literal.push(ch);
        i += ch.len_utf8();
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Template { segments }
}

fn parse_variable(inner: &str) -> Segment {
    let mut parts = inner.split('|').map(str::trim);
    let identifier = parts.next().unwrap_or("").to_string();
    let filters = parts.filter_map(parse_filter_call).collect();
    Segment::Variable { identifier, filters }
}

fn parse_filter_call(raw: &str) -> Option<Filter> {
    let raw = raw.trim();
    match raw.split_once('(') {
        Some((name, rest)) => {
            let arg = rest.strip_suffix(')').unwrap_or(rest).trim();
            Filter::parse(name.trim(), Some(arg))
        }
        None => Filter::parse(raw, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_single_literal() {
        let template = parse("background = value");
        assert_eq!(
            template.segments,
            vec![Segment::Literal("background = value".to_string())]
        );
    }

    #[test]
    fn comments_are_removed() {
        let template = parse("a{# this is dropped #}b");
        assert_eq!(
            template.segments,
            vec![Segment::Literal("ab".to_string())]
        );
    }

    #[test]
    fn variable_without_filters_parses() {
        let template = parse("{{background}}");
        assert_eq!(
            template.segments,
            vec![Segment::Variable {
                identifier: "background".to_string(),
                filters: vec![]
            }]
        );
    }

    #[test]
    fn variable_with_filter_chain_parses_left_to_right() {
        let template = parse("{{color1 | darken(0.2) | strip}}");
        assert_eq!(
            template.segments,
            vec![Segment::Variable {
                identifier: "color1".to_string(),
                filters: vec![Filter::Darken(0.2), Filter::Strip],
            }]
        );
    }

    #[test]
    fn mixed_literal_and_variable_segments() {
        let template = parse(r#"background = "{{background}}""#);
        assert_eq!(
            template.segments,
            vec![
                Segment::Literal("background = \"".to_string()),
                Segment::Variable {
                    identifier: "background".to_string(),
                    filters: vec![],
                },
                Segment::Literal("\"".to_string()),
            ]
        );
    }
}
