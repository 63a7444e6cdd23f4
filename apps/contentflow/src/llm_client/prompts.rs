// Shared prompt utilities.
// Each service that needs LLM calls defines its own prompts alongside it.
// This file contains cross-cutting helpers and fragments.

use crate::models::content::ContentPiece;

/// Placeholder used when there are no existing pieces to show the model.
pub const NO_EXISTING_CONTENT: &str = "[No existing content provided]";

/// Fills `{name}` placeholders in `template` in a single pass.
///
/// Values are inserted verbatim and never rescanned, so user text that
/// happens to contain `{idea_context}` or stray braces comes through intact.
/// Unknown placeholders are left as-is.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + vars.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });

        match replaced {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// One `<content_piece>` block with its format and body.
pub fn content_piece_xml(piece: &ContentPiece) -> String {
    format!(
        "<content_piece>\n<format>{}</format>\n<content>\n{}\n</content>\n</content_piece>",
        piece.format, piece.content
    )
}

/// Wraps pieces in `<existing_content>`. With no pieces, the block carries
/// `placeholder` when one is given and is left empty otherwise.
pub fn existing_content_xml(pieces: &[ContentPiece], placeholder: Option<&str>) -> String {
    let mut xml = String::from("<existing_content>\n");

    if pieces.is_empty() {
        if let Some(placeholder) = placeholder {
            xml.push_str(placeholder);
            xml.push('\n');
        }
    }

    for piece in pieces {
        xml.push_str(&content_piece_xml(piece));
        xml.push('\n');
    }

    xml.push_str("</existing_content>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(format: &str, content: &str) -> ContentPiece {
        ContentPiece {
            format: format.into(),
            content: content.into(),
        }
    }

    #[test]
    fn test_render_fills_known_placeholders() {
        let out = render("Hi {name}, you are {age}.", &[("name", "Ada"), ("age", "36")]);
        assert_eq!(out, "Hi Ada, you are 36.");
    }

    #[test]
    fn test_render_does_not_rescan_inserted_values() {
        let out = render(
            "<a>{first}</a><b>{second}</b>",
            &[("first", "{second}"), ("second", "x")],
        );
        assert_eq!(out, "<a>{second}</a><b>x</b>");
    }

    #[test]
    fn test_render_keeps_unknown_and_unbalanced_braces() {
        let out = render("{unknown} and { open and {name}", &[("name", "v")]);
        assert_eq!(out, "{unknown} and { open and v");
        assert_eq!(render("trailing {", &[]), "trailing {");
    }

    #[test]
    fn test_existing_content_xml_lists_every_piece() {
        let xml = existing_content_xml(
            &[piece("LinkedIn post", "First"), piece("Tweet", "Second")],
            Some(NO_EXISTING_CONTENT),
        );
        assert!(xml.starts_with("<existing_content>\n<content_piece>\n<format>LinkedIn post</format>"));
        assert!(xml.contains("<content>\nSecond\n</content>"));
        assert_eq!(xml.matches("<content_piece>").count(), 2);
        assert!(!xml.contains(NO_EXISTING_CONTENT));
        assert!(xml.ends_with("</existing_content>"));
    }

    #[test]
    fn test_existing_content_xml_placeholder_when_empty() {
        assert_eq!(
            existing_content_xml(&[], Some(NO_EXISTING_CONTENT)),
            "<existing_content>\n[No existing content provided]\n</existing_content>"
        );
        assert_eq!(
            existing_content_xml(&[], None),
            "<existing_content>\n</existing_content>"
        );
    }
}
