//! Extraction of structured output from LLM responses.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::models::content::ParsedContentPiece;

static FINAL_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<final_title>(.*?)</final_title>").expect("valid regex"));

static CONTENT_PIECE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<content_piece>(.*?)</content_piece>").expect("valid regex"));

static IDEA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<idea>(.*?)</idea>").expect("valid regex"));

static CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<content>(.*?)</content>").expect("valid regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseParsingError {
    #[error("LLM response did not contain a <{tag}> block")]
    MissingTag { tag: &'static str },
}

/// Returns the trimmed text of the first `<final_title>` span.
pub fn extract_title(response: &str) -> Result<String, ResponseParsingError> {
    FINAL_TITLE_RE
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or(ResponseParsingError::MissingTag { tag: "final_title" })
}

/// Recovers every well-formed `<content_piece>` block.
///
/// Blocks missing an `<idea>` or a `<content>` are dropped, so the result
/// may hold fewer pieces than were requested, or none.
pub fn extract_content_pieces(response: &str) -> Vec<ParsedContentPiece> {
    CONTENT_PIECE_RE
        .captures_iter(response)
        .filter_map(|caps| {
            let block = caps.get(1)?.as_str().trim();
            let idea = IDEA_RE.captures(block)?.get(1)?.as_str().trim();
            let content = CONTENT_RE.captures(block)?.get(1)?.as_str().trim();
            Some(ParsedContentPiece {
                idea: idea.to_string(),
                content: content.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(idea: &str, content: &str) -> String {
        format!("<content_piece>\n<idea>\n{idea}\n</idea>\n<content>\n{content}\n</content>\n</content_piece>")
    }

    #[test]
    fn test_extract_title_trims_span() {
        let response = "<title_creation_process>\nthinking...\n</title_creation_process>\n\n\
                        <final_title>\n  Async Standups Save Mornings \n</final_title>";
        assert_eq!(extract_title(response).unwrap(), "Async Standups Save Mornings");
    }

    #[test]
    fn test_extract_title_keeps_inner_whitespace() {
        let response = "<final_title>\n Async\n  Standups \n</final_title>";
        assert_eq!(extract_title(response).unwrap(), "Async\n  Standups");
    }

    #[test]
    fn test_extract_title_takes_first_span() {
        let response = "<final_title>First</final_title><final_title>Second</final_title>";
        assert_eq!(extract_title(response).unwrap(), "First");
    }

    #[test]
    fn test_extract_title_missing_is_error() {
        assert_eq!(
            extract_title("Here is your title: Async Standups"),
            Err(ResponseParsingError::MissingTag { tag: "final_title" })
        );
        assert!(extract_title("<final_title>unterminated").is_err());
    }

    #[test]
    fn test_extract_content_pieces_all_valid() {
        let response = format!(
            "<new_content>\n{}\n{}\n{}\n</new_content>",
            block("Idea one", "Body one"),
            block("Idea two", "Body two\nwith a second line"),
            block("Idea three", "Body three"),
        );
        let pieces = extract_content_pieces(&response);

        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].idea, "Idea one");
        assert_eq!(pieces[1].content, "Body two\nwith a second line");
        assert_eq!(pieces[2].idea, "Idea three");
    }

    #[test]
    fn test_extract_content_pieces_drops_malformed_blocks() {
        let response = format!(
            "<new_content>{}<content_piece><idea>No body here</idea></content_piece>{}\
             <content_piece><content>No idea here</content></content_piece></new_content>",
            block("Good one", "Body"),
            block("Good two", "Body"),
        );
        let pieces = extract_content_pieces(&response);

        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].idea, "Good one");
        assert_eq!(pieces[1].idea, "Good two");
    }

    #[test]
    fn test_extract_content_pieces_is_non_greedy_across_blocks() {
        let response = "<content_piece><idea>A</idea><content>1</content></content_piece>\
                        junk between blocks\
                        <content_piece><idea>B</idea><content>2</content></content_piece>";
        let pieces = extract_content_pieces(response);
        assert_eq!(
            pieces,
            vec![
                ParsedContentPiece {
                    idea: "A".into(),
                    content: "1".into()
                },
                ParsedContentPiece {
                    idea: "B".into(),
                    content: "2".into()
                },
            ]
        );
    }

    #[test]
    fn test_extract_content_pieces_unterminated_block_is_dropped() {
        let response = format!(
            "{}<content_piece><idea>Cut off</idea><content>mid-sent",
            block("Whole", "Body")
        );
        let pieces = extract_content_pieces(&response);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].idea, "Whole");
    }

    #[test]
    fn test_extract_content_pieces_empty_or_unstructured() {
        assert!(extract_content_pieces("").is_empty());
        assert!(extract_content_pieces("I'm sorry, I can't help with that.").is_empty());
    }
}
