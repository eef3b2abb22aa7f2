//! Plain text and subject extraction from rendered HTML

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TITLE_REGEX: Regex = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
    static ref INVISIBLE_REGEX: Regex =
        Regex::new(r"(?is)<(head|style|script)\b[^>]*>.*?</(head|style|script)>").unwrap();
    static ref BREAK_REGEX: Regex =
        Regex::new(r"(?i)<br\s*/?>|</(p|div|tr|h[1-6]|li|table|ul|ol)>").unwrap();
    static ref LIST_ITEM_REGEX: Regex = Regex::new(r"(?i)<li[^>]*>").unwrap();
    static ref CELL_REGEX: Regex = Regex::new(r"(?i)</td>").unwrap();
    static ref TAG_REGEX: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref BLANK_LINES_REGEX: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// The decoded text of the first `<title>`, if any
pub(super) fn extract_title(html: &str) -> Option<String> {
    let title = TITLE_REGEX.captures(html)?.get(1)?.as_str();
    let title = decode_entities(title.split_whitespace().collect::<Vec<_>>().join(" ").as_str());

    (!title.is_empty()).then_some(title)
}

/// Strips markup, keeping line structure for block elements
pub(super) fn html_to_text(html: &str) -> String {
    let text = INVISIBLE_REGEX.replace_all(html, "");
    let text = LIST_ITEM_REGEX.replace_all(&text, "- ");
    let text = CELL_REGEX.replace_all(&text, " ");
    let text = BREAK_REGEX.replace_all(&text, "\n");
    let text = TAG_REGEX.replace_all(&text, "");
    let text = decode_entities(&text);

    let lines = text
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_LINES_REGEX
        .replace_all(&lines, "\n\n")
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&#x3D;", "=")
        .replace("&#x60;", "`")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title_decodes_entities() {
        let html = "<html><head><title>\n  Quote #7 - Smith &amp; Sons\n</title></head></html>";

        assert_eq!(extract_title(html), Some("Quote #7 - Smith & Sons".to_string()));
    }

    #[test]
    fn test_missing_or_empty_title() {
        assert_eq!(extract_title("<p>no title</p>"), None);
        assert_eq!(extract_title("<title>  </title>"), None);
    }

    #[test]
    fn test_html_to_text_keeps_structure() {
        let html = concat!(
            "<html><head><title>T</title><style>p { color: red; }</style></head>",
            "<body><h1>Hello</h1><p>Line one<br/>Line   two</p>",
            "<ul><li>First</li><li>Second</li></ul>",
            "<p>Tom &amp; Jerry</p></body></html>",
        );

        assert_eq!(
            html_to_text(html),
            "Hello\nLine one\nLine two\n- First\n- Second\n\nTom & Jerry"
        );
    }
}
