//! Page content extraction
//!
//! Strips non-content chrome from fetched HTML and converts the remaining
//! structure to Markdown. The selector cascade picks the most specific
//! content container present; htmd handles the conversion and skips script,
//! style, and navigation tags that survive extraction.

use crate::{Result, TrawlError};
use scraper::{Html, Selector};

/// Content containers tried in priority order before falling back to <body>
const CONTENT_SELECTORS: &[&str] = &["main", "article", "[role=\"main\"]", ".content", "body"];

/// Tags dropped during Markdown conversion
const SKIP_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "iframe", "noscript", "svg", "form",
];

/// Cleaned page content
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// Page title from <title> or the first <h1>
    pub title: Option<String>,
    /// Normalized Markdown body
    pub markdown: String,
}

/// Extracts the readable content of a page as Markdown
///
/// Returns an error when the page yields no content at all (empty body,
/// script-only shells); the caller records that as a failure for the page
/// rather than emitting an empty document.
pub fn extract_content(html: &str, url: &str) -> Result<ExtractedContent> {
    let doc = Html::parse_document(html);

    let title = extract_title(&doc);
    let content_html = content_root(&doc).unwrap_or_else(|| html.to_string());

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIP_TAGS.to_vec())
        .build();

    let markdown = converter
        .convert(&content_html)
        .map_err(|e| TrawlError::Extraction {
            url: url.to_string(),
            message: format!("markdown conversion failed: {}", e),
        })?;

    let markdown = normalize_blank_lines(&markdown);

    if markdown.trim().is_empty() {
        return Err(TrawlError::Extraction {
            url: url.to_string(),
            message: "no readable content".to_string(),
        });
    }

    Ok(ExtractedContent { title, markdown })
}

/// Picks the inner HTML of the best content container
fn content_root(doc: &Html) -> Option<String> {
    for selector_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = doc.select(&selector).next() {
                return Some(element.inner_html());
            }
        }
    }
    None
}

/// Extracts a title from <title>, falling back to the first <h1>
fn extract_title(doc: &Html) -> Option<String> {
    for selector_str in ["title", "h1"] {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = doc.select(&selector).next() {
                let text = element.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// Collapses runs of three or more newlines down to two
fn normalize_blank_lines(markdown: &str) -> String {
    let mut result = String::with_capacity(markdown.len());
    let mut newline_run = 0;

    for c in markdown.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                result.push(c);
            }
        } else {
            newline_run = 0;
            result.push(c);
        }
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_page() {
        let html = r#"<html><head><title>Widgets</title></head><body>
            <main><h1>All About Widgets</h1><p>Widgets are great.</p></main>
        </body></html>"#;

        let content = extract_content(html, "https://example.com/widgets").unwrap();
        assert_eq!(content.title.as_deref(), Some("Widgets"));
        assert!(content.markdown.contains("All About Widgets"));
        assert!(content.markdown.contains("Widgets are great."));
    }

    #[test]
    fn test_navigation_stripped() {
        let html = r#"<html><body>
            <nav><a href="/">Home</a><a href="/about">About</a></nav>
            <main><p>Real content here.</p></main>
            <footer>Copyright 2025</footer>
        </body></html>"#;

        let content = extract_content(html, "https://example.com/").unwrap();
        assert!(content.markdown.contains("Real content here."));
        assert!(!content.markdown.contains("Copyright 2025"));
        assert!(!content.markdown.contains("Home"));
    }

    #[test]
    fn test_scripts_stripped() {
        let html = r#"<html><body><main>
            <p>Visible text.</p>
            <script>var tracking = "evil";</script>
        </main></body></html>"#;

        let content = extract_content(html, "https://example.com/").unwrap();
        assert!(content.markdown.contains("Visible text."));
        assert!(!content.markdown.contains("tracking"));
    }

    #[test]
    fn test_title_falls_back_to_h1() {
        let html = "<html><body><h1>Heading Title</h1><p>Text</p></body></html>";
        let content = extract_content(html, "https://example.com/").unwrap();
        assert_eq!(content.title.as_deref(), Some("Heading Title"));
    }

    #[test]
    fn test_body_fallback_without_main() {
        let html = "<html><body><p>Plain body content.</p></body></html>";
        let content = extract_content(html, "https://example.com/").unwrap();
        assert!(content.markdown.contains("Plain body content."));
    }

    #[test]
    fn test_empty_page_is_error() {
        let html = "<html><body><script>only.scripts()</script></body></html>";
        let result = extract_content(html, "https://example.com/empty");
        assert!(matches!(result, Err(TrawlError::Extraction { .. })));
    }

    #[test]
    fn test_blank_lines_collapsed() {
        assert_eq!(normalize_blank_lines("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize_blank_lines("a\n\nb"), "a\n\nb");
        assert_eq!(normalize_blank_lines("  a  "), "a");
    }
}
