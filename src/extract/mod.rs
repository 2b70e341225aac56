//! Default page extractor
//!
//! Used by the engine as the fallback extraction stage when no response
//! callbacks are registered: it emits one item per HTML page (url, title,
//! status) and discovers outgoing links for admission.

use crate::engine::Response;
use crate::pipeline::Item;
use scraper::{Html, Selector};
use url::Url;

/// What the default extractor pulled out of one response
#[derive(Debug, Default)]
pub struct ExtractedPage {
    /// One record per page; empty for non-HTML responses
    pub items: Vec<Item>,

    /// Absolute URLs discovered on the page
    pub links: Vec<String>,
}

/// Extracts the page record and outgoing links from a response
///
/// Links come from `a[href]`, resolved against the document's `<base href>`
/// if present, otherwise the response's final URL. Non-HTTP schemes
/// (`javascript:`, `mailto:`, `tel:`, data URIs) and same-page fragments
/// are skipped. Non-HTML responses produce no items and no links.
pub fn extract_page(response: &Response) -> ExtractedPage {
    if !response.is_html() {
        return ExtractedPage::default();
    }

    let html = response.text();
    let document = Html::parse_document(&html);

    let base_url = base_href(&document)
        .and_then(|href| response.final_url.join(&href).ok())
        .unwrap_or_else(|| response.final_url.clone());

    let title = extract_title(&document);
    let links = extract_links(&document, &base_url);

    let mut item = Item::new(response.request.url_str());
    item.depth = response.request.depth;
    item.set("final_url", response.final_url.as_str());
    item.set("status", response.status);
    if let Some(title) = &title {
        item.set("title", title.as_str());
    }
    item.set("link_count", links.len());

    ExtractedPage {
        items: vec![item],
        links,
    }
}

fn base_href(document: &Html) -> Option<String> {
    let selector = Selector::parse("base[href]").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string)
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let lowered = href.to_ascii_lowercase();
        if lowered.starts_with("javascript:")
            || lowered.starts_with("mailto:")
            || lowered.starts_with("tel:")
            || lowered.starts_with("data:")
        {
            continue;
        }

        if let Ok(resolved) = base_url.join(href) {
            if resolved.scheme() == "http" || resolved.scheme() == "https" {
                links.push(resolved.to_string());
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Request;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::time::Duration;

    fn html_response(body: &str, final_url: &str) -> Response {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        Response {
            status: 200,
            headers,
            body: body.as_bytes().to_vec(),
            final_url: Url::parse(final_url).unwrap(),
            fetch_duration: Duration::from_millis(5),
            fetched_at: Utc::now(),
            request: Request::new(final_url).unwrap(),
        }
    }

    #[test]
    fn test_extracts_title_and_links() {
        let body = r#"<html><head><title>Home</title></head><body>
            <a href="/a">A</a>
            <a href="http://other.com/b">B</a>
        </body></html>"#;
        let page = extract_page(&html_response(body, "http://example.com/"));

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].get_str("title"), Some("Home"));
        assert_eq!(
            page.links,
            vec!["http://example.com/a", "http://other.com/b"]
        );
    }

    #[test]
    fn test_relative_links_resolve_against_final_url() {
        let body = r#"<a href="sibling">S</a>"#;
        let page = extract_page(&html_response(body, "http://example.com/dir/page"));
        assert_eq!(page.links, vec!["http://example.com/dir/sibling"]);
    }

    #[test]
    fn test_base_href_overrides_resolution() {
        let body = r#"<head><base href="http://cdn.example.com/assets/"></head>
            <a href="x">X</a>"#;
        let page = extract_page(&html_response(body, "http://example.com/page"));
        assert_eq!(page.links, vec!["http://cdn.example.com/assets/x"]);
    }

    #[test]
    fn test_skips_non_navigable_schemes() {
        let body = r##"
            <a href="javascript:void(0)">js</a>
            <a href="mailto:a@b.c">mail</a>
            <a href="tel:+123">tel</a>
            <a href="data:text/plain,hi">data</a>
            <a href="#frag">frag</a>
            <a href="/real">real</a>"##;
        let page = extract_page(&html_response(body, "http://example.com/"));
        assert_eq!(page.links, vec!["http://example.com/real"]);
    }

    #[test]
    fn test_non_html_produces_nothing() {
        let mut response = html_response("%PDF", "http://example.com/doc.pdf");
        response
            .headers
            .insert("content-type".to_string(), "application/pdf".to_string());
        let page = extract_page(&response);
        assert!(page.items.is_empty());
        assert!(page.links.is_empty());
    }

    #[test]
    fn test_page_without_title() {
        let page = extract_page(&html_response("<body>plain</body>", "http://example.com/"));
        assert_eq!(page.items.len(), 1);
        assert!(page.items[0].get_str("title").is_none());
        assert_eq!(page.items[0].get_str("final_url"), Some("http://example.com/"));
    }
}
