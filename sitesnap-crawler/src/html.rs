//! Streaming rewrite of page markup for the offline mirror.
//!
//! Same-host references are pointed at their local copies and collected:
//! anchors become page links (BFS candidates), while images, scripts,
//! stylesheets, and `url()` targets inside inline CSS become assets. Markup
//! that is not rewritten is emitted exactly as received.

use std::cell::RefCell;
use std::collections::HashSet;

use lol_html::html_content::ContentType;
use lol_html::{HtmlRewriter, Settings, element, text};

use crate::css::rewrite_css;
use crate::error::{CrawlError, Result};
use crate::local_path::PathMapper;
use crate::url_utils::{normalize, same_host};

/// Output of [`rewrite_html`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewrittenHtml {
    pub html: String,
    /// Same-host anchor targets, first-seen order.
    pub links: Vec<String>,
    /// Same-host asset targets, first-seen order.
    pub assets: Vec<String>,
}

/// Insertion-ordered URL set.
#[derive(Debug, Default)]
struct OrderedUrls {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl OrderedUrls {
    fn push(&mut self, url: String) {
        if self.seen.insert(url.clone()) {
            self.order.push(url);
        }
    }

    fn extend(&mut self, urls: impl IntoIterator<Item = String>) {
        for url in urls {
            self.push(url);
        }
    }
}

/// Rewrite `html` fetched from `base_url`.
pub fn rewrite_html(base_url: &str, html: &str, mapper: &PathMapper) -> Result<RewrittenHtml> {
    let links = RefCell::new(OrderedUrls::default());
    let assets = RefCell::new(OrderedUrls::default());
    let style_buffer = RefCell::new(String::new());

    // Resolve an attribute value; Some only for same-host targets.
    let resolve = |raw: &str| -> Option<String> {
        let decoded = html_escape::decode_html_entities(raw);
        if decoded.trim().is_empty() {
            return None;
        }
        let absolute = normalize(base_url, &decoded);
        same_host(base_url, &absolute).then_some(absolute)
    };

    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("a[href]", |el| {
                    if let Some(href) = el.get_attribute("href")
                        && let Some(absolute) = resolve(&href)
                    {
                        el.set_attribute("href", &mapper.local_path(&absolute))?;
                        links.borrow_mut().push(absolute);
                    }
                    Ok(())
                }),
                element!("img[src]", |el| {
                    if let Some(src) = el.get_attribute("src")
                        && let Some(absolute) = resolve(&src)
                    {
                        el.set_attribute("src", &mapper.local_path(&absolute))?;
                        assets.borrow_mut().push(absolute);
                    }
                    Ok(())
                }),
                element!("script[src]", |el| {
                    if let Some(src) = el.get_attribute("src")
                        && let Some(absolute) = resolve(&src)
                    {
                        el.set_attribute("src", &mapper.local_path(&absolute))?;
                        assets.borrow_mut().push(absolute);
                    }
                    Ok(())
                }),
                element!("link[href]", |el| {
                    let is_stylesheet = el.get_attribute("rel").is_some_and(|rel| {
                        rel.split_ascii_whitespace()
                            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
                    });
                    if is_stylesheet
                        && let Some(href) = el.get_attribute("href")
                        && let Some(absolute) = resolve(&href)
                    {
                        el.set_attribute("href", &mapper.local_path(&absolute))?;
                        assets.borrow_mut().push(absolute);
                    }
                    Ok(())
                }),
                element!("*[style]", |el| {
                    if let Some(style) = el.get_attribute("style") {
                        let decoded = html_escape::decode_html_entities(&style);
                        let (rewritten, found) = rewrite_css(base_url, &decoded, mapper);
                        if !found.is_empty() {
                            el.set_attribute("style", &rewritten)?;
                            assets.borrow_mut().extend(found);
                        }
                    }
                    Ok(())
                }),
                // <style> bodies arrive in chunks; hold them back until the
                // whole text node is known.
                text!("style", |chunk| {
                    style_buffer.borrow_mut().push_str(chunk.as_str());
                    if chunk.last_in_text_node() {
                        let css = std::mem::take(&mut *style_buffer.borrow_mut());
                        let (rewritten, found) = rewrite_css(base_url, &css, mapper);
                        assets.borrow_mut().extend(found);
                        chunk.replace(&rewritten, ContentType::Html);
                    } else {
                        chunk.remove();
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| CrawlError::RewriteError(format!("HTML rewrite error: {}", e)))?;
    rewriter
        .end()
        .map_err(|e| CrawlError::RewriteError(format!("HTML rewrite finalization error: {}", e)))?;

    let html = String::from_utf8(output)
        .map_err(|e| CrawlError::RewriteError(format!("Invalid UTF-8 in rewritten HTML: {}", e)))?;

    Ok(RewrittenHtml {
        html,
        links: links.into_inner().order,
        assets: assets.into_inner().order,
    })
}
