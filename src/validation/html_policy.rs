//! Allow-list HTML sanitization for markdown-rendered fields (§4.6).
//!
//! Code blocks (`<pre><code>...</code></pre>`) are stripped of their inner
//! text before the template-injection check runs, so that a legitimate
//! markdown example like ``` `{{ handlebars }}` ``` in a threat description
//! does not trip the injection filter. The remaining HTML is then rewritten
//! through an allow-list tag/attribute policy using `lol_html`.

#[cfg(feature = "html-policy")]
const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "strong", "em", "code", "pre", "ul", "ol", "li", "blockquote", "h1", "h2", "h3",
    "h4", "a", "table", "thead", "tbody", "tr", "th", "td",
];

#[cfg(feature = "html-policy")]
const ALLOWED_ATTRS: &[(&str, &[&str])] = &[("a", &["href", "title"])];

/// Strip the contents of `<pre><code>...</code></pre>` and bare
/// `<code>...</code>` blocks so fenced/inline code examples are exempt from
/// the template-injection scan.
pub fn strip_code_blocks(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    loop {
        let Some(start) = rest.find("<code") else {
            out.push_str(rest);
            break;
        };
        let Some(open_end) = rest[start..].find('>') else {
            out.push_str(rest);
            break;
        };
        let open_end = start + open_end + 1;
        let Some(close_rel) = rest[open_end..].find("</code>") else {
            out.push_str(rest);
            break;
        };
        let close = open_end + close_rel + "</code>".len();
        out.push_str(&rest[..start]);
        rest = &rest[close..];
    }
    out
}

const DANGEROUS_TAGS: &[&str] = &["script", "style", "iframe", "object", "embed", "applet"];

#[cfg(feature = "html-policy")]
pub fn sanitize_html(html: &str) -> Result<String, crate::error::Error> {
    use lol_html::{HtmlRewriter, Settings, element};

    let mut output = Vec::new();

    let strip_disallowed_attrs = element!("*", |el| {
        let tag = el.tag_name();
        let allowed_attrs: &[&str] = ALLOWED_ATTRS
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, attrs)| *attrs)
            .unwrap_or(&[]);

        if DANGEROUS_TAGS.contains(&tag.as_str()) {
            el.remove();
            return Ok(());
        }
        if !ALLOWED_TAGS.contains(&tag.as_str()) {
            // Unknown, non-dangerous tag: drop the wrapper, keep its text.
            el.remove_and_keep_content();
            return Ok(());
        }

        let names: Vec<String> = el.attributes().iter().map(|a| a.name()).collect();
        for name in names {
            if !allowed_attrs.contains(&name.as_str()) {
                el.remove_attribute(&name);
            }
        }
        Ok(())
    });

    {
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![strip_disallowed_attrs],
                ..Settings::new()
            },
            |chunk: &[u8]| output.extend_from_slice(chunk),
        );
        rewriter
            .write(html.as_bytes())
            .map_err(|e| crate::error::Error::server_error(format!("html sanitize: {e}")))?;
        rewriter
            .end()
            .map_err(|e| crate::error::Error::server_error(format!("html sanitize: {e}")))?;
    }

    String::from_utf8(output)
        .map_err(|e| crate::error::Error::server_error(format!("html sanitize utf8: {e}")))
}

#[cfg(not(feature = "html-policy"))]
pub fn sanitize_html(html: &str) -> Result<String, crate::error::Error> {
    Ok(html.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_code_block_contents() {
        let html = "before <code>{{ not really a template }}</code> after";
        let stripped = strip_code_blocks(html);
        assert!(!stripped.contains("{{"));
        assert!(stripped.contains("before"));
        assert!(stripped.contains("after"));
    }

    #[test]
    fn leaves_non_code_html_untouched_by_strip() {
        let html = "<p>hello</p>";
        assert_eq!(strip_code_blocks(html), html);
    }
}
