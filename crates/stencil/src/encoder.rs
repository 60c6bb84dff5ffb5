// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

/// Turns values written by a template into output text.
pub trait Encoder: Debug + Send + Sync {
    /// Encodes `raw` for the output format.
    fn encode(&self, raw: &str) -> String;
}

/// Escapes text for HTML element content and attribute values.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlEncoder;

impl Encoder for HtmlEncoder {
    fn encode(&self, raw: &str) -> String {
        let mut encoded = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '&' => encoded.push_str("&amp;"),
                '<' => encoded.push_str("&lt;"),
                '>' => encoded.push_str("&gt;"),
                '"' => encoded.push_str("&quot;"),
                '\'' => encoded.push_str("&#39;"),
                _ => encoded.push(c),
            }
        }
        encoded
    }
}

/// Writes values unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawEncoder;

impl Encoder for RawEncoder {
    fn encode(&self, raw: &str) -> String {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escapes_markup() {
        assert_eq!(HtmlEncoder.encode(r#"<a href="x">Tom & 'Jerry'</a>"#), "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;");
    }

    #[test]
    fn html_leaves_plain_text() {
        assert_eq!(HtmlEncoder.encode("Matt"), "Matt");
    }

    #[test]
    fn raw_is_identity() {
        assert_eq!(RawEncoder.encode("<b>"), "<b>");
    }
}
