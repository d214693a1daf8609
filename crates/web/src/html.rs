//! Encoding of file names for display and the common page shell.

use std::borrow::Cow;

/// Encodes `text` for use in HTML text and attribute values.
///
/// Non-ASCII characters become numeric entities, so a name survives a round trip
/// through any form charset the browser picks: browsers submit characters they can't
/// encode as `&#NNN;`, and the form decoder turns those back into UTF-8.
pub fn encode_html(text: &str) -> Cow<'_, str> {
    let needs_encoding = |c: char| !c.is_ascii() || matches!(c, '<' | '>' | '&' | '"');
    if !text.contains(needs_encoding) {
        return Cow::Borrowed(text);
    }

    let mut encoded = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        if needs_encoding(c) {
            encoded.push_str(&format!("&#{};", u32::from(c)));
        } else {
            encoded.push(c);
        }
    }
    Cow::Owned(encoded)
}

/// Percent-encodes a decoded URL path segment by segment, keeping the `/` separators.
pub fn encode_href(url_path: &str) -> String {
    url_path.split('/').map(urlencoding::encode).collect::<Vec<_>>().join("/")
}

/// Wraps a page body in a complete document.
pub fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\r\n<HTML><HEAD>\r\n<META CHARSET=\"utf-8\">\r\n\
         <META NAME=\"viewport\" CONTENT=\"width=device-width, initial-scale=1\">\r\n\
         <TITLE>{}</TITLE>\r\n</HEAD><BODY>\r\n{body}</BODY></HTML>\r\n",
        encode_html(title)
    )
}

/// The form every action page posts back to the directory it was requested for.
pub fn form_open() -> &'static str {
    "<FORM METHOD=\"post\" ENCTYPE=\"multipart/form-data\">\r\n"
}

pub fn submit_button(name: &str, label: &str) -> String {
    format!("<BUTTON TYPE=\"submit\" VALUE=\"{name}\" NAME=\"{name}\">{label}</BUTTON>\n")
}

/// A hidden input that resubmits `name` as a selected item.
pub fn hidden_checked(name: &str) -> String {
    format!(
        "<INPUT TYPE=\"hidden\" NAME=\"{}\" VALUE=\"{}\">\r\n",
        encode_html(name),
        webphone_http::protocol::CHECKED
    )
}
