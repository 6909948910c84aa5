//! Multipart header helpers.
//!
//! The engine never parses multipart bodies; it relays them byte-for-byte
//! and only reads the boundary for its logs. The filename helpers are for
//! hook authors that synthesize or inspect multipart parts: they encode and
//! recover non-ASCII filenames in `Content-Disposition` (RFC 6266 with
//! RFC 8187 extended parameters, `filename*=UTF-8''...`).

use std::borrow::Cow;

/// Split a `Content-Disposition` value into `key=value` parameters,
/// honouring quoted strings.
fn parameters(value: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in value.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ';' if !in_quotes => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);

    for segment in segments.iter().skip(1) {
        if let Some((key, raw)) = segment.split_once('=') {
            out.push((key.trim().to_ascii_lowercase(), unquote(raw.trim())));
        }
    }
    out
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// True for any `multipart/*` media type.
pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim()
        .parse::<mime::Mime>()
        .is_ok_and(|media| media.type_() == mime::MULTIPART)
}

/// The boundary parameter of a multipart content type.
pub fn boundary(content_type: &str) -> Option<String> {
    let media = content_type.trim().parse::<mime::Mime>().ok()?;
    if media.type_() != mime::MULTIPART {
        return None;
    }
    media
        .get_param(mime::BOUNDARY)
        .map(|value| value.as_str().to_string())
        .filter(|value| !value.is_empty())
}

/// `Content-Disposition` value for a form-data file part.
///
/// ASCII filenames are emitted as a plain quoted `filename`. Anything else
/// also gets an RFC 8187 `filename*` parameter, with an ASCII fallback in
/// `filename` for receivers that ignore extended parameters.
pub fn form_data_disposition(field: &str, filename: &str) -> String {
    let plain = filename.is_ascii() && !filename.contains(['"', '\\', '\r', '\n']);
    if plain {
        return format!("form-data; name=\"{field}\"; filename=\"{filename}\"");
    }

    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !matches!(c, '"' | '\\' | '\r' | '\n') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "form-data; name=\"{field}\"; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

/// Recover the filename from a `Content-Disposition` value.
///
/// `filename*` wins over `filename` when both are present.
pub fn filename(disposition: &str) -> Option<String> {
    let params = parameters(disposition);

    if let Some((_, extended)) = params.iter().find(|(key, _)| key == "filename*") {
        if let Some(decoded) = decode_extended(extended) {
            return Some(decoded);
        }
    }

    params
        .into_iter()
        .find(|(key, _)| key == "filename")
        .map(|(_, value)| value)
}

/// Decode an RFC 8187 `charset'language'value` string.
fn decode_extended(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;

    if charset.eq_ignore_ascii_case("utf-8") {
        urlencoding::decode(encoded).ok().map(Cow::into_owned)
    } else if charset.eq_ignore_ascii_case("iso-8859-1") {
        let bytes = urlencoding::decode_binary(encoded.as_bytes());
        Some(bytes.iter().map(|&b| char::from(b)).collect())
    } else {
        None
    }
}
