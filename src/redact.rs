use std::borrow::Cow;

const BEARER_PREFIX: &str = "bearer ";
const SECRET_FIELDS: [&str; 4] = ["\"access\"", "\"refresh\"", "\"password\"", "\"token\""];

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let nee = needle.as_bytes();
    if nee.is_empty() {
        return Some(0);
    }
    if nee.len() > hay.len() {
        return None;
    }

    (0..=hay.len() - nee.len()).find(|&i| {
        hay[i..i + nee.len()]
            .iter()
            .zip(nee)
            .all(|(a, b)| a.to_ascii_lowercase() == b.to_ascii_lowercase())
    })
}

fn is_token_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '~' | '+' | '/' | '=')
}

/// Masks the credential following every `Bearer ` occurrence.
pub fn redact_bearer(input: &str) -> Cow<'_, str> {
    if find_ascii_case_insensitive(input, BEARER_PREFIX).is_none() {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(idx) = find_ascii_case_insensitive(rest, BEARER_PREFIX) {
        let end = idx + BEARER_PREFIX.len();
        // Keep the prefix as written.
        out.push_str(&rest[..end]);
        rest = &rest[end..];

        let consumed: usize = rest
            .chars()
            .take_while(|ch| is_token_char(*ch))
            .map(char::len_utf8)
            .sum();
        if consumed > 0 {
            out.push_str("REDACTED");
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Byte offset of the quote ending a JSON string body, skipping `\"`.
fn closing_quote(body: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, byte) in body.bytes().enumerate() {
        match byte {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b'"' => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Masks string values of token and password fields in JSON-ish text, e.g. a
/// response body echoed into an error message.
fn redact_json_field(text: String, field: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(idx) = rest.find(field) {
        let end = idx + field.len();
        out.push_str(&rest[..end]);
        rest = &rest[end..];

        let after_colon = rest.trim_start();
        let Some(value) = after_colon.strip_prefix(':') else {
            continue;
        };
        let value = value.trim_start();
        let Some(body) = value.strip_prefix('"') else {
            continue;
        };
        let Some(close) = closing_quote(body) else {
            continue;
        };

        let skipped = rest.len() - value.len();
        out.push_str(&rest[..skipped]);
        out.push_str("\"REDACTED\"");
        rest = &body[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Applies every redaction rule. Use before logging or surfacing any text
/// that may have touched a request or response.
pub fn redact_secrets(input: &str) -> Cow<'_, str> {
    let mut value = redact_bearer(input).into_owned();
    for field in SECRET_FIELDS {
        if value.contains(field) {
            value = redact_json_field(value, field);
        }
    }

    if value == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(value)
    }
}
