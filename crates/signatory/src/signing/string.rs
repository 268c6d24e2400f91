use axum::http::HeaderMap;

use crate::error::SignatureError;

/// Pseudo-header carrying the lowercased method and the request path.
pub const REQUEST_TARGET: &str = "(request-target)";

pub fn request_target(method: &str, path: &str) -> String {
    format!("{} {}", method.to_ascii_lowercase(), path)
}

/// Builds the exact string that gets signed, shared by the signing and the
/// verifying side.
///
/// `header_names` is the order advertised in the `headers` parameter. The
/// `(request-target)` line goes where it is declared, or first when the
/// sender did not declare it. `host` always comes from the caller, never from
/// `lookup`. Any header resolving to an empty value is an error.
pub fn build_signing_string<S, F>(
    method: &str,
    path: &str,
    host: &str,
    header_names: &[S],
    lookup: F,
) -> Result<String, SignatureError>
where
    S: AsRef<str>,
    F: Fn(&str) -> Option<String>,
{
    let mut lines = Vec::with_capacity(header_names.len() + 1);

    let declares_target = header_names
        .iter()
        .any(|name| name.as_ref().eq_ignore_ascii_case(REQUEST_TARGET));
    if !declares_target {
        lines.push(format!("{REQUEST_TARGET}: {}", request_target(method, path)));
    }

    for name in header_names {
        let name = name.as_ref().trim().to_ascii_lowercase();
        let value = match name.as_str() {
            REQUEST_TARGET => request_target(method, path),
            "host" => host.to_string(),
            _ => lookup(&name).unwrap_or_default(),
        };
        if value.trim().is_empty() {
            return Err(SignatureError::EmptyHeader(name));
        }
        lines.push(format!("{name}: {value}"));
    }

    Ok(lines.join("\n"))
}

/// Value of `name` in `headers`, repeated headers joined with `", "`.
///
/// Values that are not valid visible ASCII count as absent.
pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let values = headers
        .get_all(name)
        .iter()
        .map(|value| value.to_str().map(str::trim))
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    if values.is_empty() {
        return None;
    }
    Some(values.join(", "))
}
