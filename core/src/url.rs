//! URL materialization from a template plus path and query parameters.

use crate::params::Params;

/// Drop everything from the first `#` on. Fragments never reach a server.
pub fn strip_fragment(url: &str) -> &str {
    match url.find('#') {
        Some(pos) => &url[..pos],
        None => url,
    }
}

/// Substitute `{key}` placeholders and append the query string.
///
/// Path values are inserted verbatim, with no escaping. Query params are
/// form-urlencoded and joined with `&` when the template already carries a
/// query. A template ending in a bare `?` gets the query with no extra
/// separator, so `/x?` becomes `/x?a=2`.
///
/// Nothing here validates the result; a malformed URL is reported by the
/// transport when the request is sent.
pub fn build_url(template: &str, path_params: &Params, query_params: &Params) -> String {
    let mut url = template.to_string();
    for (key, value) in path_params.iter() {
        url = url.replace(&format!("{{{key}}}"), value);
    }

    if query_params.is_empty() {
        return url;
    }
    // Params serialize as string pairs; this cannot fail.
    let query = serde_urlencoded::to_string(query_params).unwrap_or_default();
    if query.is_empty() {
        return url;
    }

    let separator = match url.split_once('?') {
        Some((_, existing)) if !existing.is_empty() => "&",
        Some(_) => "",
        None => "?",
    };
    url.push_str(separator);
    url.push_str(&query);
    url
}
