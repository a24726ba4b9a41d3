// Endpoint label normalization
// Maps raw request paths onto a bounded set of `endpoint` label values so
// per-resource URLs do not explode metric cardinality.
//
// obs-instrument maintainers 2026 Oct

/// Label used when no request path is available.
pub const UNKNOWN_ENDPOINT: &str = "unknown";

/// Placeholder substituted for numeric resource ids.
pub const ID_PLACEHOLDER: &str = "{id}";

const WELL_KNOWN: &[&str] = &["/api/hello", "/healthz"];
const ADMIN_PREFIX: &str = "/actuator/";
const API_PREFIX: &str = "/api/";

/// Normalize a request path for use as the `endpoint` label.
///
/// Rules, first match wins:
/// 1. the query string is dropped;
/// 2. well-known paths and anything under `/actuator/` pass through;
/// 3. `/api/<segment>/<digits>` becomes `/api/<segment>/{id}`;
/// 4. anything else passes through unchanged.
///
/// Rule 4 still lets arbitrary paths through. Only the numeric-id shape is
/// collapsed; other dynamic paths stay a cardinality risk.
///
/// ```
/// use obs_instrument::normalize::normalize_endpoint;
///
/// assert_eq!(normalize_endpoint(Some("/api/users/123")), "/api/users/{id}");
/// assert_eq!(normalize_endpoint(Some("/healthz?probe=1")), "/healthz");
/// assert_eq!(normalize_endpoint(None), "unknown");
/// ```
pub fn normalize_endpoint(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return UNKNOWN_ENDPOINT.to_string();
    };
    let path = raw.split_once('?').map_or(raw, |(path, _)| path);

    if WELL_KNOWN.contains(&path) || path.starts_with(ADMIN_PREFIX) {
        return path.to_string();
    }

    if let Some(resource) = numeric_resource(path) {
        return format!("{API_PREFIX}{resource}/{ID_PLACEHOLDER}");
    }

    path.to_string()
}

/// Returns the resource segment when `path` is `/api/<resource>/<digits>`.
fn numeric_resource(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(API_PREFIX)?;
    let (resource, id) = rest.split_once('/')?;
    if resource.is_empty() || !is_numeric(id) {
        return None;
    }
    Some(resource)
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_paths_pass_through() {
        assert_eq!(normalize_endpoint(Some("/api/hello")), "/api/hello");
        assert_eq!(normalize_endpoint(Some("/healthz")), "/healthz");
        assert_eq!(
            normalize_endpoint(Some("/actuator/prometheus")),
            "/actuator/prometheus"
        );
    }

    #[test]
    fn numeric_ids_are_collapsed() {
        assert_eq!(normalize_endpoint(Some("/api/users/123")), "/api/users/{id}");
        assert_eq!(normalize_endpoint(Some("/api/orders/0")), "/api/orders/{id}");
        assert_eq!(
            normalize_endpoint(Some("/api/users/42?expand=true")),
            "/api/users/{id}"
        );
    }

    #[test]
    fn non_numeric_or_deeper_paths_are_untouched() {
        assert_eq!(normalize_endpoint(Some("/api/users/abc")), "/api/users/abc");
        assert_eq!(normalize_endpoint(Some("/api/users/12a")), "/api/users/12a");
        assert_eq!(
            normalize_endpoint(Some("/api/users/123/posts")),
            "/api/users/123/posts"
        );
        assert_eq!(normalize_endpoint(Some("/api//123")), "/api//123");
        assert_eq!(normalize_endpoint(Some("/users/123")), "/users/123");
    }

    #[test]
    fn query_string_is_stripped() {
        assert_eq!(normalize_endpoint(Some("/debug/sleep?ms=50")), "/debug/sleep");
        assert_eq!(normalize_endpoint(Some("/healthz?")), "/healthz");
    }

    #[test]
    fn missing_path_is_unknown() {
        assert_eq!(normalize_endpoint(None), UNKNOWN_ENDPOINT);
    }
}
