//! Route normalization: converts observed URL paths to low-cardinality
//! templates before they're attached as metric labels (spec §4.6).
//!
//! Each matcher is a small `LazyLock<Regex>` static, grounded on the
//! teacher's `META_PATTERNS` idiom in `xchecker-validation` — a precedence
//! list of compiled patterns tried in order, first match wins.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static STATIC_ALLOWLIST: &[&str] = &[
    "api", "users", "posts", "orders", "v1", "v2", "health", "settings", "items", "products",
];

static UUID_V4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$").unwrap()
});
static OBJECT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^[0-9a-f]{24}$").unwrap());
static ALL_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)+$").unwrap());
static BASE64_BLOB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Za-z0-9+/]{16,}={0,2}|[A-Za-z0-9_-]{16,})$").unwrap());
static NANOID_CUID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{20,30}$").unwrap());
static SHORT_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?=.*[a-zA-Z])(?=.*[0-9])[a-zA-Z0-9]{3,12}$").unwrap());

/// Per-segment, per-preceding-segment overrides for how a numeric or
/// otherwise ambiguous segment is named.
fn context_aware_name(preceding: Option<&str>, fallback: &str) -> String {
    match preceding.map(str::to_lowercase).as_deref() {
        Some("users") => ":userId".to_string(),
        Some("posts") => ":postId".to_string(),
        Some("orders") => ":orderId".to_string(),
        Some("items") | Some("products") => ":itemId".to_string(),
        _ => fallback.to_string(),
    }
}

/// Explicit overrides passed by the caller for [`normalize_route`].
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Bypasses detection entirely; used verbatim.
    pub template: Option<String>,
    /// `segment_index -> replacement name`, applied after detection.
    pub segment_replacements: HashMap<usize, String>,
}

fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn classify_segment(segment: &str, preceding: Option<&str>) -> String {
    if segment.starts_with(':') || segment == "*" {
        return segment.to_string();
    }
    let lower = segment.to_lowercase();
    if STATIC_ALLOWLIST.contains(&lower.as_str()) {
        return segment.to_string();
    }
    if UUID_V4.is_match(segment) {
        return ":id".to_string();
    }
    if OBJECT_ID.is_match(segment) {
        return ":id".to_string();
    }
    if ALL_DIGITS.is_match(segment) {
        return context_aware_name(preceding, ":id");
    }
    if SLUG.is_match(segment) {
        return ":slug".to_string();
    }
    if BASE64_BLOB.is_match(segment) && segment.len() >= 16 {
        return ":token".to_string();
    }
    if NANOID_CUID.is_match(segment) {
        return ":id".to_string();
    }
    if SHORT_ALNUM.is_match(segment) {
        return context_aware_name(preceding, ":id");
    }
    segment.to_string()
}

/// Converts `path` to a low-cardinality template. Strips query/fragment
/// first, percent-decodes each segment (canonical per the spec's resolved
/// Open Question (d)), then classifies each segment static-vs-dynamic.
#[must_use]
pub fn normalize_route(path: &str, opts: Option<&NormalizeOptions>) -> String {
    if let Some(opts) = opts {
        if let Some(template) = &opts.template {
            return template.clone();
        }
    }
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let segments: Vec<&str> = path.split('/').collect();
    let mut normalized = Vec::with_capacity(segments.len());
    let mut preceding: Option<String> = None;
    for (idx, raw) in segments.iter().enumerate() {
        if raw.is_empty() {
            normalized.push(String::new());
            continue;
        }
        let decoded = percent_decode(raw);
        let mut classified = classify_segment(&decoded, preceding.as_deref());
        if let Some(opts) = opts {
            if let Some(replacement) = opts.segment_replacements.get(&idx) {
                classified = replacement.clone();
            }
        }
        preceding = Some(decoded);
        normalized.push(classified);
    }
    normalized.join("/")
}

/// `true` if any segment still looks dynamic but isn't a placeholder yet.
#[must_use]
pub fn has_cardinality_risk(route: &str) -> bool {
    route.split('/').any(|segment| {
        if segment.is_empty() || segment.starts_with(':') || segment == "*" {
            return false;
        }
        let lower = segment.to_lowercase();
        if STATIC_ALLOWLIST.contains(&lower.as_str()) {
            return false;
        }
        UUID_V4.is_match(segment)
            || OBJECT_ID.is_match(segment)
            || ALL_DIGITS.is_match(segment)
            || SLUG.is_match(segment)
            || (BASE64_BLOB.is_match(segment) && segment.len() >= 16)
            || NANOID_CUID.is_match(segment)
            || SHORT_ALNUM.is_match(segment)
    })
}

/// A coarse product estimate of the number of distinct concrete routes a
/// template could represent, used for alerting rather than precision.
#[must_use]
pub fn estimate_cardinality(route: &str) -> u64 {
    const ASSUMED_DISTINCT_VALUES_PER_PLACEHOLDER: u64 = 1000;
    route
        .split('/')
        .filter(|s| s.starts_with(':'))
        .fold(1u64, |acc, _| acc.saturating_mul(ASSUMED_DISTINCT_VALUES_PER_PLACEHOLDER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segment_after_users_becomes_user_id() {
        assert_eq!(normalize_route("/users/123", None), "/users/:userId");
    }

    #[test]
    fn slug_segment_detected() {
        assert_eq!(normalize_route("/posts/my-article-title", None), "/posts/:slug");
    }

    #[test]
    fn allowlisted_static_segment_preserved() {
        assert_eq!(normalize_route("/users/settings", None), "/users/settings");
    }

    #[test]
    fn uuid_v4_segment_becomes_id() {
        assert_eq!(normalize_route("/orders/550e8400-e29b-41d4-a716-446655440000", None), "/orders/:id");
    }

    #[test]
    fn already_normalized_route_is_idempotent() {
        let once = normalize_route("/users/123", None);
        let twice = normalize_route(&once, None);
        assert_eq!(once, twice);
        assert!(!has_cardinality_risk(&once));
    }

    #[test]
    fn explicit_template_bypasses_detection() {
        let opts = NormalizeOptions { template: Some("/custom/:thing".to_string()), ..Default::default() };
        assert_eq!(normalize_route("/users/123", Some(&opts)), "/custom/:thing");
    }

    #[test]
    fn segment_replacement_overrides_detection() {
        let mut replacements = HashMap::new();
        replacements.insert(1, ":special".to_string());
        let opts = NormalizeOptions { template: None, segment_replacements: replacements };
        assert_eq!(normalize_route("/users/123", Some(&opts)), "/users/:special");
    }

    #[test]
    fn percent_encoded_segment_decoded_before_classification() {
        assert_eq!(normalize_route("/users/my%20name", None), "/users/my name");
    }

    #[test]
    fn estimate_cardinality_grows_with_placeholder_count() {
        assert_eq!(estimate_cardinality("/users/:userId"), 1000);
        assert_eq!(estimate_cardinality("/users/:userId/orders/:orderId"), 1_000_000);
        assert_eq!(estimate_cardinality("/health"), 1);
    }

    proptest::proptest! {
        // For all routes r with only well-formed segments,
        // normalizeRoute(r) is idempotent; and
        // hasCardinalityRisk(normalizeRoute(r)) == false.
        #[test]
        fn normalize_route_is_idempotent_and_drops_cardinality_risk(
            segments in proptest::collection::vec("[a-zA-Z0-9_-]{1,12}", 1..5)
        ) {
            let path = format!("/{}", segments.join("/"));
            let once = normalize_route(&path, None);
            let twice = normalize_route(&once, None);
            proptest::prop_assert_eq!(&once, &twice);
            proptest::prop_assert!(!has_cardinality_risk(&once));
        }
    }
}
