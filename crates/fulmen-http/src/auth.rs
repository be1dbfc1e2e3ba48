//! Authentication hook for admin endpoints. Replaceable by design — the
//! bearer-token impl is a sane default, not the only option.

/// Minimal request metadata handlers need to authenticate and rate-limit.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub authorization_header: Option<String>,
    pub client_id: Option<String>,
}

pub trait AuthHook: Send + Sync {
    fn authenticate(&self, req: &RequestMeta) -> bool;
}

/// Accepts `Authorization: Bearer <token>` matching a configured set of
/// tokens, compared in constant time to avoid a timing side-channel.
pub struct BearerTokenAuth {
    tokens: Vec<String>,
}

impl BearerTokenAuth {
    #[must_use]
    pub fn new(tokens: Vec<String>) -> Self {
        BearerTokenAuth { tokens }
    }

    fn constant_time_eq(a: &str, b: &str) -> bool {
        if a.len() != b.len() {
            return false;
        }
        a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl AuthHook for BearerTokenAuth {
    fn authenticate(&self, req: &RequestMeta) -> bool {
        let Some(header) = &req.authorization_header else { return false };
        let Some(token) = header.strip_prefix("Bearer ") else { return false };
        self.tokens.iter().any(|expected| Self::constant_time_eq(expected, token))
    }
}

/// Always authenticates; useful for local/dev admin endpoints.
pub struct NoAuth;

impl AuthHook for NoAuth {
    fn authenticate(&self, _req: &RequestMeta) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_matches_configured_token() {
        let auth = BearerTokenAuth::new(vec!["secret123".to_string()]);
        let req = RequestMeta { authorization_header: Some("Bearer secret123".to_string()), client_id: None };
        assert!(auth.authenticate(&req));
    }

    #[test]
    fn bearer_token_rejects_wrong_token() {
        let auth = BearerTokenAuth::new(vec!["secret123".to_string()]);
        let req = RequestMeta { authorization_header: Some("Bearer wrong".to_string()), client_id: None };
        assert!(!auth.authenticate(&req));
    }

    #[test]
    fn missing_header_rejected() {
        let auth = BearerTokenAuth::new(vec!["secret123".to_string()]);
        assert!(!auth.authenticate(&RequestMeta::default()));
    }
}
