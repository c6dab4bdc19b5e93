use actix_web::HttpRequest;
use esim_common::Secret;
use log::trace;

use crate::errors::ServerError;

/// The header carrying the operator credential for admin routes.
pub const ADMIN_TOKEN_HEADER: &str = "esim_admin_token";

/// Headers that gateways put their webhook signature in, in order of preference.
pub const SIGNATURE_HEADERS: [&str; 2] = ["Stripe-Signature", "X-Webhook-Signature"];

/// The operator credential for the admin routes, shared with the handlers as app data.
#[derive(Clone, Debug)]
pub struct AdminToken(pub Secret<String>);

impl AdminToken {
    /// Checks the `esim_admin_token` header against the configured token.
    pub fn authorize(&self, req: &HttpRequest) -> Result<(), ServerError> {
        let expected = self.0.reveal();
        let supplied = req.headers().get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
        if expected.is_empty() || !tokens_match(expected, supplied) {
            trace!("💻️ Admin token missing or incorrect");
            return Err(ServerError::Unauthorized);
        }
        Ok(())
    }
}

/// Compares two tokens in time that depends only on their lengths.
pub fn tokens_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// The first signature header present on the request.
pub fn webhook_signature(req: &HttpRequest) -> Option<&str> {
    SIGNATURE_HEADERS.iter().find_map(|h| req.headers().get(*h).and_then(|v| v.to_str().ok()))
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn token_comparison() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3cret", "s3creT"));
        assert!(!tokens_match("s3cret", "s3cre"));
    }

    #[test]
    fn admin_token_header() {
        let token = AdminToken(Secret::from("letmein"));
        let req = TestRequest::default().insert_header((ADMIN_TOKEN_HEADER, "letmein")).to_http_request();
        assert!(token.authorize(&req).is_ok());
        let req = TestRequest::default().insert_header((ADMIN_TOKEN_HEADER, "nope")).to_http_request();
        assert!(matches!(token.authorize(&req), Err(ServerError::Unauthorized)));
        let req = TestRequest::default().to_http_request();
        assert!(token.authorize(&req).is_err());
        // An unset token never authorizes anything
        let empty = AdminToken(Secret::from(""));
        let req = TestRequest::default().insert_header((ADMIN_TOKEN_HEADER, "")).to_http_request();
        assert!(empty.authorize(&req).is_err());
    }

    #[test]
    fn signature_headers() {
        let req = TestRequest::default().insert_header(("X-Webhook-Signature", "b")).to_http_request();
        assert_eq!(webhook_signature(&req), Some("b"));
        let req = TestRequest::default()
            .insert_header(("X-Webhook-Signature", "b"))
            .insert_header(("Stripe-Signature", "a"))
            .to_http_request();
        assert_eq!(webhook_signature(&req), Some("a"));
        assert_eq!(webhook_signature(&TestRequest::default().to_http_request()), None);
    }
}
