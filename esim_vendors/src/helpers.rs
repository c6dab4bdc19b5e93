use esim_common::Cents;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::VendorApiError;

type HmacSha256 = Hmac<Sha256>;

/// Vendors quote prices as floating point dollars.
pub fn dollars_to_cents(amount: f64) -> Result<Cents, VendorApiError> {
    Cents::try_from(amount).map_err(|e| VendorApiError::JsonError(e.to_string()))
}

/// Percentage of the allowance used, from the remaining and total amounts.
pub fn usage_percentage(remaining: i64, total: i64) -> Option<f64> {
    if total <= 0 || remaining < 0 {
        return None;
    }
    let used = (total - remaining).max(0);
    #[allow(clippy::cast_precision_loss)]
    Some(used as f64 * 100.0 / total as f64)
}

/// Parses a `t=<unix time>,v1=<hex>,v1=<hex>` signature header into the timestamp and the `v1` signatures.
pub fn parse_signature_header(header: &str) -> Option<(i64, Vec<String>)> {
    let mut timestamp = None;
    let mut signatures = vec![];
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = t.parse::<i64>().ok(),
            Some(("v1", s)) => signatures.push(s.to_string()),
            _ => {},
        }
    }
    timestamp.filter(|_| !signatures.is_empty()).map(|t| (t, signatures))
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, VendorApiError> {
    let mac = mac_for(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature against the payload.
pub fn verify_payload(secret: &str, timestamp: i64, payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    mac_for(secret, timestamp, payload).is_ok_and(|mac| mac.verify_slice(&expected).is_ok())
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, VendorApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| VendorApiError::Initialization(format!("Invalid signing key. {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn usage() {
        assert_eq!(usage_percentage(250, 1000), Some(75.0));
        assert_eq!(usage_percentage(0, 1000), Some(100.0));
        assert_eq!(usage_percentage(1200, 1000), Some(0.0));
        assert_eq!(usage_percentage(10, 0), None);
    }

    #[test]
    fn signature_headers() {
        let (t, sigs) = parse_signature_header("t=1700000000,v1=abc,v0=old,v1=def").unwrap();
        assert_eq!(t, 1700000000);
        assert_eq!(sigs, vec!["abc".to_string(), "def".to_string()]);
        assert!(parse_signature_header("v1=abc").is_none());
        assert!(parse_signature_header("t=1700000000").is_none());
        assert!(parse_signature_header("garbage").is_none());
    }

    #[test]
    fn signatures_verify() {
        let payload = br#"{"id":"evt_1"}"#;
        let sig = sign_payload("whsec_test", 1700000000, payload).unwrap();
        assert!(verify_payload("whsec_test", 1700000000, payload, &sig));
        assert!(!verify_payload("whsec_other", 1700000000, payload, &sig));
        assert!(!verify_payload("whsec_test", 1700000001, payload, &sig));
        assert!(!verify_payload("whsec_test", 1700000000, br#"{"id":"evt_2"}"#, &sig));
        assert!(!verify_payload("whsec_test", 1700000000, payload, "not hex"));
    }
}
