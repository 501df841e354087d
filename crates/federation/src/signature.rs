//! HTTP Signature implementation for `ActivityPub`.
//!
//! Implements draft-cavage-http-signatures for signing and verifying
//! `ActivityPub` requests, plus the digest and date-freshness checks that
//! gate inbox processing.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use pkcs8::{DecodePrivateKey, DecodePublicKey};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1v15::{SigningKey, VerifyingKey},
};
use sha2::{Digest, Sha256, Sha512};
use signature::{SignatureEncoding, Signer, Verifier};
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

/// Default tolerance for the `Date` header, in seconds. Applied
/// symmetrically: a date too far in the future is as suspect as a stale
/// one.
pub const DEFAULT_DATE_MAX_AGE_SECS: i64 = 30;

/// HTTP Signature error.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("Signing failed: {0}")]
    SigningFailed(String),
    #[error("Missing header: {0}")]
    MissingHeader(String),
    #[error("Malformed signature header")]
    MalformedHeader,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parsed `Signature` header components.
#[derive(Debug, Clone)]
pub struct SignatureComponents {
    pub key_id: String,
    pub algorithm: String,
    pub headers: Vec<String>,
    pub signature: String,
}

/// HTTP Signature signer for outgoing requests.
pub struct HttpSigner {
    private_key: RsaPrivateKey,
    key_id: String,
}

impl HttpSigner {
    /// Create a new HTTP signer from a PEM-encoded private key.
    pub fn new(private_key_pem: &str, key_id: String) -> Result<Self, SignatureError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| SignatureError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self {
            private_key,
            key_id,
        })
    }

    /// Sign an HTTP request and return the headers to attach.
    ///
    /// The signing string covers `(request-target)`, `host`, `date`, and
    /// `digest` when a body is present, in that order.
    pub fn sign_request(
        &self,
        method: &str,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<HeaderMap, SignatureError> {
        let host = url
            .host_str()
            .ok_or_else(|| SignatureError::InvalidUrl("No host in URL".to_string()))?;
        let query = url.query().map_or(String::new(), |q| format!("?{q}"));
        let request_target = format!("{} {}{query}", method.to_lowercase(), url.path());

        let date = http_date_now();
        let digest = body.map(calculate_digest);

        let mut signed_headers = vec!["(request-target)", "host", "date"];
        if digest.is_some() {
            signed_headers.push("digest");
        }

        let mut signing_parts = Vec::new();
        for header in &signed_headers {
            let value = match *header {
                "(request-target)" => request_target.clone(),
                "host" => host.to_string(),
                "date" => date.clone(),
                "digest" => digest.clone().unwrap_or_default(),
                _ => String::new(),
            };
            signing_parts.push(format!("{header}: {value}"));
        }
        let signing_string = signing_parts.join("\n");

        debug!(signing_string = %signing_string, "Signing string");

        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature_bytes = signing_key
            .try_sign(signing_string.as_bytes())
            .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
        let signature = BASE64.encode(signature_bytes.to_bytes());

        let signature_header = format!(
            "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            signed_headers.join(" "),
            signature
        );

        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "host", host)?;
        insert_header(&mut headers, "date", &date)?;
        if let Some(ref d) = digest {
            insert_header(&mut headers, "digest", d)?;
        }
        insert_header(&mut headers, "signature", &signature_header)?;

        Ok(headers)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), SignatureError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    headers.insert(name, value);
    Ok(())
}

/// Current time formatted as an RFC 7231 HTTP date.
#[must_use]
pub fn http_date_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse the `Signature` header into components.
///
/// Fails with [`SignatureError::MalformedHeader`] when `keyId` or
/// `signature` is absent. `algorithm` defaults to `rsa-sha256` and
/// `headers` to `date`, per draft-cavage.
pub fn parse_signature_header(header: &str) -> Result<SignatureComponents, SignatureError> {
    let mut key_id = None;
    let mut algorithm = None;
    let mut headers_list = None;
    let mut signature = None;

    // Parse key="value" pairs
    for part in header.split(',') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim_matches('"');
            match key.trim() {
                "keyId" => key_id = Some(value.to_string()),
                "algorithm" => algorithm = Some(value.to_string()),
                "headers" => headers_list = Some(value.to_string()),
                "signature" => signature = Some(value.to_string()),
                _ => {}
            }
        }
    }

    Ok(SignatureComponents {
        key_id: key_id.ok_or(SignatureError::MalformedHeader)?,
        algorithm: algorithm.unwrap_or_else(|| "rsa-sha256".to_string()),
        headers: headers_list
            .unwrap_or_else(|| "date".to_string())
            .split(' ')
            .map(String::from)
            .collect(),
        signature: signature.ok_or(SignatureError::MalformedHeader)?,
    })
}

/// Rebuild the exact string the sender claims to have signed, in the
/// sender-declared header order.
///
/// Fails with [`SignatureError::MissingHeader`] when a named non-pseudo
/// header is absent from the request.
pub fn build_signature_string(
    method: &str,
    path: &str,
    headers: &HashMap<String, String>,
    signed_headers: &[String],
) -> Result<String, SignatureError> {
    let mut parts = Vec::new();

    for name in signed_headers {
        let value = if name == "(request-target)" {
            format!("{} {path}", method.to_lowercase())
        } else {
            headers
                .get(&name.to_lowercase())
                .cloned()
                .ok_or_else(|| SignatureError::MissingHeader(name.clone()))?
        };
        parts.push(format!("{name}: {value}"));
    }

    Ok(parts.join("\n"))
}

/// Verify a signature over a signing string.
///
/// Algorithm mapping: `hs2019` and `rsa-sha256` use SHA-256, `rsa-sha512`
/// uses SHA-512, anything unrecognized falls back to SHA-256. Never
/// panics or errors: any cryptographic or parsing failure verifies as
/// `false` so a hostile signature cannot crash the inbox.
#[must_use]
pub fn verify_signature(
    public_key_pem: &str,
    signing_string: &str,
    signature_b64: &str,
    algorithm: &str,
) -> bool {
    let public_key = match RsaPublicKey::from_public_key_pem(public_key_pem) {
        Ok(k) => k,
        Err(e) => {
            warn!(error = %e, "Invalid public key PEM");
            return false;
        }
    };

    let signature_bytes = match BASE64.decode(signature_b64) {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "Signature is not valid base64");
            return false;
        }
    };

    let signature = match rsa::pkcs1v15::Signature::try_from(signature_bytes.as_slice()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Signature bytes are not a valid RSA signature");
            return false;
        }
    };

    let verified = match algorithm {
        "rsa-sha512" => VerifyingKey::<Sha512>::new(public_key)
            .verify(signing_string.as_bytes(), &signature)
            .is_ok(),
        // hs2019, rsa-sha256, and unknown algorithms all land on SHA-256
        _ => VerifyingKey::<Sha256>::new(public_key)
            .verify(signing_string.as_bytes(), &signature)
            .is_ok(),
    };

    if !verified {
        warn!(algorithm = %algorithm, "Signature verification failed");
    }

    verified
}

/// Calculate the `Digest` header value for a body.
#[must_use]
pub fn calculate_digest(body: &[u8]) -> String {
    let hash = Sha256::digest(body);
    format!("SHA-256={}", BASE64.encode(hash))
}

/// Verify that a `Digest` header matches the body. Strict equality.
#[must_use]
pub fn verify_digest(body: &[u8], digest_header: &str) -> bool {
    calculate_digest(body) == digest_header
}

/// Verify that the `Date` header is within `max_age_secs` of now, in
/// either direction (replay protection and clock-skew tolerance are
/// symmetric).
#[must_use]
pub fn verify_date_header(date_header: &str, max_age_secs: i64) -> bool {
    let Some(date) = parse_http_date(date_header) else {
        warn!(date_header = %date_header, "Unparseable Date header");
        return false;
    };

    // Millisecond comparison; whole-second truncation widens the window.
    let skew = Utc::now().signed_duration_since(date);
    if skew.num_milliseconds().abs() > max_age_secs * 1000 {
        warn!(
            date_header = %date_header,
            clock_skew_secs = skew.num_seconds(),
            max_allowed_secs = max_age_secs,
            "Date header outside freshness window"
        );
        return false;
    }

    true
}

/// Parse HTTP Date header formats (RFC 7231 and the legacy forms remote
/// software still emits).
#[must_use]
pub fn parse_http_date(date_str: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = [
        "%a, %d %b %Y %H:%M:%S GMT",  // RFC 7231
        "%A, %d-%b-%y %H:%M:%S GMT",  // RFC 850
        "%a %b %e %H:%M:%S %Y",       // ANSI C asctime()
    ];

    formats.iter().find_map(|format| {
        chrono::NaiveDateTime::parse_from_str(date_str, format)
            .ok()
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use akari_common::generate_rsa_keypair;
    use chrono::Duration;

    #[test]
    fn test_sign_and_verify_round_trip() {
        let keypair = generate_rsa_keypair().unwrap();
        let signer = HttpSigner::new(
            &keypair.private_key_pem,
            "https://example.com/users/test#main-key".to_string(),
        )
        .unwrap();

        let url = Url::parse("https://remote.example/inbox").unwrap();
        let body = br#"{"type":"Create"}"#;

        let headers = signer.sign_request("POST", &url, Some(body)).unwrap();
        let sig_header = headers.get("signature").unwrap().to_str().unwrap();
        let components = parse_signature_header(sig_header).unwrap();

        let mut verify_headers = HashMap::new();
        verify_headers.insert("host".to_string(), "remote.example".to_string());
        verify_headers.insert(
            "date".to_string(),
            headers.get("date").unwrap().to_str().unwrap().to_string(),
        );
        verify_headers.insert(
            "digest".to_string(),
            headers.get("digest").unwrap().to_str().unwrap().to_string(),
        );

        let signing_string =
            build_signature_string("POST", "/inbox", &verify_headers, &components.headers)
                .unwrap();

        assert!(verify_signature(
            &keypair.public_key_pem,
            &signing_string,
            &components.signature,
            &components.algorithm,
        ));

        // A different signing string must not verify.
        assert!(!verify_signature(
            &keypair.public_key_pem,
            "(request-target): post /other",
            &components.signature,
            &components.algorithm,
        ));
    }

    #[test]
    fn test_parse_signature_header() {
        let header = r#"keyId="https://example.com/users/test#main-key",algorithm="rsa-sha256",headers="(request-target) host date digest",signature="abc123==""#;

        let components = parse_signature_header(header).unwrap();

        assert_eq!(components.key_id, "https://example.com/users/test#main-key");
        assert_eq!(components.algorithm, "rsa-sha256");
        assert_eq!(
            components.headers,
            vec!["(request-target)", "host", "date", "digest"]
        );
        assert_eq!(components.signature, "abc123==");
    }

    #[test]
    fn test_parse_signature_header_defaults() {
        let header = r#"keyId="https://example.com/u/a#main-key",signature="xyz""#;
        let components = parse_signature_header(header).unwrap();

        assert_eq!(components.algorithm, "rsa-sha256");
        assert_eq!(components.headers, vec!["date"]);
    }

    #[test]
    fn test_parse_signature_header_missing_key_id() {
        assert!(matches!(
            parse_signature_header(r#"signature="xyz""#),
            Err(SignatureError::MalformedHeader)
        ));
        assert!(matches!(
            parse_signature_header(r#"keyId="https://a/b""#),
            Err(SignatureError::MalformedHeader)
        ));
    }

    #[test]
    fn test_build_signature_string_missing_header() {
        let headers = HashMap::new();
        let result = build_signature_string(
            "POST",
            "/inbox",
            &headers,
            &["(request-target)".to_string(), "date".to_string()],
        );
        assert!(matches!(result, Err(SignatureError::MissingHeader(h)) if h == "date"));
    }

    #[test]
    fn test_digest_integrity() {
        let body = b"hello world";
        let digest = calculate_digest(body);
        assert!(digest.starts_with("SHA-256="));
        assert!(verify_digest(body, &digest));
        assert!(!verify_digest(b"hello worle", &digest));
    }

    #[test]
    fn test_date_freshness_is_symmetric() {
        let fmt = "%a, %d %b %Y %H:%M:%S GMT";
        let now = Utc::now().format(fmt).to_string();
        let stale = (Utc::now() - Duration::seconds(31)).format(fmt).to_string();
        let future = (Utc::now() + Duration::seconds(31)).format(fmt).to_string();

        assert!(verify_date_header(&now, 30));
        assert!(!verify_date_header(&stale, 30));
        assert!(!verify_date_header(&future, 30));
        assert!(!verify_date_header("not a date", 30));
    }

    #[test]
    fn test_parse_http_date_formats() {
        assert!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").is_some());
        assert!(parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT").is_some());
        assert!(parse_http_date("Sun Nov  6 08:49:37 1994").is_some());
        assert!(parse_http_date("yesterday").is_none());
    }
}
