//! Upbit request signing
//!
//! Private endpoints take an HS256 JWT in the `Authorization` header. Requests
//! with parameters also carry a SHA-512 hash of the url-encoded query string.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256, Sha512};
use uuid::Uuid;

use crate::{Error, Result};

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;
const QUERY_HASH_ALG: &str = "SHA512";

#[derive(Debug, Serialize)]
struct Claims<'a> {
    access_key: &'a str,
    nonce: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash_alg: Option<&'a str>,
}

/// Url-encode parameters with keys in sorted order
pub fn encode_query(params: &BTreeMap<&str, String>) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

/// Hex SHA-512 digest of a query string
pub fn query_hash(query: &str) -> String {
    hex::encode(Sha512::digest(query.as_bytes()))
}

/// Build a signed token with a fresh nonce
pub fn authorization_token(access_key: &str, secret_key: &str, query: Option<&str>) -> Result<String> {
    let nonce = Uuid::new_v4().to_string();
    sign_token(access_key, secret_key, &nonce, query)
}

/// Build a signed token for a fixed nonce
pub fn sign_token(access_key: &str, secret_key: &str, nonce: &str, query: Option<&str>) -> Result<String> {
    let hash = query.filter(|q| !q.is_empty()).map(query_hash);

    let claims = Claims {
        access_key,
        nonce,
        query_hash: hash.as_deref(),
        query_hash_alg: hash.as_ref().map(|_| QUERY_HASH_ALG),
    };

    let header = URL_SAFE_NO_PAD.encode(JWT_HEADER);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let signing_input = format!("{}.{}", header, payload);

    let mut mac = Hmac::<Sha256>::new_from_slice(secret_key.as_bytes())
        .map_err(|e| Error::Config(format!("invalid secret key: {}", e)))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature))
}
