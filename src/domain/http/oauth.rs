// OAuth 1.0a request signing (RFC 5849)

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use pkcs8::DecodePrivateKey;
use rsa::{pkcs1v15::SigningKey, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use signature::{SignatureEncoding, Signer};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::authentication::{AuthParam, Authentication};
use crate::error::{Error, Result};

/// How the signature base string is signed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureMethod {
    #[default]
    #[serde(rename = "HMAC-SHA1")]
    HmacSha1,
    #[serde(rename = "HMAC-SHA256")]
    HmacSha256,
    #[serde(rename = "RSA-SHA1")]
    RsaSha1,
    #[serde(rename = "PLAINTEXT")]
    Plaintext,
}

impl SignatureMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureMethod::HmacSha1 => "HMAC-SHA1",
            SignatureMethod::HmacSha256 => "HMAC-SHA256",
            SignatureMethod::RsaSha1 => "RSA-SHA1",
            SignatureMethod::Plaintext => "PLAINTEXT",
        }
    }
}

impl fmt::Display for SignatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client and token credentials plus the protocol parameters sent with them
#[derive(Clone)]
pub struct OAuthCredentials {
    consumer_key: String,
    consumer_secret: String,
    token: Option<String>,
    token_secret: Option<String>,
    method: SignatureMethod,
    /// PKCS#8 PEM, required for RSA-SHA1
    rsa_key_pem: Option<String>,
    realm: Option<String>,
    callback: Option<String>,
    verifier: Option<String>,
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("token", &self.token)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// The parts of an HTTP request covered by the signature
#[derive(Debug, Clone)]
pub struct OAuthRequest {
    method: String,
    url: String,
    /// Decoded `application/x-www-form-urlencoded` body parameters
    form: Vec<(String, String)>,
}

impl OAuthRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            form: Vec::new(),
        }
    }

    pub fn with_form<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.form
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

impl OAuthCredentials {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: None,
            token_secret: None,
            method: SignatureMethod::default(),
            rsa_key_pem: None,
            realm: None,
            callback: None,
            verifier: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, secret: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self.token_secret = Some(secret.into());
        self
    }

    pub fn with_method(mut self, method: SignatureMethod) -> Self {
        self.method = method;
        self
    }

    /// Use RSA-SHA1 with a PKCS#8 PEM private key
    pub fn with_rsa_key(mut self, pem: impl Into<String>) -> Self {
        self.method = SignatureMethod::RsaSha1;
        self.rsa_key_pem = Some(pem.into());
        self
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }

    pub fn with_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.verifier = Some(verifier.into());
        self
    }

    pub fn method(&self) -> SignatureMethod {
        self.method
    }

    /// Build an `Authorization` value with a fresh nonce and the current time
    pub fn authorization(&self, request: &OAuthRequest) -> Result<Authentication> {
        let nonce = Uuid::new_v4().simple().to_string();
        self.authorization_at(request, &nonce, Utc::now().timestamp())
    }

    /// Build an `Authorization` value for a fixed nonce and timestamp
    pub fn authorization_at(
        &self,
        request: &OAuthRequest,
        nonce: &str,
        timestamp: i64,
    ) -> Result<Authentication> {
        let mut protocol = self.protocol_params(nonce, timestamp);

        let mut all = request_params(request)?;
        all.extend(protocol.iter().cloned());
        let base = signature_base_string(&request.method, &request.url, &all)?;
        debug!(method = %self.method, base_string = %base, "signing request");

        protocol.push(("oauth_signature".into(), self.sign(&base)?));
        protocol.sort();

        let mut auth = Authentication::new("OAuth");
        if let Some(realm) = &self.realm {
            auth = auth.with_param(AuthParam::quoted("realm", realm.as_str()));
        }
        for (name, value) in protocol {
            auth = auth.with_param(AuthParam::quoted(name, percent_encode(&value)));
        }
        Ok(auth)
    }

    fn protocol_params(&self, nonce: &str, timestamp: i64) -> Vec<(String, String)> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), self.method.as_str().to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        let optional = [
            ("oauth_token", &self.token),
            ("oauth_callback", &self.callback),
            ("oauth_verifier", &self.verifier),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                params.push((name.to_string(), value.clone()));
            }
        }
        params
    }

    /// Sign a base string with the configured method
    pub fn sign(&self, base_string: &str) -> Result<String> {
        let key = format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(self.token_secret.as_deref().unwrap_or(""))
        );

        match self.method {
            SignatureMethod::HmacSha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
                    .map_err(|e| Error::Signing(e.to_string()))?;
                mac.update(base_string.as_bytes());
                Ok(BASE64.encode(mac.finalize().into_bytes()))
            }
            SignatureMethod::HmacSha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
                    .map_err(|e| Error::Signing(e.to_string()))?;
                mac.update(base_string.as_bytes());
                Ok(BASE64.encode(mac.finalize().into_bytes()))
            }
            SignatureMethod::RsaSha1 => {
                let pem = self
                    .rsa_key_pem
                    .as_deref()
                    .ok_or_else(|| Error::Signing("RSA-SHA1 requires a private key".into()))?;
                let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
                    .map_err(|e| Error::Signing(format!("invalid private key: {}", e)))?;
                let signing_key = SigningKey::<Sha1>::new(private_key);
                let signature = signing_key
                    .try_sign(base_string.as_bytes())
                    .map_err(|e| Error::Signing(e.to_string()))?;
                Ok(BASE64.encode(signature.to_bytes()))
            }
            SignatureMethod::Plaintext => Ok(key),
        }
    }
}

/// Query and form parameters of a request, decoded
fn request_params(request: &OAuthRequest) -> Result<Vec<(String, String)>> {
    let url = Url::parse(&request.url)?;
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.extend(request.form.iter().cloned());
    Ok(params)
}

/// RFC 3986 percent-encoding of everything but the unreserved set
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Scheme and authority lowercased, default ports dropped, no query or fragment
pub fn base_string_uri(url: &str) -> Result<String> {
    let url = Url::parse(url)?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::Signing(format!("URL '{}' has no host", url)))?;
    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    Ok(format!("{}://{}{}{}", url.scheme(), host.to_ascii_lowercase(), port, url.path()))
}

/// Encode, sort by name then value, and join as `name=value&...`
pub fn normalize_parameters(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .filter(|(name, _)| name != "oauth_signature" && name != "realm")
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// `METHOD&encoded-base-uri&encoded-normalized-parameters`
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> Result<String> {
    Ok(format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(&base_string_uri(url)?),
        percent_encode(&normalize_parameters(params))
    ))
}
