// MAC access authentication (draft-ietf-oauth-v2-http-mac)

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use url::Url;
use uuid::Uuid;

use super::authentication::{AuthParam, Authentication};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacAlgorithm {
    #[serde(rename = "hmac-sha-1")]
    HmacSha1,
    #[serde(rename = "hmac-sha-256")]
    HmacSha256,
}

impl MacAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            MacAlgorithm::HmacSha1 => "hmac-sha-1",
            MacAlgorithm::HmacSha256 => "hmac-sha-256",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "hmac-sha-1" => Some(MacAlgorithm::HmacSha1),
            "hmac-sha-256" => Some(MacAlgorithm::HmacSha256),
            _ => None,
        }
    }

    fn sign(self, key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        let signed = match self {
            MacAlgorithm::HmacSha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(key).map_err(|e| Error::Signing(e.to_string()))?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
            MacAlgorithm::HmacSha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|e| Error::Signing(e.to_string()))?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
        };
        Ok(signed)
    }

    fn verify(self, key: &[u8], message: &[u8], expected: &[u8]) -> Result<bool> {
        let ok = match self {
            MacAlgorithm::HmacSha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(key).map_err(|e| Error::Signing(e.to_string()))?;
                mac.update(message);
                mac.verify_slice(expected).is_ok()
            }
            MacAlgorithm::HmacSha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|e| Error::Signing(e.to_string()))?;
                mac.update(message);
                mac.verify_slice(expected).is_ok()
            }
        };
        Ok(ok)
    }
}

impl fmt::Display for MacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key identifier, shared key and algorithm issued by the server
#[derive(Clone)]
pub struct MacCredentials {
    pub id: String,
    key: String,
    pub algorithm: MacAlgorithm,
}

impl fmt::Debug for MacCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacCredentials")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl MacCredentials {
    pub fn new(id: impl Into<String>, key: impl Into<String>, algorithm: MacAlgorithm) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            algorithm,
        }
    }

    /// Sign a request with a fresh nonce and the current time
    pub fn authorization(&self, method: &str, url: &str) -> Result<Authentication> {
        let nonce = Uuid::new_v4().simple().to_string();
        let auth = self.sign_at(method, url, Utc::now().timestamp(), &nonce, None)?;
        Ok(auth.to_authentication())
    }

    /// Sign a request for fixed timestamp, nonce and extension data
    pub fn sign_at(
        &self,
        method: &str,
        url: &str,
        ts: i64,
        nonce: &str,
        ext: Option<&str>,
    ) -> Result<MacAuth> {
        let normalized = normalized_request_string(ts, nonce, method, url, ext)?;
        let mac = self.algorithm.sign(self.key.as_bytes(), normalized.as_bytes())?;
        Ok(MacAuth {
            id: self.id.clone(),
            ts,
            nonce: nonce.to_string(),
            ext: ext.map(str::to_string),
            mac: BASE64.encode(mac),
        })
    }

    /// Check a received `MAC` authorization against the request it arrived with
    pub fn verify(&self, auth: &MacAuth, method: &str, url: &str) -> Result<bool> {
        if auth.id != self.id {
            return Ok(false);
        }
        let Ok(expected) = BASE64.decode(&auth.mac) else {
            return Ok(false);
        };
        let normalized = normalized_request_string(auth.ts, &auth.nonce, method, url, auth.ext.as_deref())?;
        self.algorithm
            .verify(self.key.as_bytes(), normalized.as_bytes(), &expected)
    }
}

/// The fields of a `MAC` Authorization header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacAuth {
    pub id: String,
    pub ts: i64,
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    pub mac: String,
}

impl MacAuth {
    pub fn to_authentication(&self) -> Authentication {
        let mut auth = Authentication::new("MAC")
            .with_param(AuthParam::quoted("id", self.id.as_str()))
            .with_param(AuthParam::quoted("ts", self.ts.to_string()))
            .with_param(AuthParam::quoted("nonce", self.nonce.as_str()));
        if let Some(ext) = &self.ext {
            auth = auth.with_param(AuthParam::quoted("ext", ext.as_str()));
        }
        auth.with_param(AuthParam::quoted("mac", self.mac.as_str()))
    }

    pub fn from_authentication(auth: &Authentication) -> Result<Self> {
        if !auth.is_scheme("MAC") {
            return Err(Error::header("Authorization", format!("expected MAC scheme, found '{}'", auth.scheme())));
        }
        let required = |name: &str| {
            auth.param(name)
                .map(str::to_string)
                .ok_or_else(|| Error::header("Authorization", format!("MAC credentials missing '{}'", name)))
        };
        let ts = required("ts")?;
        Ok(Self {
            id: required("id")?,
            ts: ts
                .parse()
                .map_err(|_| Error::header("Authorization", format!("invalid MAC timestamp '{}'", ts)))?,
            nonce: required("nonce")?,
            ext: auth.param("ext").map(str::to_string),
            mac: required("mac")?,
        })
    }
}

impl fmt::Display for MacAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_authentication())
    }
}

/// Timestamp, nonce, method, request-uri, host, port and ext, each newline-terminated
pub fn normalized_request_string(
    ts: i64,
    nonce: &str,
    method: &str,
    url: &str,
    ext: Option<&str>,
) -> Result<String> {
    let url = Url::parse(url)?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::Signing(format!("URL '{}' has no host", url)))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| Error::Signing(format!("URL '{}' has no port", url)))?;
    let request_uri = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    Ok(format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
        ts,
        nonce,
        method.to_ascii_uppercase(),
        request_uri,
        host.to_ascii_lowercase(),
        port,
        ext.unwrap_or("")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_request_string() {
        let normalized = normalized_request_string(
            1336363200,
            "dj83hs9s",
            "get",
            "http://example.com/resource/1?b=1&a=2",
            None,
        )
        .unwrap();
        assert_eq!(normalized, "1336363200\ndj83hs9s\nGET\n/resource/1?b=1&a=2\nexample.com\n80\n\n");
    }

    #[test]
    fn test_explicit_port_kept() {
        let normalized = normalized_request_string(1, "n", "POST", "https://Example.COM:8443/x", Some("e")).unwrap();
        assert_eq!(normalized, "1\nn\nPOST\n/x\nexample.com\n8443\ne\n");
    }

    #[test]
    fn test_header_shape() {
        let creds = MacCredentials::new("h480djs93hd8", "489dks293j39", MacAlgorithm::HmacSha1);
        let auth = creds.authorization("GET", "http://example.com/resource/1").unwrap();
        assert!(auth.is_scheme("MAC"));
        assert_eq!(auth.param("id"), Some("h480djs93hd8"));
        assert!(auth.param("ext").is_none());
        let names: Vec<&str> = auth.params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "ts", "nonce", "mac"]);
    }

    #[test]
    fn test_sign_then_verify() {
        let creds = MacCredentials::new("id", "secret", MacAlgorithm::HmacSha256);
        let url = "http://example.com/a?b=c";
        let mac = creds.sign_at("GET", url, 100, "nonce", Some("x")).unwrap();
        assert!(creds.verify(&mac, "GET", url).unwrap());
        assert!(!creds.verify(&mac, "POST", url).unwrap());

        let parsed = MacAuth::from_authentication(&Authentication::parse(&mac.to_string()).unwrap()).unwrap();
        assert_eq!(parsed, mac);
    }

    #[test]
    fn test_from_authentication_requires_fields() {
        let auth = Authentication::parse("MAC id=\"a\", nonce=\"n\", mac=\"m\"").unwrap();
        assert!(MacAuth::from_authentication(&auth).is_err());
        let bearer = Authentication::bearer("t").unwrap();
        assert!(MacAuth::from_authentication(&bearer).is_err());
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(MacAlgorithm::from_name("HMAC-SHA-256"), Some(MacAlgorithm::HmacSha256));
        assert_eq!(MacAlgorithm::from_name("hmac-md5"), None);
    }
}
