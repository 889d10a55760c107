// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OIDC token verification for Eventarc, Cloud Tasks and admin callers.
//!
//! Every push from Google infrastructure to this service carries an ID token
//! minted for a service account with the service URL as audience. This
//! module checks the token itself; which emails may call which route is
//! decided by the middleware.

use crate::config::Config;
use anyhow::Context;
use axum::http::HeaderValue;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const FALLBACK_KEY_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Caller identity extracted from a valid OIDC token.
#[derive(Debug, Clone)]
pub struct VerifiedPrincipal {
    pub email: String,
    pub subject: String,
}

/// OIDC verification error categories.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OidcError {
    /// Token missing, malformed, or not addressed to us.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Key fetch failed; the caller may retry.
    #[error("transient: {0}")]
    Transient(String),
}

enum KeySource {
    /// Fetch Google's signing keys over HTTP and cache them.
    Google { http_client: reqwest::Client },
    /// A single fixed key, for tests.
    Static {
        kid: String,
        key: Arc<DecodingKey>,
    },
}

struct CachedKeys {
    by_kid: HashMap<String, Arc<DecodingKey>>,
    fetched_at: Instant,
    ttl: Duration,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }
}

/// Verifier for Google-issued OIDC ID tokens addressed to this service.
pub struct GoogleOidcVerifier {
    audience: String,
    source: KeySource,
    keys: RwLock<Option<CachedKeys>>,
    fetch_lock: Mutex<()>,
}

impl GoogleOidcVerifier {
    /// Create a production verifier backed by Google's published keys.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building OIDC HTTP client")?;

        let verifier = Self::with_source(config, KeySource::Google { http_client });
        tracing::info!(audience = %verifier.audience, "Initialized OIDC verifier");
        Ok(verifier)
    }

    /// Create a verifier that trusts a single RSA public key.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static OIDC kid must not be empty");
        }

        Ok(Self::with_source(
            config,
            KeySource::Static {
                kid,
                key: Arc::new(key),
            },
        ))
    }

    fn with_source(config: &Config, source: KeySource) -> Self {
        Self {
            audience: config.service_url.trim_end_matches('/').to_string(),
            source,
            keys: RwLock::new(None),
            fetch_lock: Mutex::new(()),
        }
    }

    /// Verify the bearer token in an `Authorization` header.
    pub async fn verify_token(
        &self,
        auth_header: Option<&HeaderValue>,
    ) -> Result<VerifiedPrincipal, OidcError> {
        let token = extract_bearer_token(auth_header)?;

        let header = decode_header(token)
            .map_err(|e| OidcError::Forbidden(format!("invalid JWT header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(OidcError::Forbidden(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| OidcError::Forbidden("missing JWT kid".to_string()))?;

        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.audience.as_str()]);
        validation.validate_nbf = true;
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<IdTokenClaims>(token, &key, &validation)
            .map_err(|e| OidcError::Forbidden(format!("JWT validation failed: {e}")))?
            .claims;

        check_issued_at(claims.iat)?;

        let email = claims
            .email
            .ok_or_else(|| OidcError::Forbidden("missing email claim".to_string()))?;
        if claims.email_verified != Some(true) {
            return Err(OidcError::Forbidden(format!(
                "email not verified for {email}"
            )));
        }

        tracing::debug!(email = %email, subject = %claims.sub, "OIDC token verified");

        Ok(VerifiedPrincipal {
            email,
            subject: claims.sub,
        })
    }

    async fn key_for(&self, kid: &str) -> Result<Arc<DecodingKey>, OidcError> {
        let http_client = match &self.source {
            KeySource::Static { kid: known, key } if known == kid => return Ok(key.clone()),
            KeySource::Static { .. } => {
                return Err(OidcError::Forbidden(format!("unknown JWT kid: {kid}")));
            }
            KeySource::Google { http_client } => http_client,
        };

        if let Some(key) = self.cached_key(kid, false).await {
            return Ok(key);
        }

        // Keys rotate; an unknown kid forces one refetch even if the cache is fresh.
        let _guard = self.fetch_lock.lock().await;
        if let Some(key) = self.cached_key(kid, false).await {
            return Ok(key);
        }
        let fetched = fetch_google_keys(http_client).await?;
        *self.keys.write().await = Some(fetched);

        self.cached_key(kid, true)
            .await
            .ok_or_else(|| OidcError::Forbidden(format!("JWT kid not published by Google: {kid}")))
    }

    async fn cached_key(&self, kid: &str, allow_stale: bool) -> Option<Arc<DecodingKey>> {
        let keys = self.keys.read().await;
        keys.as_ref()
            .filter(|cached| allow_stale || cached.is_fresh())
            .and_then(|cached| cached.by_kid.get(kid).cloned())
    }
}

async fn fetch_google_keys(http_client: &reqwest::Client) -> Result<CachedKeys, OidcError> {
    let response = http_client
        .get(GOOGLE_CERTS_URL)
        .send()
        .await
        .map_err(|e| OidcError::Transient(format!("JWKS request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(OidcError::Transient(format!(
            "JWKS request returned status {}",
            response.status()
        )));
    }

    let ttl = response
        .headers()
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(max_age_secs)
        .map(Duration::from_secs)
        .unwrap_or(FALLBACK_KEY_TTL);

    let jwks: Jwks = response
        .json()
        .await
        .map_err(|e| OidcError::Transient(format!("invalid JWKS JSON: {e}")))?;

    let by_kid: HashMap<_, _> = jwks
        .keys
        .into_iter()
        .filter(Jwk::is_rs256_signing_key)
        .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => Some((jwk.kid, Arc::new(key))),
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA key");
                None
            }
        })
        .collect();

    if by_kid.is_empty() {
        return Err(OidcError::Transient(
            "JWKS response had no usable RSA keys".to_string(),
        ));
    }

    tracing::debug!(keys = by_kid.len(), ttl_secs = ttl.as_secs(), "Fetched Google JWKS");

    Ok(CachedKeys {
        by_kid,
        fetched_at: Instant::now(),
        ttl,
    })
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

impl Jwk {
    fn is_rs256_signing_key(&self) -> bool {
        self.kty == "RSA"
            && !self.kid.trim().is_empty()
            && self.alg.as_deref().map_or(true, |alg| alg == "RS256")
            && self.use_.as_deref().map_or(true, |use_| use_ == "sig")
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    iat: Option<u64>,
    email: Option<String>,
    email_verified: Option<bool>,
}

fn extract_bearer_token(auth_header: Option<&HeaderValue>) -> Result<&str, OidcError> {
    let value = auth_header
        .ok_or_else(|| OidcError::Forbidden("missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| OidcError::Forbidden("invalid Authorization header".to_string()))?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Ok(token),
        Some(_) => Err(OidcError::Forbidden("Bearer token is empty".to_string())),
        None => Err(OidcError::Forbidden(
            "Authorization header must be a Bearer token".to_string(),
        )),
    }
}

fn check_issued_at(iat: Option<u64>) -> Result<(), OidcError> {
    let iat = iat.ok_or_else(|| OidcError::Forbidden("missing iat claim".to_string()))?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    if iat > now + CLOCK_SKEW_SECS {
        return Err(OidcError::Forbidden("iat claim is in the future".to_string()));
    }
    Ok(())
}

fn max_age_secs(cache_control: &str) -> Option<u64> {
    cache_control
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse().ok())
}
