//! OAuth2 token acquisition for the Google Drive API
//!
//! Implements the two grant flows Drive access runs on:
//!
//! - **Service account** (RFC 7523 JWT bearer): a signed RS256 assertion is
//!   exchanged for a short-lived access token. Nothing touches disk.
//! - **Installed app** (authorization code, out-of-band): the user pastes a
//!   one-time code from the browser; the resulting tokens are cached on disk
//!   and refreshed from then on without further interaction.
//!
//! ## Components
//!
//! - [`ServiceKey`] - parsed service account key file
//! - [`UserSecrets`] - parsed installed-app OAuth client file
//! - [`Tokens`] - access/refresh token pair with its expiry instant
//! - [`DriveAuth`] - hands out bearer tokens, refreshing as needed
//!
//! ## Design Notes
//!
//! - Token state lives behind a `tokio::sync::Mutex` that stays held across
//!   the refresh request, so concurrent callers never race two refreshes.
//! - Refresh responses from Google usually omit the refresh token; the one
//!   from the original grant is carried forward and re-persisted.
//! - The token cache is written through a same-directory `.tmp` sibling with
//!   mode 0600 and renamed into place.

use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use confab_core::domain::DomainError;

use crate::client;

/// Default Google OAuth2 token endpoint
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Default Google OAuth2 authorization endpoint
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Out-of-band redirect: the provider shows the code for the user to paste
const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Scope limited to files the app itself created
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Grant type for the service account assertion exchange (RFC 7523)
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime claimed in the signed assertion
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens this close to expiry are treated as already expired
const EXPIRY_SKEW_SECS: i64 = 60;

// ============================================================================
// Credential files
// ============================================================================

/// Service account key file as downloaded from the Google Cloud console.
///
/// Only the fields the JWT bearer exchange needs are kept; the rest of the
/// key file is ignored.
#[derive(Clone, Deserialize)]
pub struct ServiceKey {
    /// Service account email, used as the JWT issuer
    pub client_email: String,
    /// PEM-encoded RSA private key
    pub private_key: String,
    /// Token endpoint from the key file
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceKey {
    /// Loads and parses a service account key file.
    pub fn load(path: &Path) -> Result<Self, DomainError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Auth(format!(
                "failed to read credentials file {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            DomainError::Auth(format!(
                "{} is not a service account key file: {e}",
                path.display()
            ))
        })
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Installed-app OAuth client credentials.
#[derive(Clone, Deserialize)]
pub struct UserSecrets {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret (not actually secret for installed apps)
    pub client_secret: String,
    /// Authorization endpoint
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    /// Token endpoint
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// Envelope format of a downloaded OAuth client file.
#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<UserSecrets>,
    web: Option<UserSecrets>,
}

impl UserSecrets {
    /// Loads and parses an OAuth client file (the `installed` or `web` section).
    pub fn load(path: &Path) -> Result<Self, DomainError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Auth(format!(
                "failed to read credentials file {}: {e}",
                path.display()
            ))
        })?;
        let file: SecretsFile = serde_json::from_str(&raw).map_err(|e| {
            DomainError::Auth(format!(
                "{} is not an OAuth client file: {e}",
                path.display()
            ))
        })?;
        file.installed.or(file.web).ok_or_else(|| {
            DomainError::Auth(format!(
                "{} has neither an \"installed\" nor a \"web\" section",
                path.display()
            ))
        })
    }
}

impl fmt::Debug for UserSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn default_token_uri() -> String {
    TOKEN_URL.to_string()
}

fn default_auth_uri() -> String {
    AUTH_URL.to_string()
}

// ============================================================================
// Tokens
// ============================================================================

/// OAuth tokens plus the instant the access token stops being usable.
#[derive(Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for API calls
    pub access_token: String,
    /// Long-lived refresh token (user flow only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry instant of the access token
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// True when the access token expires within the skew window.
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }
}

impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokens")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

// ============================================================================
// Service account assertion (RS256 JWT)
// ============================================================================

#[derive(Serialize)]
struct JwtHeader {
    alg: &'static str,
    typ: &'static str,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Builds and signs the three-part JWT bearer assertion for a service key.
///
/// Claims follow the Google token endpoint contract: issuer is the service
/// account email, audience is the token endpoint itself, and the lifetime
/// is one hour from `now`.
fn sign_assertion(key: &ServiceKey, now: DateTime<Utc>) -> Result<String, DomainError> {
    let header = JwtHeader {
        alg: "RS256",
        typ: "JWT",
    };
    let claims = JwtClaims {
        iss: &key.client_email,
        scope: DRIVE_SCOPE,
        aud: &key.token_uri,
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    let header_json = serde_json::to_vec(&header)
        .map_err(|e| DomainError::Auth(format!("failed to encode JWT header: {e}")))?;
    let claims_json = serde_json::to_vec(&claims)
        .map_err(|e| DomainError::Auth(format!("failed to encode JWT claims: {e}")))?;

    let mut signing_input = URL_SAFE_NO_PAD.encode(header_json);
    signing_input.push('.');
    signing_input.push_str(&URL_SAFE_NO_PAD.encode(claims_json));

    let signing_key = parse_signing_key(&key.private_key)?;
    let signature = signing_key
        .try_sign(signing_input.as_bytes())
        .map_err(|e| DomainError::Auth(format!("RS256 signing failed: {e}")))?;

    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

/// Parses a PEM private key.
///
/// Google key files carry PKCS#8; PKCS#1 is accepted as well for keys that
/// went through `openssl rsa`.
fn parse_signing_key(pem: &str) -> Result<SigningKey<Sha256>, DomainError> {
    let private = RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| DomainError::Auth(format!("invalid RSA private key: {e}")))?;
    Ok(SigningKey::<Sha256>::new(private))
}

// ============================================================================
// Authorization URL (user flow)
// ============================================================================

/// Builds the out-of-band consent URL for an installed-app client.
///
/// `access_type=offline` and `prompt=consent` together make Google return a
/// refresh token on the code exchange.
pub fn authorize_url(secrets: &UserSecrets) -> Result<String, DomainError> {
    let mut url = Url::parse(&secrets.auth_uri)
        .map_err(|e| DomainError::Auth(format!("invalid authorization endpoint: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", &secrets.client_id)
        .append_pair("redirect_uri", OOB_REDIRECT_URI)
        .append_pair("response_type", "code")
        .append_pair("scope", DRIVE_SCOPE)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");
    Ok(url.into())
}

// ============================================================================
// DriveAuth
// ============================================================================

/// Which grant flow this instance runs.
enum Flow {
    /// Server-to-server: mint a signed assertion, no cache involved
    Service(ServiceKey),
    /// Interactive once, then refresh tokens from the on-disk cache
    User {
        secrets: UserSecrets,
        cache_path: PathBuf,
    },
}

/// Hands out bearer tokens for Drive API calls, refreshing them as needed.
///
/// [`access_token`](DriveAuth::access_token) is the only method API adapters
/// call; it returns a cached token when one is still comfortably valid and
/// otherwise goes through the flow's refresh path. The interactive part of
/// the user flow lives in [`login`](DriveAuth::login) and is never triggered
/// implicitly.
pub struct DriveAuth {
    /// HTTP client for token endpoint calls
    http: Client,
    /// Token endpoint, taken from the credentials file
    token_url: String,
    /// Grant flow
    flow: Flow,
    /// Current tokens; held across refresh so refreshes are serialized
    tokens: Mutex<Option<Tokens>>,
}

impl DriveAuth {
    /// Creates an instance for the service account flow.
    pub fn service(key: ServiceKey) -> Self {
        Self {
            http: Client::new(),
            token_url: key.token_uri.clone(),
            flow: Flow::Service(key),
            tokens: Mutex::new(None),
        }
    }

    /// Creates an instance for the installed-app flow with its token cache.
    pub fn user(secrets: UserSecrets, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            http: Client::new(),
            token_url: secrets.token_uri.clone(),
            flow: Flow::User {
                secrets,
                cache_path: cache_path.into(),
            },
            tokens: Mutex::new(None),
        }
    }

    /// Returns a bearer token, minting or refreshing one if necessary.
    ///
    /// # Errors
    /// [`DomainError::Auth`] when credentials are unusable or, in the user
    /// flow, when no prior [`login`](DriveAuth::login) left a refresh token.
    pub async fn access_token(&self) -> Result<String, DomainError> {
        let mut guard = self.tokens.lock().await;
        if let Some(tokens) = guard.as_ref() {
            if !tokens.needs_refresh() {
                return Ok(tokens.access_token.clone());
            }
        }

        let fresh = self.obtain(guard.as_ref()).await?;
        let access = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access)
    }

    /// Performs the flow's login step.
    ///
    /// Service flow: mints a token to prove the key works. User flow: prints
    /// the consent URL, reads the pasted authorization code from stdin,
    /// exchanges it, and writes the token cache.
    pub async fn login(&self) -> Result<(), DomainError> {
        match &self.flow {
            Flow::Service(_) => {
                self.access_token().await?;
                info!("service account credentials verified");
                Ok(())
            }
            Flow::User {
                secrets,
                cache_path,
            } => {
                let url = authorize_url(secrets)?;
                println!("Open this URL in your browser and authorize access:\n\n{url}\n");
                print!("Enter the authorization code: ");
                std::io::stdout()
                    .flush()
                    .map_err(|e| DomainError::Io(format!("failed to flush stdout: {e}")))?;

                let code = read_code_from_stdin().await?;
                if code.is_empty() {
                    return Err(DomainError::Auth("empty authorization code".to_string()));
                }

                info!("exchanging authorization code for tokens");
                let tokens = self
                    .request_token(&[
                        ("client_id", secrets.client_id.as_str()),
                        ("client_secret", secrets.client_secret.as_str()),
                        ("code", code.as_str()),
                        ("redirect_uri", OOB_REDIRECT_URI),
                        ("grant_type", "authorization_code"),
                    ])
                    .await?;
                if tokens.refresh_token.is_none() {
                    warn!("authorization response carried no refresh token; the next run will need another login");
                }

                self.write_cache(cache_path, &tokens).await?;
                *self.tokens.lock().await = Some(tokens);
                info!("user authorization complete");
                Ok(())
            }
        }
    }

    /// Returns current tokens without refreshing anything.
    ///
    /// Falls back to the on-disk cache in the user flow. `Ok(None)` means
    /// not logged in; an error means the cache exists but is unusable.
    pub async fn cached_tokens(&self) -> Result<Option<Tokens>, DomainError> {
        if let Some(tokens) = self.tokens.lock().await.as_ref() {
            return Ok(Some(tokens.clone()));
        }
        match &self.flow {
            Flow::Service(_) => Ok(None),
            Flow::User { cache_path, .. } => {
                if !cache_path.exists() {
                    return Ok(None);
                }
                self.read_cache(cache_path).await.map(Some)
            }
        }
    }

    /// Obtains fresh tokens for the current flow.
    async fn obtain(&self, prior: Option<&Tokens>) -> Result<Tokens, DomainError> {
        match &self.flow {
            Flow::Service(key) => {
                let assertion = sign_assertion(key, Utc::now())?;
                debug!("requesting service account token");
                self.request_token(&[
                    ("grant_type", JWT_BEARER_GRANT),
                    ("assertion", assertion.as_str()),
                ])
                .await
            }
            Flow::User {
                secrets,
                cache_path,
            } => {
                let owned;
                let current = match prior {
                    Some(tokens) => tokens,
                    None => {
                        owned = self.read_cache(cache_path).await?;
                        if !owned.needs_refresh() {
                            debug!("using cached user access token");
                            return Ok(owned);
                        }
                        &owned
                    }
                };

                let refresh = current.refresh_token.as_deref().ok_or_else(|| {
                    DomainError::Auth(
                        "no refresh token available; run `confab auth login`".to_string(),
                    )
                })?;

                info!("refreshing user access token");
                let mut fresh = self
                    .request_token(&[
                        ("client_id", secrets.client_id.as_str()),
                        ("client_secret", secrets.client_secret.as_str()),
                        ("refresh_token", refresh),
                        ("grant_type", "refresh_token"),
                    ])
                    .await?;

                // Google omits the refresh token on refresh responses;
                // carry the original forward.
                fresh.refresh_token = fresh
                    .refresh_token
                    .or_else(|| Some(refresh.to_string()));

                self.write_cache(cache_path, &fresh).await?;
                Ok(fresh)
            }
        }
    }

    /// POSTs a form to the token endpoint and maps the response.
    async fn request_token(&self, form: &[(&str, &str)]) -> Result<Tokens, DomainError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| DomainError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = client::error_body(response).await;
            return Err(DomainError::Auth(format!(
                "token endpoint returned {}: {body}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Auth(format!("malformed token response: {e}")))?;

        let expires_at = body
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs))
            .unwrap_or_else(|| Utc::now() + Duration::hours(1));

        Ok(Tokens {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at,
        })
    }

    /// Reads and parses the token cache.
    async fn read_cache(&self, path: &Path) -> Result<Tokens, DomainError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            DomainError::Auth(format!(
                "no usable token cache at {}: {e}; run `confab auth login`",
                path.display()
            ))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            DomainError::Auth(format!(
                "token cache at {} is corrupt: {e}; run `confab auth login`",
                path.display()
            ))
        })
    }

    /// Writes the token cache with mode 0600 via a `.tmp` sibling rename.
    async fn write_cache(&self, path: &Path, tokens: &Tokens) -> Result<(), DomainError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DomainError::Io(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let json = serde_json::to_vec_pretty(tokens)
            .map_err(|e| DomainError::Io(format!("failed to encode token cache: {e}")))?;

        // Same-directory sibling keeps the final rename atomic.
        let tmp = tmp_sibling(path);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp)
            .await
            .map_err(|e| DomainError::Io(format!("failed to create {}: {e}", tmp.display())))?;
        file.write_all(&json)
            .await
            .map_err(|e| DomainError::Io(format!("failed to write {}: {e}", tmp.display())))?;
        file.flush()
            .await
            .map_err(|e| DomainError::Io(format!("failed to flush {}: {e}", tmp.display())))?;
        drop(file);

        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| DomainError::Io(format!("failed to rename {}: {e}", tmp.display())))?;
        debug!(path = %path.display(), "token cache updated");
        Ok(())
    }
}

/// Appends `.tmp` to the full file name (`token.json` -> `token.json.tmp`).
fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Reads one trimmed line from stdin without blocking the runtime.
async fn read_code_from_stdin() -> Result<String, DomainError> {
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .map_err(|e| DomainError::Io(format!("stdin task failed: {e}")))?
    .map_err(|e| DomainError::Io(format!("failed to read from stdin: {e}")))?;
    Ok(line.trim().to_string())
}
