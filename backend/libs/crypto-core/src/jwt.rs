/// JWT verification for community services
///
/// Tokens are issued by the identity provider and consumed here only through
/// their verified output: the caller's identity (`sub`) and the raw role
/// string (`role`). Services must re-canonicalize the role before using it.
///
/// ## Security Design
///
/// - **RS256 ONLY**: no symmetric algorithms, to rule out algorithm confusion
/// - **No hardcoded keys**: keys come from PEM strings supplied by configuration
/// - **Expired vs invalid**: expiry is reported separately so clients know to
///   re-authenticate instead of treating the credential as forged
///
/// ## Usage
///
/// ```rust,ignore
/// use crypto_core::jwt::TokenVerifier;
///
/// let pem = crypto_core::jwt::load_validation_key()?;
/// let verifier = TokenVerifier::from_rsa_pem(&pem)?;
/// let claims = verifier.verify(token)?;
/// ```
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

const ACCESS_TOKEN_EXPIRY_HOURS: i64 = 1;

/// Clock skew tolerance applied to `exp`, in seconds.
const DEFAULT_VALIDATION_LEEWAY: u64 = 30;

/// JWT algorithm - MUST be RS256
const JWT_ALGORITHM: Algorithm = Algorithm::RS256;

const ACCESS_TOKEN_TYPE: &str = "access";

/// Environment variable holding the PEM-encoded RSA public key.
pub const PUBLIC_KEY_ENV: &str = "JWT_PUBLIC_KEY_PEM";

// ============================================================================
// Data Structures
// ============================================================================

/// JWT claims carried by community access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (identity UUID as string)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token type: only "access" tokens authenticate requests
    pub token_type: String,
    /// Raw role string as stored by the identity provider. May use any legacy
    /// spelling ("club head", "ClubHead", ...); never compare it directly.
    #[serde(default)]
    pub role: String,
}

impl Claims {
    /// Parse the subject claim as an identity.
    pub fn identity(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub)
            .map_err(|e| TokenError::Invalid(format!("malformed subject: {e}")))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("failed to parse RSA key: {0}")]
    Key(String),

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("{0} is not configured")]
    MissingKey(&'static str),
}

// ============================================================================
// Verification
// ============================================================================

/// Validates RS256 access tokens against a single public key.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn from_rsa_pem(public_key_pem: &str) -> Result<Self, TokenError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| TokenError::Key(e.to_string()))?;

        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = DEFAULT_VALIDATION_LEEWAY;

        Ok(Self { key, validation })
    }

    /// Verify signature, expiry and token type, returning the claims.
    ///
    /// ## Errors
    ///
    /// - [`TokenError::Expired`] when `exp` has passed (beyond the leeway)
    /// - [`TokenError::Invalid`] for any signature, format or type problem
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        if data.claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(TokenError::Invalid(format!(
                "expected an access token, got '{}'",
                data.claims.token_type
            )));
        }

        Ok(data.claims)
    }
}

/// Read the verification key from the environment.
pub fn load_validation_key() -> Result<String, TokenError> {
    std::env::var(PUBLIC_KEY_ENV)
        .ok()
        .filter(|pem| !pem.trim().is_empty())
        .ok_or(TokenError::MissingKey(PUBLIC_KEY_ENV))
}

// ============================================================================
// Issuance
// ============================================================================

/// Signs access tokens. Production tokens come from the identity provider;
/// this exists for local tooling and tests.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn from_rsa_pem(private_key_pem: &str) -> Result<Self, TokenError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| TokenError::Key(e.to_string()))?;
        Ok(Self { key })
    }

    /// Issue a standard one-hour access token.
    pub fn issue_access_token(&self, identity: Uuid, role: &str) -> Result<String, TokenError> {
        self.issue_with_ttl(identity, role, Duration::hours(ACCESS_TOKEN_EXPIRY_HOURS))
    }

    /// Issue an access token with an explicit lifetime. A negative `ttl`
    /// produces an already-expired token.
    pub fn issue_with_ttl(
        &self,
        identity: Uuid,
        role: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            role: role.to_string(),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================
