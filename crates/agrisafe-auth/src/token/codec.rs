//! HS256 session token codec.
//!
//! Tokens are stateless: nothing is stored server-side and a refreshed token
//! does not invalidate its predecessor. Expiry is checked here against the
//! injected clock rather than by the JWT library.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::{SessionClaims, SessionToken};
use crate::clock::Clock;
use crate::config::{MIN_SECRET_LENGTH, TokenConfig};
use crate::storage::User;
use crate::{AuthError, AuthResult};

const ALGORITHM: Algorithm = Algorithm::HS256;

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            _ => Self::malformed_token(err.to_string()),
        }
    }
}

/// Maps a decode failure, treating an undecodable signature segment as a bad
/// signature once the header and payload segments are known to decode.
fn classify_decode_error(token: &str, err: jsonwebtoken::errors::Error) -> AuthError {
    if matches!(err.kind(), ErrorKind::Base64(_)) && signed_segments_decode(token) {
        return AuthError::InvalidSignature;
    }
    err.into()
}

fn signed_segments_decode(token: &str) -> bool {
    let Some((message, _signature)) = token.rsplit_once('.') else {
        return false;
    };
    let Some((header, payload)) = message.split_once('.') else {
        return false;
    };
    !payload.contains('.')
        && URL_SAFE_NO_PAD.decode(header).is_ok()
        && URL_SAFE_NO_PAD.decode(payload).is_ok()
}

/// Issues, decodes and refreshes session tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl_seconds: i64,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Creates a codec.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the secret is shorter than 32
    /// bytes or the TTL is zero.
    pub fn new(
        secret: &[u8],
        issuer: impl Into<String>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::configuration(format!(
                "token secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }
        let ttl_seconds = i64::try_from(ttl.as_secs())
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| AuthError::configuration("token ttl must be between 1s and i64::MAX"))?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl_seconds,
            clock,
        })
    }

    /// Creates a codec from the `auth.token` config section.
    ///
    /// # Errors
    ///
    /// See [`TokenCodec::new`].
    pub fn from_config(config: &TokenConfig, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        Self::new(
            config.secret.as_bytes(),
            config.issuer.clone(),
            config.ttl,
            clock,
        )
    }

    /// Returns the configured lifetime in seconds.
    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issues a token for `user`, valid for the configured TTL from now.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if signing fails.
    pub fn issue(&self, user: &User) -> AuthResult<SessionToken> {
        let now = self.clock.unix_now();
        let claims = SessionClaims::for_user(user, &self.issuer, now, now + self.ttl_seconds);
        self.sign(&claims)
    }

    /// Verifies a token and returns its claims.
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` if the signature fails or the algorithm is not HS256
    /// - `MalformedToken` if the token or its claims are structurally invalid
    /// - `Expired` if `now >= exp`
    pub fn decode(&self, token: &str) -> AuthResult<SessionClaims> {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss"]);

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| classify_decode_error(token, e))?
            .claims;

        if claims.exp <= claims.iat {
            return Err(AuthError::malformed_token("exp must be after iat"));
        }
        if claims.is_expired_at(self.clock.unix_now()) {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    /// Exchanges a token in its refresh window for a new one.
    ///
    /// The window opens once less than half of the TTL remains.
    ///
    /// # Errors
    ///
    /// Propagates [`decode`](Self::decode) failures, and returns
    /// `NotEligibleForRefresh` outside the window.
    pub fn refresh(&self, token: &str) -> AuthResult<SessionToken> {
        let claims = self.decode(token)?;
        let now = self.clock.unix_now();

        if claims.remaining_seconds(now) * 2 >= self.ttl_seconds {
            return Err(AuthError::NotEligibleForRefresh);
        }

        let renewed = SessionClaims {
            iat: now,
            exp: now + self.ttl_seconds,
            iss: self.issuer.clone(),
            ..claims
        };
        self.sign(&renewed)
    }

    fn sign(&self, claims: &SessionClaims) -> AuthResult<SessionToken> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map(SessionToken::new)
            .map_err(|e| AuthError::internal(format!("failed to sign session token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::Role;
    use serde::Serialize;
    use time::OffsetDateTime;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const ISSUER: &str = "https://api.agrisafe.test";
    const T0: i64 = 1_700_000_000;

    fn setup() -> (Arc<FixedClock>, TokenCodec) {
        let clock = Arc::new(FixedClock::at(T0));
        let codec =
            TokenCodec::new(SECRET, ISSUER, Duration::from_secs(3600), clock.clone()).unwrap();
        (clock, codec)
    }

    fn user() -> User {
        let mut user = User::new_local(
            "Alice",
            "a@example.com",
            "hash".into(),
            OffsetDateTime::from_unix_timestamp(T0).unwrap(),
        );
        user.role = Role::Staff;
        user
    }

    fn tamper_signature(token: &str) -> String {
        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut sig: Vec<char> = signature.chars().collect();
        sig[0] = if sig[0] == 'A' { 'B' } else { 'A' };
        format!("{head}.{}", sig.into_iter().collect::<String>())
    }

    #[test]
    fn test_issue_then_decode() {
        let (_, codec) = setup();
        let user = user();
        let token = codec.issue(&user).unwrap();
        assert_eq!(token.as_str().split('.').count(), 3);

        let claims = codec.decode(token.as_str()).unwrap();
        assert_eq!(claims.user_id, user.id.to_string());
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.role, Role::Staff);
        assert!(!claims.email_verified);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.iat, T0);
        assert_eq!(claims.exp, T0 + 3600);
        assert!(claims.iat < claims.exp);
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let (_, codec) = setup();
        let token = codec.issue(&user()).unwrap();
        let err = codec.decode(&tamper_signature(token.as_str())).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn test_every_signature_position_tamper_rejected() {
        let (_, codec) = setup();
        let token = codec.issue(&user()).unwrap();
        let (head, signature) = token.as_str().rsplit_once('.').unwrap();

        for i in 0..signature.len() {
            let mut sig: Vec<char> = signature.chars().collect();
            sig[i] = if sig[i] == 'A' { 'B' } else { 'A' };
            let tampered = format!("{head}.{}", sig.into_iter().collect::<String>());
            let err = codec.decode(&tampered).unwrap_err();
            assert!(
                matches!(err, AuthError::InvalidSignature),
                "position {i}: {err:?}"
            );
        }

        for bad in ['!', '=', '+', '/'] {
            let mut sig = signature.to_string();
            sig.insert(5, bad);
            let err = codec.decode(&format!("{head}.{sig}")).unwrap_err();
            assert!(matches!(err, AuthError::InvalidSignature), "{bad}: {err:?}");
        }

        let truncated = &token.as_str()[..token.as_str().len() - 1];
        assert!(matches!(
            codec.decode(truncated).unwrap_err(),
            AuthError::InvalidSignature
        ));
    }

    #[test]
    fn test_bad_header_encoding_is_malformed() {
        let (_, codec) = setup();
        let token = codec.issue(&user()).unwrap();
        let mut parts: Vec<&str> = token.as_str().split('.').collect();
        parts[0] = "!!!";
        let err = codec.decode(&parts.join(".")).unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken { .. }));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (clock, codec) = setup();
        let other = TokenCodec::new(
            b"ffffffffffffffffffffffffffffffff",
            ISSUER,
            Duration::from_secs(3600),
            clock,
        )
        .unwrap();
        let token = other.issue(&user()).unwrap();
        assert!(matches!(
            codec.decode(token.as_str()).unwrap_err(),
            AuthError::InvalidSignature
        ));
    }

    #[test]
    fn test_algorithm_substitution_rejected() {
        let (_, codec) = setup();
        let claims = SessionClaims::for_user(&user(), ISSUER, T0, T0 + 3600);
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(matches!(
            codec.decode(&token).unwrap_err(),
            AuthError::InvalidSignature
        ));
    }

    #[test]
    fn test_missing_claim_is_malformed() {
        #[derive(Serialize)]
        struct Partial {
            user_id: String,
            iss: String,
            iat: i64,
            exp: i64,
        }

        let (_, codec) = setup();
        let token = encode(
            &Header::new(ALGORITHM),
            &Partial {
                user_id: "u1".into(),
                iss: ISSUER.into(),
                iat: T0,
                exp: T0 + 60,
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(matches!(
            codec.decode(&token).unwrap_err(),
            AuthError::MalformedToken { .. }
        ));
    }

    #[test]
    fn test_wrong_issuer_is_malformed() {
        let (clock, codec) = setup();
        let other =
            TokenCodec::new(SECRET, "https://evil.test", Duration::from_secs(3600), clock).unwrap();
        let token = other.issue(&user()).unwrap();
        assert!(matches!(
            codec.decode(token.as_str()).unwrap_err(),
            AuthError::MalformedToken { .. }
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let (_, codec) = setup();
        for input in ["", "not-a-token", "a.b.c"] {
            assert!(
                matches!(codec.decode(input).unwrap_err(), AuthError::MalformedToken { .. }),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let (clock, codec) = setup();
        let token = codec.issue(&user()).unwrap();

        clock.set(T0 + 3599);
        assert!(codec.decode(token.as_str()).is_ok());

        clock.set(T0 + 3600);
        assert!(matches!(
            codec.decode(token.as_str()).unwrap_err(),
            AuthError::Expired
        ));

        clock.set(T0 + 7200);
        assert!(matches!(
            codec.decode(token.as_str()).unwrap_err(),
            AuthError::Expired
        ));
    }

    #[test]
    fn test_refresh_inside_window() {
        let (clock, codec) = setup();
        let token = codec.issue(&user()).unwrap();

        clock.advance(1900);
        let renewed = codec.refresh(token.as_str()).unwrap();
        let claims = codec.decode(renewed.as_str()).unwrap();
        assert_eq!(claims.iat, T0 + 1900);
        assert_eq!(claims.exp, T0 + 1900 + 3600);
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.role, Role::Staff);

        // The old token remains valid until its own expiry.
        assert!(codec.decode(token.as_str()).is_ok());
    }

    #[test]
    fn test_refresh_outside_window() {
        let (clock, codec) = setup();
        let token = codec.issue(&user()).unwrap();

        clock.advance(100);
        assert!(matches!(
            codec.refresh(token.as_str()).unwrap_err(),
            AuthError::NotEligibleForRefresh
        ));

        // Exactly half remaining is still outside the window.
        clock.set(T0 + 1800);
        assert!(matches!(
            codec.refresh(token.as_str()).unwrap_err(),
            AuthError::NotEligibleForRefresh
        ));

        clock.set(T0 + 1801);
        assert!(codec.refresh(token.as_str()).is_ok());
    }

    #[test]
    fn test_refresh_propagates_decode_errors() {
        let (clock, codec) = setup();
        let token = codec.issue(&user()).unwrap();

        assert!(matches!(
            codec.refresh(&tamper_signature(token.as_str())).unwrap_err(),
            AuthError::InvalidSignature
        ));

        clock.advance(3600);
        assert!(matches!(
            codec.refresh(token.as_str()).unwrap_err(),
            AuthError::Expired
        ));
    }

    #[test]
    fn test_short_secret_rejected() {
        let clock = Arc::new(FixedClock::at(T0));
        let result = TokenCodec::new(b"short", ISSUER, Duration::from_secs(60), clock);
        assert!(matches!(result, Err(AuthError::Configuration { .. })));
    }

    #[test]
    fn test_session_token_debug_is_redacted() {
        let (_, codec) = setup();
        let token = codec.issue(&user()).unwrap();
        assert_eq!(format!("{token:?}"), "SessionToken(***)");
    }
}
