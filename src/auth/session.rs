use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies stateless session tokens and formats the cookie
/// that carries them. No server-side session table exists.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    cookie_name: String,
    lifetime_hours: u64,
    secure: bool,
}

impl SessionKeys {
    pub fn new(secret: &[u8], auth: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            cookie_name: auth.cookie_name.clone(),
            lifetime_hours: auth.session_hours,
            secure: auth.secure_cookie,
        }
    }

    /// Keys from the configured secret, or a random one when that is
    /// allowed.
    pub fn from_config(auth: &AuthConfig) -> anyhow::Result<Self> {
        match auth.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => Ok(Self::new(secret.as_bytes(), auth)),
            None if auth.allow_ephemeral_secret => {
                tracing::warn!(
                    "No JWT secret configured; using an ephemeral one. Sessions end on restart."
                );
                Ok(Self::new(generate_secret().as_bytes(), auth))
            }
            None => anyhow::bail!("auth.jwt_secret (or JWT_SECRET) must be set"),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn issue(&self, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let lifetime = chrono::Duration::hours(self.lifetime_hours as i64);
        self.issue_with_lifetime(user_id, lifetime)
    }

    fn issue_with_lifetime(
        &self,
        user_id: &str,
        lifetime: chrono::Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    pub fn session_cookie(&self, token: &str) -> String {
        let max_age_secs = self.lifetime_hours * 3600;
        format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
            self.cookie_name,
            token,
            max_age_secs,
            self.secure_suffix()
        )
    }

    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0{}",
            self.cookie_name,
            self.secure_suffix()
        )
    }

    fn secure_suffix(&self) -> &'static str {
        if self.secure {
            "; Secure"
        } else {
            ""
        }
    }
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

/// Generate a cryptographically random 32-byte hex secret.
fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn keys() -> SessionKeys {
        SessionKeys::new(b"test-secret", &AuthConfig::default())
    }

    #[test]
    fn issued_token_verifies_to_same_user() {
        let keys = keys();
        let token = keys.issue("user-1").unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, 360 * 3600);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = SessionKeys::new(b"other-secret", &AuthConfig::default());
        let token = other.issue("user-1").unwrap();
        assert!(keys().verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = keys();
        let token = keys
            .issue_with_lifetime("user-1", chrono::Duration::hours(-2))
            .unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(keys().verify("invalid.token.here").is_err());
    }

    #[test]
    fn cookies_carry_expected_attributes() {
        let keys = keys();
        assert_eq!(
            keys.session_cookie("abc"),
            "jwt=abc; HttpOnly; SameSite=Strict; Path=/; Max-Age=1296000"
        );
        assert_eq!(
            keys.clear_cookie(),
            "jwt=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"
        );

        let secure = SessionKeys::new(
            b"s",
            &AuthConfig {
                secure_cookie: true,
                ..AuthConfig::default()
            },
        );
        assert!(secure.session_cookie("abc").ends_with("; Secure"));
    }

    #[test]
    fn ephemeral_secret_requires_opt_in() {
        let strict = AuthConfig {
            allow_ephemeral_secret: false,
            ..AuthConfig::default()
        };
        assert!(SessionKeys::from_config(&strict).is_err());
        assert!(SessionKeys::from_config(&AuthConfig::default()).is_ok());
    }

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; jwt=tok.en.value; other=1"),
        );
        assert_eq!(cookie_value(&headers, "jwt"), Some("tok.en.value"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn generated_secret_is_64_hex_chars() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, generate_secret());
    }
}
