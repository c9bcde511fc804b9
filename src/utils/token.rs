use jsonwebtoken::{decode, errors::Error, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by tokens issued by the district's auth provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub email: Option<String>,
    pub iat: usize,
    pub exp: usize,
}

#[cfg(test)]
pub fn create_token(
    admin_id: i32,
    role: &str,
    email: Option<&str>,
    secret: &[u8],
    expires_in_seconds: i64,
) -> Result<String, Error> {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = Utc::now();
    let claims = TokenClaims {
        sub: admin_id.to_string(),
        role: role.to_string(),
        email: email.map(str::to_string),
        iat: now.timestamp() as usize,
        exp: (now + Duration::seconds(expires_in_seconds)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<TokenClaims, Error> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )?;

    Ok(decoded.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_token() {
        let token = create_token(7, "admin", Some("ict@example.com"), b"secret", 60).unwrap();
        let claims = decode_token(token, b"secret").unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.email.as_deref(), Some("ict@example.com"));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_token(7, "admin", None, b"secret", 60).unwrap();
        assert!(decode_token(token, b"other").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = create_token(7, "admin", None, b"secret", -3600).unwrap();
        assert!(decode_token(token, b"secret").is_err());
    }
}
