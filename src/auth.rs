use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::AuthPayload;

const TOKEN_TTL_SECS: usize = 3600; // 1 hour

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}

pub fn create_jwt(
    username: &str,
    user_id: u64,
    secret: &[u8],
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0)
        + TOKEN_TTL_SECS;

    let claims = AuthPayload {
        sub: username.to_owned(),
        uid: user_id,
        exp: expiration,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

pub fn validate_jwt(token: &str, secret: &[u8]) -> Result<AuthPayload, jsonwebtoken::errors::Error> {
    let token_data = decode::<AuthPayload>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hashed = hash_password("hunter2").expect("hash");
        assert!(verify_password("hunter2", &hashed).expect("verify"));
        assert!(!verify_password("wrong", &hashed).expect("verify"));
    }

    #[test]
    fn test_jwt_roundtrip() {
        let secret = b"test_secret";
        let token = create_jwt("alice", 3, secret).expect("encode");
        let claims = validate_jwt(&token, secret).expect("decode");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.uid, 3);
    }

    #[test]
    fn test_jwt_wrong_secret_rejected() {
        let token = create_jwt("alice", 3, b"secret_a").expect("encode");
        assert!(validate_jwt(&token, b"secret_b").is_err());
    }
}
