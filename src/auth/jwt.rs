use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::models::{Claims, TokenSubject, TokenType};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

impl Claims {
    pub fn new(subject: &TokenSubject, token_type: TokenType, ttl: usize) -> Self {
        let iat = now();
        Self {
            sub: subject.email.clone(),
            role: subject.role,
            employee_id: subject.employee_id.clone(),
            exp: iat + ttl,
            iat,
            jti: Uuid::new_v4().to_string(),
            token_type,
        }
    }
}

pub fn encode_claims(claims: &Claims, secret: &str) -> Result<String, Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn generate_access_token(
    subject: &TokenSubject,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    encode_claims(&Claims::new(subject, TokenType::Access, ttl), secret)
}

/// Returns the claims as well, so the caller can record the `jti`.
pub fn generate_refresh_token(
    subject: &TokenSubject,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = Claims::new(subject, TokenType::Refresh, ttl);
    let token = encode_claims(&claims, secret)?;
    Ok((token, claims))
}

/// Checks signature and expiry. Token type is left to the caller.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    const SECRET: &str = "unit-test-secret";

    fn subject() -> TokenSubject {
        TokenSubject {
            email: "jane@company.com".into(),
            role: Role::HrManager,
            employee_id: "E1".into(),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let token = generate_access_token(&subject(), SECRET, 900).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();

        assert_eq!(claims.sub, "jane@company.com");
        assert_eq!(claims.role, Role::HrManager);
        assert_eq!(claims.employee_id, "E1");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp, claims.iat + 900);
    }

    #[test]
    fn test_refresh_token_claims_match_encoded() {
        let (token, claims) = generate_refresh_token(&subject(), SECRET, 604_800).unwrap();
        let decoded = verify_token(&token, SECRET).unwrap();

        assert_eq!(decoded.jti, claims.jti);
        assert_eq!(decoded.token_type, TokenType::Refresh);
    }

    #[test]
    fn test_each_token_gets_unique_jti() {
        let a = Claims::new(&subject(), TokenType::Access, 60);
        let b = Claims::new(&subject(), TokenType::Access, 60);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = generate_access_token(&subject(), SECRET, 900).unwrap();
        assert!(verify_token(&token, "another-secret").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut claims = Claims::new(&subject(), TokenType::Access, 0);
        claims.iat -= 7200;
        claims.exp = claims.iat + 60;
        let token = encode_claims(&claims, SECRET).unwrap();

        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(verify_token("not.a.jwt", SECRET).is_err());
    }
}
