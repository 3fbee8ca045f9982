use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::models::user::{CallerIdentity, Claims};

/// HS256 keys shared with the hosted auth provider.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issues a token valid for one day. Production tokens come from the auth
    /// provider; this is used by local tooling and tests.
    pub fn issue(&self, subject: &str, email: Option<&str>) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: subject.to_string(),
            email: email.map(str::to_string),
            exp: (chrono::Utc::now() + chrono::Duration::days(1)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    // Validates the provided JWT token and returns the caller if valid.
    pub fn validate_token(&self, token: &str) -> Option<CallerIdentity> {
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) if !data.claims.sub.trim().is_empty() => Some(data.claims.into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_validate() {
        let keys = JwtKeys::new("secret");
        let token = keys.issue("user-1", Some("Ana@Example.com")).unwrap();
        let caller = keys.validate_token(&token).unwrap();
        assert_eq!(caller.id, "user-1");
        assert_eq!(caller.email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = JwtKeys::new("secret").issue("user-1", None).unwrap();
        assert!(JwtKeys::new("other").validate_token(&token).is_none());
        assert!(JwtKeys::new("secret").validate_token("not-a-jwt").is_none());
    }
}
