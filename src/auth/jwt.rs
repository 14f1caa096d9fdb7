use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Verifies (and, for tests and sibling services, mints) the HS256 session
/// tokens this service trusts. Token issuance to end users lives in the
/// login service, not here.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiry: Duration::minutes(config.jwt_expiry_minutes),
        })
    }

    pub fn generate_token(&self, user_id: i32, username: &str, role: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.expiry;
        let claims = Claims {
            sub: user_id,
            username: username.to_owned(),
            role: role.to_owned(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub username: String,
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

#[cfg(test)]
mod tests {
    use super::JwtService;
    use crate::config::AppConfig;
    use std::path::PathBuf;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/test".to_string(),
            database_max_pool_size: 1,
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "casetrack".to_string(),
            jwt_audience: "casetrack-clients".to_string(),
            jwt_expiry_minutes: 5,
            cors_allowed_origin: None,
            files_base_dir: PathBuf::from("/tmp/shared_data"),
            inbox_dir: PathBuf::from("/tmp/shared_data/inbox"),
            index_dir: PathBuf::from("/tmp/shared_data/index"),
        }
    }

    #[test]
    fn token_roundtrip_preserves_claims() {
        let jwt = JwtService::from_config(&test_config()).unwrap();
        let token = jwt.generate_token(7, "alice", "admin").unwrap();
        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let jwt = JwtService::from_config(&test_config()).unwrap();
        let mut other_config = test_config();
        other_config.jwt_secret = "different-secret".to_string();
        let other = JwtService::from_config(&other_config).unwrap();

        let token = other.generate_token(7, "alice", "user").unwrap();
        assert!(jwt.verify_token(&token).is_err());
    }

    #[test]
    fn rejects_token_for_other_audience() {
        let mut config = test_config();
        config.jwt_audience = "somewhere-else".to_string();
        let other = JwtService::from_config(&config).unwrap();
        let jwt = JwtService::from_config(&test_config()).unwrap();

        let token = other.generate_token(7, "alice", "user").unwrap();
        assert!(jwt.verify_token(&token).is_err());
    }
}
