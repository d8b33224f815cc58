use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use kopilka_repo::user_repo::UserId;
use serde::Deserialize;
use serde::Serialize;
use std::time::UNIX_EPOCH;
use thiserror::Error;

#[derive(Clone)]
pub struct JWTAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

/// Access and refresh tokens back the JSON API, session tokens live in the
/// web cookie. A token is only accepted where its kind matches.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Session,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    exp: usize,
    sub: UserId,
    kind: TokenKind,
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token is a {0:?} token, expected {1:?}")]
    WrongKind(TokenKind, TokenKind),
    #[error(transparent)]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

impl JWTAuth {
    const ACCESS_EXPIRE_TIME: u64 = 15 * 60;
    const REFRESH_EXPIRE_TIME: u64 = 7 * 24 * 60 * 60;
    const SESSION_EXPIRE_TIME: u64 = 24 * 60 * 60;
    const REMEMBERED_SESSION_EXPIRE_TIME: u64 = 30 * 24 * 60 * 60;

    pub fn from_secret(secret: Vec<u8>) -> JWTAuth {
        JWTAuth {
            encoding_key: EncodingKey::from_secret(&secret),
            decoding_key: DecodingKey::from_secret(&secret),
        }
    }

    pub fn create_access_token(&self, user_id: UserId) -> String {
        self.create_token(user_id, TokenKind::Access, Self::ACCESS_EXPIRE_TIME)
    }

    pub fn create_refresh_token(&self, user_id: UserId) -> String {
        self.create_token(user_id, TokenKind::Refresh, Self::REFRESH_EXPIRE_TIME)
    }

    pub fn create_session_token(&self, user_id: UserId, remember: bool) -> String {
        let expire_time = if remember {
            Self::REMEMBERED_SESSION_EXPIRE_TIME
        } else {
            Self::SESSION_EXPIRE_TIME
        };
        self.create_token(user_id, TokenKind::Session, expire_time)
    }

    fn create_token(&self, user_id: UserId, kind: TokenKind, expire_time: u64) -> String {
        let claims = Claims {
            exp: Self::generate_exp(expire_time),
            sub: user_id,
            kind,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key).unwrap()
    }

    pub fn validate_token(&self, token: &str, kind: TokenKind) -> Result<UserId, TokenError> {
        let claim =
            jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        if claim.claims.kind != kind {
            return Err(TokenError::WrongKind(claim.claims.kind, kind));
        }
        Ok(claim.claims.sub)
    }

    fn generate_exp(expire_time: u64) -> usize {
        (std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + expire_time) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::{JWTAuth, TokenError, TokenKind};
    use base64::Engine;

    fn jwt_auth() -> JWTAuth {
        let secret: [u8; 32] = rand::random();
        JWTAuth::from_secret(secret.to_vec())
    }

    #[test]
    fn valid_access_token() {
        let jwt_auth = jwt_auth();

        let token = jwt_auth.create_access_token(7);
        assert_eq!(jwt_auth.validate_token(&token, TokenKind::Access).unwrap(), 7);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let jwt_auth = jwt_auth();

        let token = jwt_auth.create_refresh_token(7);
        let result = jwt_auth.validate_token(&token, TokenKind::Access);
        assert!(matches!(
            result,
            Err(TokenError::WrongKind(TokenKind::Refresh, TokenKind::Access))
        ));
    }

    #[test]
    fn session_token_is_not_an_api_token() {
        let jwt_auth = jwt_auth();

        let token = jwt_auth.create_session_token(7, false);
        assert!(jwt_auth.validate_token(&token, TokenKind::Access).is_err());
        assert!(jwt_auth
            .validate_token(&token, TokenKind::Session)
            .is_ok());
    }

    #[test]
    fn invalid_token() {
        let jwt_auth = jwt_auth();

        let token_bytes: [u8; 32] = rand::random();
        let base64_engine = base64::engine::general_purpose::STANDARD;
        let token = base64_engine.encode(token_bytes);
        assert!(jwt_auth.validate_token(&token, TokenKind::Access).is_err())
    }
}
