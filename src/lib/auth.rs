use serde::{Deserialize, Serialize};
use jsonwebtoken::errors::Error as JwtError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use actix_web::dev::Payload;
use actix_web::{Error, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use crate::{game::Username, lib::error::InternalError};

/// Out of scope: registration/login and the CSRF/session-cookie dance that produces the bearer
/// token live in the surrounding application. The core only ever sees the resulting identity.
fn jwt_secret() -> String {
    crate::lib::get_env("JWT_SECRET", "secret")
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Claims {
    pub username: Username,
    pub exp: usize,
}

impl Claims {
    /// Extracts the bearer token from an `Authorization: Bearer <token>` header.
    fn from_header(req: &HttpRequest) -> crate::lib::Result<Self> {
        let header = req.headers().get("Authorization")
            .ok_or(InternalError::Unauthenticated)?
            .to_str()
            .map_err(|_| InternalError::Unauthenticated)?;
        let token = header.split(' ').last().ok_or(InternalError::Unauthenticated)?;
        decode_jwt(token).map_err(Into::into)
    }
}

impl FromRequest for Claims {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Self::from_header(req).map_err(Into::into))
    }
}

pub fn create_jwt(claims: Claims) -> Result<String, JwtError> {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret().as_bytes()),
    )
}

pub fn decode_jwt(token: &str) -> Result<Claims, JwtError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret().as_bytes()),
        &Validation::default()
    ).map(|data| data.claims)
}
