//! JWT authentication: token claims, extractors, and the login endpoints.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::request::Parts,
    Json, RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    db::Filter,
    models::{User, UserID},
    user::USERS,
    Error,
};

/// How long an issued token stays valid.
const TOKEN_LIFETIME_DAYS: i64 = 7;

/// The contents of a JSON Web Token.
///
/// Extracting this type from a request rejects with a 401 when the bearer
/// token is missing or invalid; handlers that can serve anonymous requests
/// should extract [OptionalClaims] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the authenticated user.
    pub id: UserID,
    /// The username at the time the token was issued.
    pub username: String,
    /// The display name at the time the token was issued.
    pub name: String,
    /// The time the token was issued.
    pub iat: usize,
    /// The expiry time of the token.
    pub exp: usize,
}

#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    AppConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::InvalidToken)?;

        let config = AppConfig::from_ref(state);

        decode_token(bearer.token(), config.decoding_key())
    }
}

/// An identity that may be absent.
///
/// Mirrors the pass-through middleware of the HTTP layer: a missing or
/// invalid token leaves the request unauthenticated instead of rejecting it,
/// and the handler decides whether an identity is required.
#[derive(Debug, Clone)]
pub struct OptionalClaims(pub Option<Claims>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalClaims
where
    AppConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Claims::from_request_parts(parts, state).await.ok()))
    }
}

/// Issue a signed token for `user`.
pub fn encode_token(user: &User, encoding_key: &EncodingKey) -> Result<String, Error> {
    let now = Utc::now();
    let claims = Claims {
        id: user.id,
        username: user.username.clone(),
        name: user.name.clone(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, encoding_key).map_err(|_| Error::TokenCreation)
}

fn decode_token(token: &str, decoding_key: &DecodingKey) -> Result<Claims, Error> {
    decode(token, decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| Error::InvalidToken)
}

/// The credentials entered during login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// The username entered during login (matched case-insensitively).
    pub username: Option<String>,
    /// The password entered during login.
    pub password: Option<String>,
}

/// The response to a successful login.
#[derive(Serialize)]
pub struct LoginResponse {
    /// The signed bearer token.
    pub token: String,
    /// The logged-in user, minus the password hash.
    pub user: User,
}

/// Handler for login requests.
///
/// # Errors
/// Returns a 400 when the username or password is missing, and a 401 when
/// the username is unknown or the password does not match.
pub async fn login(
    State(state): State<AppConfig>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, Error> {
    let (Some(username), Some(password)) = (payload.username, payload.password) else {
        return Err(Error::Validation("Missing username or password.".to_string()));
    };

    let connection = state.db_connection()?;

    let user = USERS
        .find_one(
            &connection,
            &Filter::new().eq("username", username.to_lowercase()),
        )?
        .ok_or(Error::InvalidCredentials)?;

    let password = crate::models::RawPassword::new_unchecked(password);
    if !user.password_hash.verify(&password)? {
        return Err(Error::InvalidCredentials);
    }

    let token = encode_token(&user, state.encoding_key())?;

    Ok(Json(LoginResponse { token, user }))
}

/// Handler for requests for the authenticated user's own record.
///
/// # Errors
/// Returns a 401 when the token is missing or invalid (via the [Claims]
/// extractor) and a 404 when the user row no longer exists.
pub async fn me(State(state): State<AppConfig>, claims: Claims) -> Result<Json<User>, Error> {
    let connection = state.db_connection()?;

    USERS
        .find_one(&connection, &Filter::new().eq("id", claims.id))?
        .map(Json)
        .ok_or(Error::NotFound("User"))
}
