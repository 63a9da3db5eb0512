//! Axum extractor that resolves the `X-User-Id` request header into a
//! [`UserContext`] (spec §6: the requesting user is identified by a header
//! carrying their id as a decimal string). Grounded on the teacher's
//! `AuthUser` extractor shape, re-keyed from a session cookie to a header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::context::UserContext;
use crate::error::Error;
use crate::model::UserId;
use crate::state::AppState;
use crate::web::error::ApiError;

const USER_ID_HEADER: &str = "x-user-id";

/// The requesting user's resolved context.
pub struct CurrentUser(pub UserContext);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(Error::Unauthenticated)?;
        let user_id: i64 = raw.parse().map_err(|_| Error::Unauthenticated)?;
        let user = UserId(user_id);

        let row = state
            .stores
            .find_app_user(user)
            .await?
            .ok_or_else(|| Error::not_found("no such user"))?;

        let timezone: chrono_tz::Tz = row
            .timezone
            .parse()
            .map_err(|_| Error::Internal(anyhow::anyhow!("invalid timezone stored for user {user}")))?;
        let first_day_of_week = row
            .first_day_of_week
            .and_then(|n| u8::try_from(n).ok())
            .and_then(|n| chrono::Weekday::try_from(n).ok());

        Ok(CurrentUser(UserContext::new(user, timezone, first_day_of_week, row.ignore_short_events)))
    }
}
