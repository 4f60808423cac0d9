//! Semantic checks on a verified claim set

use crate::claims::{ClaimSet, ClaimValue, EXP};
use crate::error::{AuthError, Result};
use chrono::{DateTime, Utc};

/// Confirm `exp` is present, numeric, and not before `now`.
pub fn validate_claims(claims: &ClaimSet, now: DateTime<Utc>) -> Result<()> {
    let exp = match claims.get(EXP) {
        None => return Err(AuthError::MissingExpField),
        Some(ClaimValue::Number(exp)) => *exp as i64,
        Some(_) => return Err(AuthError::WrongFormatOfExp),
    };

    if exp < now.timestamp() {
        return Err(AuthError::ExpiredToken);
    }

    Ok(())
}
