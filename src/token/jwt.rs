//! JWT Expiry
//!
//! Reads the `exp` claim of a JWT access token. The signature is not checked
//! and no other claim is interpreted; this only answers "when does it expire".

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::Deserialize;

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Expiry of a JWT access token, or `None` if it is not a JWT with `exp`.
pub fn expiry_from_jwt(token: &str) -> Option<DateTime<Utc>> {
    let header = decode_header(token).ok()?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    DateTime::from_timestamp(data.claims.exp, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        aud: String,
        exp: i64,
    }

    #[test]
    fn test_reads_exp_claim_without_key() {
        let exp = 2_000_000_000;
        let token = encode(
            &Header::default(),
            &Claims {
                sub: "user".to_string(),
                aud: "api".to_string(),
                exp,
            },
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap();

        assert_eq!(expiry_from_jwt(&token), DateTime::from_timestamp(exp, 0));
    }

    #[test]
    fn test_opaque_token_has_no_expiry() {
        assert_eq!(expiry_from_jwt("opaque-access-token"), None);
    }
}
