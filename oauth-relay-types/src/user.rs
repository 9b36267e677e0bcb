/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! User-facing identity extracted from a transport bundle.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bundle::{decode_bundle, TokenBundle};
use crate::error::CodecError;
use crate::jwt::decode_compact;

const ID_TOKEN_NAME_CLAIMS: &[&str] = &["name", "email"];
const ACCESS_TOKEN_NAME_CLAIMS: &[&str] = &["username", "email", "sub"];

/// Identity shown to the user once signed in.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub authenticated: bool,
    pub name: String,
    pub id: String,
}

/// Everything the browser needs from one bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTokens {
    pub bundle: TokenBundle,
    /// Payload of the id token (or of the access token when the provider
    /// returned no id token).
    pub id_claims: Map<String, Value>,
    pub user: User,
    pub refresh_token: Option<String>,
}

/// Decode a base64 bundle and the identity it carries.
///
/// The display name is the id token's `name`, then `email`. Without an id
/// token the access token payload is used instead (`username`, `email`,
/// then `sub`). Signatures are not checked: bundles only reach the browser
/// after the relay backend verified the access token.
pub fn parse_tokens(encoded: &str) -> Result<ParsedTokens, CodecError> {
    let bundle = decode_bundle(encoded)?;

    let (claims, name_claims) = match bundle.id_token.as_deref() {
        Some(id_token) => (decode_compact(id_token)?.payload, ID_TOKEN_NAME_CLAIMS),
        None => (
            decode_compact(&bundle.access_token)?.payload,
            ACCESS_TOKEN_NAME_CLAIMS,
        ),
    };

    let str_claim = |name: &str| {
        claims
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };

    let name = name_claims
        .iter()
        .find_map(|c| str_claim(*c))
        .unwrap_or_default()
        .to_string();
    let id = str_claim("sub").unwrap_or_default().to_string();

    let user = User {
        authenticated: true,
        name,
        id,
    };
    let refresh_token = bundle.refresh_token.clone();

    Ok(ParsedTokens {
        bundle,
        id_claims: claims,
        user,
        refresh_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::encode_bundle;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;

    fn unsigned(payload: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        format!("{header}.{body}.")
    }

    #[test]
    fn name_comes_from_id_token() {
        let mut bundle = TokenBundle::with_access_token(unsigned(json!({ "sub": "u1" })));
        bundle.id_token = Some(unsigned(json!({
            "sub": "u1",
            "name": "Ada Lovelace",
            "email": "ada@example.com",
        })));
        bundle.refresh_token = Some("r1".into());

        let parsed = parse_tokens(&encode_bundle(&bundle)).unwrap();

        assert_eq!(
            parsed.user,
            User {
                authenticated: true,
                name: "Ada Lovelace".into(),
                id: "u1".into()
            }
        );
        assert_eq!(parsed.refresh_token.as_deref(), Some("r1"));
        assert_eq!(parsed.id_claims.get("email"), Some(&json!("ada@example.com")));
    }

    #[test]
    fn email_is_the_fallback_name() {
        let mut bundle = TokenBundle::with_access_token(unsigned(json!({ "sub": "u2" })));
        bundle.id_token = Some(unsigned(json!({ "sub": "u2", "email": "bob@example.com" })));

        let parsed = parse_tokens(&encode_bundle(&bundle)).unwrap();
        assert_eq!(parsed.user.name, "bob@example.com");
        assert_eq!(parsed.refresh_token, None);
    }

    #[test]
    fn access_token_used_without_id_token() {
        let bundle = TokenBundle::with_access_token(unsigned(json!({
            "sub": "u3",
            "username": "carol",
        })));

        let parsed = parse_tokens(&encode_bundle(&bundle)).unwrap();
        assert_eq!(parsed.user.name, "carol");
        assert_eq!(parsed.user.id, "u3");
    }

    #[test]
    fn malformed_id_token_fails() {
        let mut bundle = TokenBundle::with_access_token(unsigned(json!({ "sub": "u" })));
        bundle.id_token = Some("not-a-jwt".into());
        let err = parse_tokens(&encode_bundle(&bundle)).unwrap_err();
        assert!(matches!(err, CodecError::MalformedToken(_)));
    }

    #[test]
    fn garbage_bundle_fails() {
        let err = parse_tokens("***").unwrap_err();
        assert!(matches!(err, CodecError::MalformedBundle(_)));
    }
}
