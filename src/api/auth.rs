//! HTTP Basic authentication for `queryauth`

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::api::error::FdsnError;
use crate::config::AuthConfig;

/// Decode `Authorization: Basic <base64(user:password)>`
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Authenticated username, or 401
pub fn authenticate(auth: &AuthConfig, headers: &HeaderMap) -> Result<String, FdsnError> {
    match basic_credentials(headers) {
        Some((username, password)) if auth.verify(&username, &password) => Ok(username),
        Some((username, _)) => {
            tracing::info!(username = %username, "Rejected queryauth credentials");
            Err(FdsnError::Unauthorized)
        }
        None => Err(FdsnError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserCredentials;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_basic_credentials() {
        let encoded = STANDARD.encode("random:secret:with:colons");
        let (user, password) = basic_credentials(&headers(&format!("Basic {}", encoded))).unwrap();
        assert_eq!(user, "random");
        assert_eq!(password, "secret:with:colons");

        assert!(basic_credentials(&HeaderMap::new()).is_none());
        assert!(basic_credentials(&headers("Bearer abc")).is_none());
        assert!(basic_credentials(&headers("Basic !!!")).is_none());
    }

    #[test]
    fn test_authenticate() {
        let auth = AuthConfig {
            users: vec![UserCredentials {
                username: "random".into(),
                password: "random".into(),
            }],
        };

        let good = headers(&format!("Basic {}", STANDARD.encode("random:random")));
        assert_eq!(authenticate(&auth, &good).unwrap(), "random");

        let bad = headers(&format!("Basic {}", STANDARD.encode("random:nope")));
        assert!(matches!(authenticate(&auth, &bad), Err(FdsnError::Unauthorized)));
        assert!(matches!(
            authenticate(&auth, &HeaderMap::new()),
            Err(FdsnError::Unauthorized)
        ));
    }
}
