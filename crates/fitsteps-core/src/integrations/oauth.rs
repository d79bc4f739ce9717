//! OAuth2 refresh-token exchange.
//!
//! The refresh token is minted once, out of band, and handed to fitsteps via
//! the environment. Each run trades it for a short-lived access token.

use reqwest::Client;

use crate::error::OAuthError;

/// Client credentials plus the long-lived refresh token.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read `CLIENT_ID`, `CLIENT_SECRET` and `REFRESH_TOKEN`.
    ///
    /// # Errors
    /// Names every variable that is missing or empty.
    pub fn from_env() -> Result<Self, OAuthError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, OAuthError> {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let client_id = read("CLIENT_ID");
        let client_secret = read("CLIENT_SECRET");
        let refresh_token = read("REFRESH_TOKEN");

        match (client_id, client_secret, refresh_token) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Ok(Self {
                client_id,
                client_secret,
                refresh_token,
            }),
            (id, secret, refresh) => {
                let missing: Vec<&str> = [
                    ("CLIENT_ID", id.is_none()),
                    ("CLIENT_SECRET", secret.is_none()),
                    ("REFRESH_TOKEN", refresh.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(OAuthError::CredentialsNotConfigured {
                    missing: missing.join(", "),
                })
            }
        }
    }
}

/// Exchange the refresh token for a fresh bearer access token.
///
/// # Errors
/// Any transport failure, non-success status, `error` field or missing
/// `access_token` is reported as `TokenRefreshFailed`.
pub async fn refresh_access_token(
    client: &Client,
    token_url: &str,
    credentials: &Credentials,
) -> Result<String, OAuthError> {
    let params = [
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("refresh_token", credentials.refresh_token.as_str()),
        ("grant_type", "refresh_token"),
    ];

    let resp = client
        .post(token_url)
        .form(&params)
        .send()
        .await
        .map_err(|e| OAuthError::TokenRefreshFailed(e.to_string()))?;

    let status = resp.status();
    let body: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| OAuthError::TokenRefreshFailed(format!("HTTP {status}: {e}")))?;

    if let Some(error) = body.get("error") {
        return Err(OAuthError::TokenRefreshFailed(format!("HTTP {status}: {error}")));
    }
    if !status.is_success() {
        return Err(OAuthError::TokenRefreshFailed(format!("HTTP {status}")));
    }

    let access_token = body
        .get("access_token")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OAuthError::TokenRefreshFailed("response has no access_token".into()))?
        .to_string();

    let expires_in = body.get("expires_in").and_then(|v| v.as_i64());
    tracing::debug!(expires_in, "access token refreshed");

    Ok(access_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_credentials_from_complete_env() {
        let creds = Credentials::from_lookup(lookup_from(&[
            ("CLIENT_ID", "id"),
            ("CLIENT_SECRET", "secret"),
            ("REFRESH_TOKEN", "refresh"),
        ]))
        .unwrap();
        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.refresh_token, "refresh");
    }

    #[test]
    fn test_credentials_report_every_missing_name() {
        let err = Credentials::from_lookup(lookup_from(&[
            ("CLIENT_ID", "id"),
            ("CLIENT_SECRET", "  "),
        ]))
        .unwrap_err();
        match err {
            OAuthError::CredentialsNotConfigured { missing } => {
                assert_eq!(missing, "CLIENT_SECRET, REFRESH_TOKEN");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials {
            client_id: "id".into(),
            client_secret: "s3cr3t".into(),
            refresh_token: "r3fr3sh".into(),
        };
        let printed = format!("{creds:?}");
        assert!(!printed.contains("s3cr3t"));
        assert!(!printed.contains("r3fr3sh"));
    }

    #[tokio::test]
    async fn test_refresh_posts_form_and_reads_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                mockito::Matcher::UrlEncoded("refresh_token".into(), "r1".into()),
                mockito::Matcher::UrlEncoded("client_id".into(), "cid".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.abc","expires_in":3599,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let creds = Credentials {
            client_id: "cid".into(),
            client_secret: "csec".into(),
            refresh_token: "r1".into(),
        };
        let token = refresh_access_token(&Client::new(), &format!("{}/token", server.url()), &creds)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(token, "ya29.abc");
    }

    #[tokio::test]
    async fn test_refresh_error_body_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#)
            .create_async()
            .await;

        let creds = Credentials {
            client_id: "cid".into(),
            client_secret: "csec".into(),
            refresh_token: "stale".into(),
        };
        let err = refresh_access_token(&Client::new(), &format!("{}/token", server.url()), &creds)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid_grant"));
    }
}
