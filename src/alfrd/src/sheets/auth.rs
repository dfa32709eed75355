//! Service-account authorization: a signed RS256 assertion is exchanged for a
//! short-lived bearer token at the key's `token_uri`.
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::error::{SheetError, SheetResult};
use crate::constants::{GOOGLE_TOKEN_URI, SHEETS_SCOPE, TOKEN_LIFETIME_SECS};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// The fields of a service-account `credentials.json` that matter here.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> SheetResult<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials {}", path.display()))
            .map_err(SheetError::Credentials)?;
        serde_json::from_str(&text)
            .with_context(|| format!("{} is not a service-account key", path.display()))
            .map_err(SheetError::Credentials)
    }

    /// Signed JWT asking for spreadsheet access, valid from `now` for an hour.
    pub fn assertion(&self, now: DateTime<Utc>) -> SheetResult<String> {
        let claims = Claims {
            iss: self.client_email.clone(),
            scope: SHEETS_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + TOKEN_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .context("Invalid private key")
            .map_err(SheetError::Credentials)?;
        encode(&header, &claims, &key)
            .context("Failed to sign assertion")
            .map_err(SheetError::Credentials)
    }
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Tokens are renewed a minute before they run out.
    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(60) >= self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    TOKEN_LIFETIME_SECS
}

#[derive(Debug, Clone)]
pub enum Auth {
    ServiceAccount(ServiceAccountKey),
    /// A token obtained elsewhere, used as is.
    Bearer(String),
}

pub async fn fetch_token(http: &reqwest::Client, key: &ServiceAccountKey) -> SheetResult<AccessToken> {
    let now = Utc::now();
    let assertion = key.assertion(now)?;
    let body = format!(
        "grant_type={}&assertion={}",
        utf8_percent_encode(JWT_BEARER_GRANT, NON_ALPHANUMERIC),
        utf8_percent_encode(&assertion, NON_ALPHANUMERIC)
    );

    let response = http
        .post(&key.token_uri)
        .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SheetError::Credentials(anyhow::anyhow!(
            "token request rejected with status {}: {}",
            status.as_u16(),
            body
        )));
    }

    let token: TokenResponse = response.json().await?;
    tracing::debug!("obtained access token for {}", key.client_email);
    Ok(AccessToken {
        token: token.access_token,
        expires_at: now + Duration::seconds(token.expires_in),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const TEST_PRIVATE_KEY: &str = include_str!("../../tests/fixtures/test_key.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("../../tests/fixtures/test_key.pub.pem");

    pub(crate) fn test_key(token_uri: &str) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "pipeline@alfrd-test.iam.gserviceaccount.com".to_string(),
            private_key: TEST_PRIVATE_KEY.to_string(),
            private_key_id: Some("test-kid".to_string()),
            token_uri: token_uri.to_string(),
        }
    }

    #[test]
    fn test_assertion_claims() {
        let key = test_key("https://oauth2.example.test/token");
        let jwt = key.assertion(Utc::now()).unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["https://oauth2.example.test/token"]);
        let decoded = decode::<Claims>(
            &jwt,
            &DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.header.kid.as_deref(), Some("test-kid"));
        assert_eq!(decoded.claims.iss, key.client_email);
        assert_eq!(decoded.claims.scope, SHEETS_SCOPE);
        assert_eq!(decoded.claims.exp - decoded.claims.iat, TOKEN_LIFETIME_SECS);
    }

    #[test]
    fn test_key_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        let json = serde_json::json!({
            "type": "service_account",
            "client_email": "bot@example.test",
            "private_key": TEST_PRIVATE_KEY,
        });
        write!(file, "{json}").unwrap();

        let key = ServiceAccountKey::from_file(file.path()).unwrap();
        assert_eq!(key.client_email, "bot@example.test");
        assert_eq!(key.token_uri, GOOGLE_TOKEN_URI);
    }

    #[test]
    fn test_missing_or_invalid_key() {
        let err = ServiceAccountKey::from_file(Path::new("/nonexistent/credentials.json")).unwrap_err();
        assert!(matches!(err, SheetError::Credentials(_)));

        let mut key = test_key(GOOGLE_TOKEN_URI);
        key.private_key = "not a pem".to_string();
        assert!(matches!(key.assertion(Utc::now()), Err(SheetError::Credentials(_))));
    }

    #[tokio::test]
    async fn test_fetch_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant%2Dtype%3Ajwt%2Dbearer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.test",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let key = test_key(&format!("{}/token", server.uri()));
        let token = fetch_token(&reqwest::Client::new(), &key).await.unwrap();
        assert_eq!(token.token, "ya29.test");
        assert!(!token.is_expired());
    }

    #[tokio::test]
    async fn test_fetch_token_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let key = test_key(&format!("{}/token", server.uri()));
        let err = fetch_token(&reqwest::Client::new(), &key).await.unwrap_err();
        assert!(err.to_string().contains("invalid_grant"));
    }
}
