//! LinkedIn adapter (UGC posts API)

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use super::{
    fetch_json, id_field, json_body, missing_id, network_error, non_blank, remote_error, require,
    secret, PlatformAdapter, Submission,
};
use crate::config::{LinkedInConfig, UrnPolicy};
use crate::error::PlatformError;
use crate::types::{AccountCheck, Content, Platform, PostMetrics};

/// URN prefixes accepted as-is for a post author
pub const AUTHOR_PREFIXES: [&str; 4] = [
    "urn:li:person:",
    "urn:li:member:",
    "urn:li:organization:",
    "urn:li:company:",
];

const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";

pub struct LinkedInAdapter {
    client: Client,
    api_base: String,
    access_token: Option<SecretString>,
    author_urn: Option<String>,
    urn_policy: UrnPolicy,
}

impl LinkedInAdapter {
    pub fn new(client: Client, config: &LinkedInConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: secret(config.access_token.as_deref()),
            author_urn: non_blank(config.author_urn.as_deref()),
            urn_policy: config.urn_policy,
        }
    }
}

/// Normalise a configured author identifier into a URN.
///
/// Well-formed person, member, organization and company URNs pass through,
/// and `urn:li:organisation:` is corrected to `urn:li:company:`. Under
/// [`UrnPolicy::Lenient`] a bare id is taken to be a person id and other
/// `urn:li:` forms pass through; [`UrnPolicy::Strict`] rejects both.
///
/// # Errors
///
/// `PlatformError::Configuration` when the identifier is empty or, under the
/// strict policy, not one of the accepted forms.
pub fn normalize_urn(raw: &str, policy: UrnPolicy) -> Result<String, PlatformError> {
    let urn = raw.trim();
    if urn.is_empty() {
        return Err(PlatformError::Configuration(
            "LinkedIn author URN is empty".to_string(),
        ));
    }

    if AUTHOR_PREFIXES
        .iter()
        .any(|prefix| urn.len() > prefix.len() && urn.starts_with(prefix))
    {
        return Ok(urn.to_string());
    }

    if let Some(id) = urn.strip_prefix("urn:li:organisation:") {
        if !id.is_empty() {
            return Ok(format!("urn:li:company:{}", id));
        }
    }

    let rejected = || {
        PlatformError::Configuration(format!(
            "LinkedIn author URN '{}' must start with one of: {}",
            urn,
            AUTHOR_PREFIXES.join(", ")
        ))
    };

    match policy {
        UrnPolicy::Strict => Err(rejected()),
        UrnPolicy::Lenient if urn.starts_with("urn:") => {
            if urn.starts_with("urn:li:") {
                Ok(urn.to_string())
            } else {
                Err(rejected())
            }
        }
        UrnPolicy::Lenient => {
            tracing::warn!(author = %urn, "Treating bare LinkedIn author id as a person URN");
            Ok(format!("urn:li:person:{}", urn))
        }
    }
}

pub fn share_body(author: &str, text: &str) -> Value {
    json!({
        "author": author,
        "lifecycleState": "PUBLISHED",
        "specificContent": {
            "com.linkedin.ugc.ShareContent": {
                "shareCommentary": { "text": text },
                "shareMediaCategory": "NONE"
            }
        },
        "visibility": {
            "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
        }
    })
}

pub fn post_url(id: &str) -> String {
    format!("https://www.linkedin.com/feed/update/{}", id)
}

fn error_message(json: &Value) -> Option<String> {
    json.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Read-only path that proves the token can act as `author`
pub fn profile_path(author: &str) -> Result<String, PlatformError> {
    if author.starts_with("urn:li:person:") || author.starts_with("urn:li:member:") {
        return Ok("/v2/me".to_string());
    }
    for prefix in ["urn:li:organization:", "urn:li:company:"] {
        if let Some(id) = author.strip_prefix(prefix) {
            return Ok(format!("/v2/organizations/{}", id));
        }
    }
    Err(PlatformError::Unsupported(format!(
        "Cannot verify LinkedIn author '{}'",
        author
    )))
}

fn explain_auth_failure(error: PlatformError) -> PlatformError {
    match error {
        PlatformError::RemoteApi { status: 401, .. } => PlatformError::RemoteApi {
            status: 401,
            message: "access token is invalid or expired".to_string(),
        },
        PlatformError::RemoteApi { status: 403, .. } => PlatformError::RemoteApi {
            status: 403,
            message: "access denied for the configured author".to_string(),
        },
        other => other,
    }
}

fn display_name(json: &Value) -> Option<String> {
    if let Some(name) = json.get("localizedName").and_then(Value::as_str) {
        return Some(name.to_string());
    }
    let first = json.get("localizedFirstName").and_then(Value::as_str)?;
    match json.get("localizedLastName").and_then(Value::as_str) {
        Some(last) => Some(format!("{} {}", first, last)),
        None => Some(first.to_string()),
    }
}

#[async_trait]
impl PlatformAdapter for LinkedInAdapter {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    fn is_configured(&self) -> bool {
        self.access_token.is_some() && self.author_urn.is_some()
    }

    async fn submit(&self, _content: &Content, text: &str) -> Result<Submission, PlatformError> {
        let token = require(self.access_token.as_ref(), Platform::LinkedIn, "access token")?;
        let raw_urn = require(self.author_urn.as_deref(), Platform::LinkedIn, "author URN")?;
        let author = normalize_urn(raw_urn, self.urn_policy)?;

        let response = self
            .client
            .post(format!("{}/v2/ugcPosts", self.api_base))
            .bearer_auth(token.expose_secret())
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION)
            .json(&share_body(&author, text))
            .send()
            .await
            .map_err(network_error)?;

        if response.status() != StatusCode::CREATED {
            return Err(remote_error(response, error_message).await);
        }

        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let json = json_body(response).await.unwrap_or(Value::Null);

        let id = id_field(&json, "/id")
            .or(header_id)
            .ok_or_else(|| missing_id(Platform::LinkedIn))?;
        let url = post_url(&id);
        Ok(Submission::single(id, Some(url)))
    }

    async fn verify(&self) -> Result<AccountCheck, PlatformError> {
        let token = require(self.access_token.as_ref(), Platform::LinkedIn, "access token")?;
        let raw_urn = require(self.author_urn.as_deref(), Platform::LinkedIn, "author URN")?;
        let author = normalize_urn(raw_urn, self.urn_policy)?;

        let json = fetch_json(
            self.client
                .get(format!("{}{}", self.api_base, profile_path(&author)?))
                .bearer_auth(token.expose_secret())
                .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION),
            error_message,
        )
        .await
        .map_err(explain_auth_failure)?;

        let account = match display_name(&json) {
            Some(name) => format!("{} ({})", name, author),
            None => author,
        };
        Ok(AccountCheck {
            platform: Platform::LinkedIn,
            account,
        })
    }

    async fn metrics(&self, _post_id: &str) -> Result<PostMetrics, PlatformError> {
        Err(PlatformError::Unsupported(
            "LinkedIn post metrics need Marketing API permissions".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentType;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer, urn: Option<&str>, policy: UrnPolicy) -> LinkedInAdapter {
        LinkedInAdapter::new(
            Client::new(),
            &LinkedInConfig {
                access_token: Some("li-token".to_string()),
                author_urn: urn.map(str::to_string),
                urn_policy: policy,
                api_base: server.uri(),
            },
        )
    }

    fn content(text: &str) -> Content {
        Content::new(text.to_string(), vec![], Platform::LinkedIn, ContentType::Post)
    }

    #[test]
    fn test_normalize_urn_accepts_known_prefixes() {
        for urn in [
            "urn:li:person:abc",
            "urn:li:member:123",
            "urn:li:organization:42",
            "urn:li:company:42",
        ] {
            assert_eq!(normalize_urn(urn, UrnPolicy::Strict).unwrap(), urn);
            assert_eq!(normalize_urn(urn, UrnPolicy::Lenient).unwrap(), urn);
        }
    }

    #[test]
    fn test_normalize_urn_corrects_organisation_spelling() {
        assert_eq!(
            normalize_urn("urn:li:organisation:77", UrnPolicy::Lenient).unwrap(),
            "urn:li:company:77"
        );
    }

    #[test]
    fn test_normalize_urn_bare_id_depends_on_policy() {
        assert_eq!(
            normalize_urn(" abc123 ", UrnPolicy::Lenient).unwrap(),
            "urn:li:person:abc123"
        );
        assert!(matches!(
            normalize_urn("abc123", UrnPolicy::Strict),
            Err(PlatformError::Configuration(_))
        ));
    }

    #[test]
    fn test_normalize_urn_unknown_li_form() {
        assert_eq!(
            normalize_urn("urn:li:group:9", UrnPolicy::Lenient).unwrap(),
            "urn:li:group:9"
        );
        assert!(normalize_urn("urn:li:group:9", UrnPolicy::Strict).is_err());
        assert!(normalize_urn("urn:other:1", UrnPolicy::Lenient).is_err());
        assert!(normalize_urn("urn:li:person:", UrnPolicy::Strict).is_err());
        assert!(normalize_urn("   ", UrnPolicy::Lenient).is_err());
    }

    #[tokio::test]
    async fn test_post_sends_ugc_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .and(header("authorization", "Bearer li-token"))
            .and(header("x-restli-protocol-version", "2.0.0"))
            .and(body_partial_json(json!({
                "author": "urn:li:person:abc",
                "lifecycleState": "PUBLISHED",
                "specificContent": {
                    "com.linkedin.ugc.ShareContent": {
                        "shareCommentary": {"text": "Quarterly update"},
                        "shareMediaCategory": "NONE"
                    }
                }
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"id": "urn:li:share:555"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = adapter(&server, Some("abc"), UrnPolicy::Lenient)
            .post(&content("Quarterly update"))
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.post_id(), Some("urn:li:share:555"));
        assert_eq!(
            result.url.as_deref(),
            Some("https://www.linkedin.com/feed/update/urn:li:share:555")
        );
    }

    #[tokio::test]
    async fn test_post_reads_id_from_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(ResponseTemplate::new(201).insert_header("x-restli-id", "urn:li:share:9"))
            .mount(&server)
            .await;

        let result = adapter(&server, Some("urn:li:person:abc"), UrnPolicy::Strict)
            .post(&content("Hello"))
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.post_id(), Some("urn:li:share:9"));
    }

    #[tokio::test]
    async fn test_non_created_status_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "serviceErrorCode": 65600,
                "message": "Invalid access token",
                "status": 401
            })))
            .mount(&server)
            .await;

        let result = adapter(&server, Some("urn:li:person:abc"), UrnPolicy::Lenient)
            .post(&content("Hello"))
            .await;

        assert!(!result.success);
        assert_eq!(result.status_code, Some(401));
        assert_eq!(
            result.error.as_deref(),
            Some("Remote API error (401): Invalid access token")
        );
    }

    #[tokio::test]
    async fn test_missing_author_or_strict_rejection_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let no_author = adapter(&server, None, UrnPolicy::Lenient);
        assert!(!no_author.is_configured());
        let result = no_author.post(&content("Hello")).await;
        assert!(result.error.unwrap().contains("author URN is not configured"));

        let strict = adapter(&server, Some("abc"), UrnPolicy::Strict);
        let result = strict.post(&content("Hello")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("must start with one of"));
    }

    #[tokio::test]
    async fn test_long_text_is_capped_before_submission() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "urn:li:share:1"})))
            .mount(&server)
            .await;

        let adapter = adapter(&server, Some("urn:li:person:abc"), UrnPolicy::Lenient);
        let result = adapter.post(&content(&"insight ".repeat(400))).await;
        assert!(result.success);

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let sent = body
            .pointer("/specificContent/com.linkedin.ugc.ShareContent/shareCommentary/text")
            .and_then(Value::as_str)
            .unwrap();
        assert!(sent.chars().count() <= Platform::LinkedIn.limits().practical_length);
    }

    #[test]
    fn test_profile_path_by_author_kind() {
        assert_eq!(profile_path("urn:li:person:abc").unwrap(), "/v2/me");
        assert_eq!(profile_path("urn:li:member:1").unwrap(), "/v2/me");
        assert_eq!(
            profile_path("urn:li:organization:42").unwrap(),
            "/v2/organizations/42"
        );
        assert_eq!(
            profile_path("urn:li:company:42").unwrap(),
            "/v2/organizations/42"
        );
        assert!(matches!(
            profile_path("urn:li:group:9"),
            Err(PlatformError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_person_reads_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/me"))
            .and(header("authorization", "Bearer li-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "abc",
                "localizedFirstName": "Ada",
                "localizedLastName": "Lovelace"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let check = adapter(&server, Some("abc"), UrnPolicy::Lenient)
            .verify()
            .await
            .unwrap();

        assert_eq!(check.account, "Ada Lovelace (urn:li:person:abc)");
    }

    #[tokio::test]
    async fn test_verify_company_reads_organization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/organizations/77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 77, "localizedName": "Acme"})))
            .expect(1)
            .mount(&server)
            .await;

        let check = adapter(&server, Some("urn:li:organisation:77"), UrnPolicy::Strict)
            .verify()
            .await
            .unwrap();

        assert_eq!(check.account, "Acme (urn:li:company:77)");
    }

    #[tokio::test]
    async fn test_verify_explains_auth_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/organizations/42"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Not enough permissions"})))
            .mount(&server)
            .await;

        let person = adapter(&server, Some("urn:li:person:abc"), UrnPolicy::Strict)
            .verify()
            .await
            .unwrap_err();
        assert_eq!(
            person.to_string(),
            "Remote API error (401): access token is invalid or expired"
        );

        let company = adapter(&server, Some("urn:li:organization:42"), UrnPolicy::Strict)
            .verify()
            .await
            .unwrap_err();
        assert_eq!(company.status_code(), Some(403));
        assert!(company.to_string().contains("access denied"));
    }

    #[tokio::test]
    async fn test_metrics_are_unsupported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = adapter(&server, Some("urn:li:person:abc"), UrnPolicy::Strict)
            .metrics("urn:li:share:1")
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Unsupported(_)));
    }
}
