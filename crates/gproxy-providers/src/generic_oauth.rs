use async_trait::async_trait;
use gproxy_common::{Provider, Tier};
use gproxy_provider_core::{OAuthCapable, OAuthStart, ProviderError, ProviderResult};
use gproxy_storage::{CredentialRecord, CredentialStatus, PendingSession};
use time::OffsetDateTime;

use crate::pkce;

/// Static per-provider wiring for a standard authorization-code(+PKCE)
/// OAuth flow. Covers gemini-cli, claude, codex, kiro, antigravity and
/// iflow: the providers whose token exchange is a single form-encoded
/// POST.
pub struct OAuthEndpoints {
    pub provider: Provider,
    pub authorize_url: &'static str,
    pub token_url: &'static str,
    pub client_id: &'static str,
    pub scope: &'static str,
    pub redirect_uri: &'static str,
    pub use_pkce: bool,
    pub extra_auth_params: &'static [(&'static str, &'static str)],
    pub userinfo_url: Option<&'static str>,
    pub fixed_region: Option<&'static str>,
    pub incognito: bool,
    pub email_from_jwt_claim: Option<&'static str>,
}

pub struct GenericOAuthProvider {
    pub endpoints: OAuthEndpoints,
    pub client: reqwest::Client,
}

impl GenericOAuthProvider {
    pub fn new(endpoints: OAuthEndpoints, client: reqwest::Client) -> Self {
        Self { endpoints, client }
    }

    fn authorize_url(&self, state: &str, code_challenge: Option<&str>) -> String {
        let mut url = format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            self.endpoints.authorize_url,
            urlencoding::encode(self.endpoints.client_id),
            urlencoding::encode(self.endpoints.redirect_uri),
            urlencoding::encode(self.endpoints.scope),
            urlencoding::encode(state),
        );
        if let Some(challenge) = code_challenge {
            url.push_str(&format!(
                "&code_challenge={}&code_challenge_method=S256",
                urlencoding::encode(challenge)
            ));
        }
        for (key, value) in self.endpoints.extra_auth_params {
            url.push_str(&format!("&{key}={}", urlencoding::encode(value)));
        }
        url
    }

    async fn exchange(&self, form: &[(&str, &str)]) -> ProviderResult<TokenResponse> {
        let resp = self
            .client
            .post(self.endpoints.token_url)
            .form(form)
            .send()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))?;
        if !status.is_success() {
            return Err(ProviderError::Upstream(format!(
                "{} token exchange failed: {status} {}",
                self.endpoints.provider,
                String::from_utf8_lossy(&bytes)
            )));
        }
        serde_json::from_slice(&bytes).map_err(|err| ProviderError::Upstream(err.to_string()))
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Option<UserInfo> {
        let url = self.endpoints.userinfo_url?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.json::<UserInfo>().await.ok()
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, serde::Deserialize)]
struct UserInfo {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[async_trait]
impl OAuthCapable for GenericOAuthProvider {
    fn provider(&self) -> Provider {
        self.endpoints.provider
    }

    async fn start_oauth(&self) -> ProviderResult<OAuthStart> {
        let state = pkce::generate_state();
        let codes = self.endpoints.use_pkce.then(pkce::generate_pkce);
        let authorize_url = self.authorize_url(&state, codes.as_ref().map(|c| c.code_challenge.as_str()));

        let now = OffsetDateTime::now_utc();
        let session = PendingSession {
            state: state.clone(),
            provider: self.endpoints.provider,
            code_verifier: codes.map(|c| c.code_verifier),
            redirect_uri: Some(self.endpoints.redirect_uri.to_string()),
            device_code: None,
            user_code: None,
            verification_uri: None,
            poll_interval: None,
            created_at: now,
            expires_at: now + time::Duration::seconds(PendingSession::DEFAULT_TTL_SECS),
        };

        Ok(OAuthStart {
            authorize_url,
            session,
            incognito: self.endpoints.incognito,
        })
    }

    async fn handle_callback(
        &self,
        session: &PendingSession,
        code: &str,
    ) -> ProviderResult<CredentialRecord> {
        if session.provider != self.endpoints.provider {
            return Err(ProviderError::Session("provider mismatch".to_string()));
        }
        let redirect_uri = session
            .redirect_uri
            .as_deref()
            .unwrap_or(self.endpoints.redirect_uri);

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.endpoints.client_id),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];
        if let Some(verifier) = session.code_verifier.as_deref() {
            form.push(("code_verifier", verifier));
        }
        let tokens = self.exchange(&form).await?;

        let mut email = None;
        if let Some(claim) = self.endpoints.email_from_jwt_claim {
            let source = tokens.id_token.as_deref().unwrap_or(&tokens.access_token);
            email = crate::jwt::decode_unverified_claim(source, claim);
        }
        if email.is_none() {
            if let Some(info) = self.fetch_userinfo(&tokens.access_token).await {
                email = info.email;
            }
        }

        let now = OffsetDateTime::now_utc();
        Ok(CredentialRecord {
            schema_version: gproxy_common::SCHEMA_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            provider: self.endpoints.provider,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens
                .expires_in
                .map(|secs| now + time::Duration::seconds(secs)),
            email,
            name: None,
            project_id: None,
            region: self.endpoints.fixed_region.map(|r| r.to_string()),
            tier: Tier::Unknown,
            status: CredentialStatus::Ready,
            status_message: None,
            disabled: false,
            cooldown_until: None,
            cooldown_reason: None,
            quota_used: None,
            quota_limit: None,
            quota_reset_at: None,
            token_data: None,
            service_account_json: None,
            created_at: now,
            updated_at: now,
            extra: serde_json::Map::new(),
        })
    }

    async fn refresh_token(&self, record: &CredentialRecord) -> ProviderResult<CredentialRecord> {
        let Some(refresh_token) = record.refresh_token.as_deref() else {
            return Err(ProviderError::InvalidConfig(
                "no refresh_token on record".to_string(),
            ));
        };
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.endpoints.client_id),
            ("refresh_token", refresh_token),
        ];
        let tokens = self.exchange(&form).await?;

        let mut updated = record.clone();
        let now = OffsetDateTime::now_utc();
        updated.access_token = tokens.access_token;
        if let Some(new_refresh) = tokens.refresh_token {
            updated.refresh_token = Some(new_refresh);
        }
        updated.expires_at = tokens
            .expires_in
            .map(|secs| now + time::Duration::seconds(secs));
        updated.status = CredentialStatus::Ready;
        updated.status_message = None;
        updated.updated_at = now;
        Ok(updated)
    }
}
