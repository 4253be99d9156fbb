//! Admin login and bot identity lookup.
//!
//! Every invocation logs in afresh as the administrative account (password is the MD5 hex
//! digest of the account name, a fixed scheme for the trusted internal channel) and then
//! looks up the bot's public profile with the admin token.

use crate::http::{post_json, ApiEnvelope, CallContext, TransportError};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("admin login transport: {0}")]
    Transport(#[from] TransportError),
    #[error("admin login response undecodable: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("admin login rejected ({code}): {message}")]
    Api { code: i32, message: String },
    #[error("admin login returned no admin token")]
    MissingToken,
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("user lookup transport: {0}")]
    Transport(#[from] TransportError),
    #[error("user lookup response undecodable: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("user lookup rejected ({code}): {message}")]
    Api { code: i32, message: String },
    #[error("bot user {0} not found")]
    NotFound(String),
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    account: &'a str,
    password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminLoginData {
    #[serde(default)]
    admin_token: String,
    #[serde(default)]
    im_token: String,
    #[serde(default, rename = "adminUserID")]
    admin_user_id: String,
}

/// Tokens from one admin login, valid for the current invocation only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Authorizes directory lookups.
    pub admin_token: String,
    /// Authorizes sends as the bot.
    pub im_token: String,
}

#[derive(Debug, Serialize)]
struct FindUserRequest<'a> {
    #[serde(rename = "userIDs")]
    user_ids: [&'a str; 1],
}

#[derive(Debug, Default, Deserialize)]
struct FindUserData {
    #[serde(default)]
    users: Vec<BotIdentity>,
}

/// Public profile of the bot account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotIdentity {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default, rename = "faceURL")]
    pub face_url: String,
}

/// Lowercase hex MD5 of the account identifier.
pub fn password_digest(account: &str) -> String {
    format!("{:x}", md5::compute(account.as_bytes()))
}

/// Client for the admin API (login) and chat API (user lookup).
#[derive(Clone)]
pub struct IdentityClient {
    admin_api: String,
    chat_api: String,
    client: reqwest::Client,
}

impl IdentityClient {
    pub fn new(admin_api: &str, chat_api: &str, client: reqwest::Client) -> Self {
        Self {
            admin_api: crate::config::normalize_base_url(admin_api),
            chat_api: crate::config::normalize_base_url(chat_api),
            client,
        }
    }

    /// POST /account/login as `account`.
    pub async fn login(
        &self,
        ctx: &CallContext,
        account: &str,
        timeout_secs: u64,
    ) -> Result<TokenPair, AuthError> {
        let url = format!("{}/account/login", self.admin_api);
        let req = LoginRequest {
            account,
            password: password_digest(account),
        };
        let body = post_json(&self.client, ctx, &url, &[], &req, timeout_secs).await?;
        let envelope: ApiEnvelope<AdminLoginData> =
            serde_json::from_slice(&body).map_err(AuthError::Decode)?;
        let data = envelope
            .into_result()
            .map_err(|(code, message)| AuthError::Api { code, message })?
            .unwrap_or_default();
        if data.admin_token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        log::debug!("admin login ok (adminUserID {})", data.admin_user_id);
        Ok(TokenPair {
            admin_token: data.admin_token,
            im_token: data.im_token,
        })
    }

    /// POST /user/find/public for the single bot user id, authorized by the admin token.
    pub async fn resolve_bot_identity(
        &self,
        ctx: &CallContext,
        admin_token: &str,
        bot_user_id: &str,
        timeout_secs: u64,
    ) -> Result<BotIdentity, LookupError> {
        let url = format!("{}/user/find/public", self.chat_api);
        let req = FindUserRequest {
            user_ids: [bot_user_id],
        };
        let body = post_json(
            &self.client,
            ctx,
            &url,
            &[("token", admin_token)],
            &req,
            timeout_secs,
        )
        .await?;
        let envelope: ApiEnvelope<FindUserData> =
            serde_json::from_slice(&body).map_err(LookupError::Decode)?;
        let data = envelope
            .into_result()
            .map_err(|(code, message)| LookupError::Api { code, message })?
            .unwrap_or_default();
        data.users
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::NotFound(bot_user_id.to_string()))
    }
}
