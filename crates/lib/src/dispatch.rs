//! Reply dispatch through the IM API (`POST /msg/send_msg`).

use crate::content::{ContentMap, ContentType};
use crate::http::{post_json, ApiEnvelope, CallContext, TransportError};
use crate::identity::BotIdentity;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("send transport: {0}")]
    Transport(#[from] TransportError),
    #[error("send response undecodable: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("send rejected ({code}): {message}")]
    Api { code: i32, message: String },
}

/// Sender-side descriptor of the message; flattened into the request next to `recvID`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMsg {
    #[serde(rename = "sendID")]
    pub send_id: String,
    pub sender_nickname: String,
    #[serde(rename = "senderFaceURL")]
    pub sender_face_url: String,
    #[serde(rename = "senderPlatformID")]
    pub sender_platform_id: i32,
    pub content: ContentMap,
    pub content_type: ContentType,
    pub session_type: i32,
    /// Milliseconds since the Unix epoch.
    pub send_time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMsgReq {
    #[serde(rename = "recvID")]
    pub recv_id: String,
    #[serde(flatten)]
    pub send_msg: SendMsg,
}

/// Identifiers the platform assigned to the sent message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMsgResp {
    #[serde(default, rename = "serverMsgID")]
    pub server_msg_id: String,
    #[serde(default, rename = "clientMsgID")]
    pub client_msg_id: String,
    #[serde(default, rename = "sendTime")]
    pub send_time: i64,
}

/// Everything about the reply that is not the bot identity or the content.
#[derive(Debug, Clone)]
pub struct Reply<'a> {
    /// Recipient of the reply (the original sender).
    pub recv_id: &'a str,
    pub content_type: ContentType,
    pub session_type: i32,
    pub sender_platform_id: i32,
    pub content: ContentMap,
}

/// Client for the IM send API.
#[derive(Clone)]
pub struct Dispatcher {
    base_url: String,
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: crate::config::normalize_base_url(base_url),
            client,
        }
    }

    /// Build the send request for `reply` as `bot`, stamped with the current time.
    pub fn build_request(bot: &BotIdentity, reply: Reply<'_>) -> SendMsgReq {
        SendMsgReq {
            recv_id: reply.recv_id.to_string(),
            send_msg: SendMsg {
                send_id: bot.user_id.clone(),
                sender_nickname: bot.nickname.clone(),
                sender_face_url: bot.face_url.clone(),
                sender_platform_id: reply.sender_platform_id,
                content: reply.content,
                content_type: reply.content_type,
                session_type: reply.session_type,
                send_time: chrono::Utc::now().timestamp_millis(),
            },
        }
    }

    /// POST /msg/send_msg with the IM token and return the platform's message identifiers.
    pub async fn send(
        &self,
        ctx: &CallContext,
        bot: &BotIdentity,
        im_token: &str,
        reply: Reply<'_>,
        timeout_secs: u64,
    ) -> Result<SendMsgResp, SendError> {
        let url = format!("{}/msg/send_msg", self.base_url);
        let req = Self::build_request(bot, reply);
        let body = post_json(
            &self.client,
            ctx,
            &url,
            &[("token", im_token)],
            &req,
            timeout_secs,
        )
        .await?;
        let envelope: ApiEnvelope<SendMsgResp> =
            serde_json::from_slice(&body).map_err(SendError::Decode)?;
        let data = envelope
            .into_result()
            .map_err(|(code, message)| SendError::Api { code, message })?
            .unwrap_or_default();
        Ok(data)
    }
}
