//! Webhook wire types: the after-send callback body and the fixed acknowledgment shapes.

use crate::content::ContentType;
use serde::{Deserialize, Serialize};

/// Callback body for `callbackAfterSendSingleMsgCommand`.
///
/// `content` is the message element JSON-encoded as a string; its shape depends on `contentType`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackAfterSendSingleMsgReq {
    #[serde(default, rename = "sendID")]
    pub send_id: String,
    #[serde(default, rename = "recvID")]
    pub recv_id: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "senderPlatformID")]
    pub sender_platform_id: i32,
    #[serde(default)]
    pub session_type: i32,
    #[serde(default)]
    pub callback_command: String,
    #[serde(default, rename = "serverMsgID")]
    pub server_msg_id: String,
    #[serde(default, rename = "clientMsgID")]
    pub client_msg_id: String,
    #[serde(default, rename = "operationID")]
    pub operation_id: String,
    #[serde(default)]
    pub sender_nickname: String,
    #[serde(default)]
    pub msg_from: i32,
    #[serde(default)]
    pub create_time: i64,
    #[serde(default)]
    pub seq: i64,
}

/// Acknowledgment returned to the platform before any relay work starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResp {
    pub action_code: i32,
    pub err_code: i32,
    pub err_msg: String,
    pub err_dlt: String,
    pub next_code: i32,
}

impl CallbackResp {
    pub fn success() -> Self {
        Self {
            action_code: 0,
            err_code: 200,
            err_msg: "success".to_string(),
            err_dlt: "successful".to_string(),
            next_code: 0,
        }
    }
}

/// Platform error code for invalid arguments.
pub const ERR_ARGS: i32 = 1001;

/// Error body for a callback that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResp {
    pub err_code: i32,
    pub err_msg: String,
    pub err_dlt: String,
}

impl ErrorResp {
    pub fn args(detail: impl Into<String>) -> Self {
        Self {
            err_code: ERR_ARGS,
            err_msg: "ArgsError".to_string(),
            err_dlt: detail.into(),
        }
    }
}
