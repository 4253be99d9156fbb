//! Gateway: HTTP host for the webhook.
//!
//! Single port serves the platform callback and a health probe. The callback is
//! acknowledged immediately; relay work continues on its own task.

mod protocol;
mod server;

pub use protocol::{CallbackAfterSendSingleMsgReq, CallbackResp, ErrorResp, ERR_ARGS};
pub use server::{router, run_gateway, GatewayState, CALLBACK_PATH};
