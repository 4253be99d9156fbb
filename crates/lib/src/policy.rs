//! Whether an inbound message gets a bot reply.

use crate::content::ContentType;
use crate::gateway::CallbackAfterSendSingleMsgReq;

/// True only for text or picture messages sent *to* the bot by someone other than the bot.
pub fn should_respond(event: &CallbackAfterSendSingleMsgReq, bot_user_id: &str) -> bool {
    if event.send_id == bot_user_id || event.recv_id != bot_user_id {
        return false;
    }
    matches!(event.content_type, ContentType::Text | ContentType::Picture)
}
