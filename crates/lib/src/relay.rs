//! The relay pipeline for one callback: gate, login, bot lookup, content, send.
//!
//! Steps run strictly in order; each consumes the previous step's output and the first
//! failure ends the invocation. The webhook has already been acknowledged when this runs,
//! so the outcome is only logged.

use crate::config::{self, Config, TimeoutsConfig};
use crate::content::{self, NormalizeError};
use crate::dispatch::{Dispatcher, Reply, SendError, SendMsgResp};
use crate::gateway::CallbackAfterSendSingleMsgReq;
use crate::http::{CallContext, TransportError};
use crate::identity::{AuthError, IdentityClient, LookupError};
use crate::policy;
use crate::qa::{Answerer, QaClient};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Decode(#[from] content::DecodeError),
    #[error("qa backend: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Send(#[from] SendError),
}

impl From<NormalizeError> for RelayError {
    fn from(e: NormalizeError) -> Self {
        match e {
            NormalizeError::Decode(e) => RelayError::Decode(e),
            NormalizeError::Transport(e) => RelayError::Transport(e),
        }
    }
}

/// Result of one invocation that passed the policy gate or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not addressed to the bot, sent by the bot, or an unsupported content type.
    Ignored,
    Sent(SendMsgResp),
}

/// Relay settings fixed at startup.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub bot_user_id: String,
    pub admin_account: String,
    pub timeouts: TimeoutsConfig,
}

/// Collaborator clients plus settings; cheap to clone and shared by every invocation.
#[derive(Clone)]
pub struct Relay {
    settings: Arc<RelaySettings>,
    identity: IdentityClient,
    answerer: Arc<dyn Answerer>,
    dispatcher: Dispatcher,
}

impl Relay {
    /// Build the relay from config. Fails when no bot user id is configured.
    pub fn from_config(config: &Config, client: reqwest::Client) -> anyhow::Result<Self> {
        let bot_user_id = config::resolve_bot_user_id(config).ok_or_else(|| {
            anyhow::anyhow!("bot user id not configured (set bot.userId or RELAY_BOT_USER_ID)")
        })?;
        let settings = RelaySettings {
            bot_user_id,
            admin_account: config::resolve_admin_account(config),
            timeouts: config.timeouts,
        };
        let services = &config.services;
        let qa = QaClient::new(&services.qa_api, client.clone(), settings.timeouts.qa_secs);
        Ok(Self::new(
            settings,
            IdentityClient::new(&services.admin_api, &services.chat_api, client.clone()),
            Arc::new(qa),
            Dispatcher::new(&services.im_api, client),
        ))
    }

    pub fn new(
        settings: RelaySettings,
        identity: IdentityClient,
        answerer: Arc<dyn Answerer>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            identity,
            answerer,
            dispatcher,
        }
    }

    pub fn bot_user_id(&self) -> &str {
        &self.settings.bot_user_id
    }

    /// Run the pipeline for one callback.
    pub async fn handle(
        &self,
        ctx: &CallContext,
        event: &CallbackAfterSendSingleMsgReq,
    ) -> Result<Outcome, RelayError> {
        let settings = &self.settings;
        if !policy::should_respond(event, &settings.bot_user_id) {
            log::debug!(
                "ignoring message {} -> {} (content type {})",
                event.send_id,
                event.recv_id,
                i32::from(event.content_type)
            );
            return Ok(Outcome::Ignored);
        }

        let timeouts = settings.timeouts;
        let tokens = self
            .identity
            .login(ctx, &settings.admin_account, timeouts.login_secs)
            .await?;
        let bot = self
            .identity
            .resolve_bot_identity(
                ctx,
                &tokens.admin_token,
                &settings.bot_user_id,
                timeouts.lookup_secs,
            )
            .await?;
        log::debug!("resolved bot identity {} ({})", bot.user_id, bot.nickname);

        let content_map = content::normalize(
            ctx,
            event.content_type,
            &event.content,
            self.answerer.as_ref(),
        )
        .await?;

        let reply = Reply {
            recv_id: &event.send_id,
            content_type: event.content_type,
            session_type: event.session_type,
            sender_platform_id: event.sender_platform_id,
            content: content_map,
        };
        let resp = self
            .dispatcher
            .send(ctx, &bot, &tokens.im_token, reply, timeouts.send_secs)
            .await?;
        Ok(Outcome::Sent(resp))
    }

    /// Run the pipeline and log the outcome; used by the webhook after acknowledging.
    pub async fn run(&self, ctx: CallContext, event: CallbackAfterSendSingleMsgReq) {
        let op = ctx.operation_id().unwrap_or("-").to_string();
        match self.handle(&ctx, &event).await {
            Ok(Outcome::Ignored) => {}
            Ok(Outcome::Sent(resp)) => log::info!(
                "[{}] replied to {}: serverMsgID={} clientMsgID={} sendTime={}",
                op,
                event.send_id,
                resp.server_msg_id,
                resp.client_msg_id,
                resp.send_time
            ),
            Err(e) => log::error!(
                "[{}] relay for message from {} (clientMsgID {}) failed: {}",
                op,
                event.send_id,
                event.client_msg_id,
                e
            ),
        }
    }
}
