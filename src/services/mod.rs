use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;

pub mod activity_service;
pub mod chat_service;
pub mod expiry_service;
pub mod feed_service;
pub mod signup_service;
pub mod user_directory;

use chat_service::{ChatNotifier, DisabledChat, HttpChatNotifier};
use user_directory::UserDirectory;

/// External subsystems the core talks to. Constructed once at startup.
#[derive(Clone)]
pub struct Collaborators {
    pub chat: Arc<dyn ChatNotifier>,
    pub users: Arc<dyn UserDirectory>,
    pub chat_timeout: Duration,
}

impl Collaborators {
    pub fn new(
        chat: Arc<dyn ChatNotifier>,
        users: Arc<dyn UserDirectory>,
        chat_timeout: Duration,
    ) -> Self {
        Self {
            chat,
            users,
            chat_timeout,
        }
    }

    pub fn chat_from_config(config: &AppConfig) -> Arc<dyn ChatNotifier> {
        match config.chat_api_url.as_deref() {
            Some(url) => Arc::new(HttpChatNotifier::new(
                url,
                config.chat_api_key.clone(),
                config.chat_api_host.clone(),
            )),
            None => {
                tracing::warn!("CHAT_API_URL not set; chat integration disabled");
                Arc::new(DisabledChat)
            }
        }
    }
}
