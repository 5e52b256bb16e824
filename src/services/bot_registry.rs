use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::channel::telegram::TelegramTransport;
use crate::channel::ChannelTransport;
use crate::config::Config;
use crate::error::Result;
use crate::repository::Repository;

#[derive(Default)]
pub struct BotRegistry {
    transports: DashMap<Uuid, Arc<dyn ChannelTransport>>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, bot_id: Uuid, transport: Arc<dyn ChannelTransport>) {
        self.transports.insert(bot_id, transport);
    }

    pub fn transport(&self, bot_id: Uuid) -> Option<Arc<dyn ChannelTransport>> {
        self.transports.get(&bot_id).map(|t| t.value().clone())
    }

    pub fn is_running(&self, bot_id: Uuid) -> bool {
        self.transports.contains_key(&bot_id)
    }

    pub fn running_bot_ids(&self) -> Vec<Uuid> {
        self.transports.iter().map(|e| *e.key()).collect()
    }

    pub fn stop_bot(&self, bot_id: Uuid) -> bool {
        let stopped = self.transports.remove(&bot_id).is_some();
        if stopped {
            tracing::info!(%bot_id, "bot stopped");
        }
        stopped
    }

    pub fn stop_all(&self) {
        self.transports.clear();
    }

    /// Creates a Telegram transport for every active bot and, when a public base
    /// URL is configured, points its webhook at this service. Returns how many
    /// bots were started. A bot whose webhook registration fails is skipped.
    pub async fn start_all(&self, repo: &dyn Repository, config: &Config) -> Result<usize> {
        let client = reqwest::Client::new();
        let bots = repo.list_active_bots().await?;
        let mut started = 0;

        for bot in bots {
            let transport = TelegramTransport::new(
                client.clone(),
                &config.telegram_api_base,
                &bot.token,
                bot.id,
                &config.upload_dir,
            );

            if let Some(base) = &config.webhook_base_url {
                let url = format!(
                    "{}/api/webhook/telegram/{}",
                    base.trim_end_matches('/'),
                    bot.id
                );
                if let Err(err) = transport
                    .set_webhook(&url, config.webhook_secret.as_deref())
                    .await
                {
                    tracing::error!(bot_id = %bot.id, name = %bot.name, error = %err, "failed to start bot");
                    continue;
                }
            }

            self.register(bot.id, Arc::new(transport));
            tracing::info!(bot_id = %bot.id, name = %bot.name, "bot started");
            started += 1;
        }

        Ok(started)
    }
}
