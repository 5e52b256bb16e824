pub mod channel;
pub mod client;
pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::repository::Repository;
use crate::services::{
    bot_dispatcher::BotDispatcher, bot_registry::BotRegistry, broadcast_hub::BroadcastHub,
    candidate_locks::CandidateLocks, message_service::MessageService,
    pipeline_service::PipelineService, survey_service::SurveyService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repo: Arc<dyn Repository>,
    pub hub: Arc<BroadcastHub>,
    pub bots: Arc<BotRegistry>,
    pub survey_service: SurveyService,
    pub message_service: MessageService,
    pub pipeline_service: PipelineService,
    pub dispatcher: BotDispatcher,
}

impl AppState {
    pub fn new(config: Config, repo: Arc<dyn Repository>, bots: Arc<BotRegistry>) -> Self {
        let hub = Arc::new(BroadcastHub::new(config.hub_heartbeat));
        let locks = CandidateLocks::new();

        let survey_service =
            SurveyService::new(repo.clone(), hub.clone(), locks.clone(), bots.clone());
        let message_service = MessageService::new(repo.clone(), hub.clone(), bots.clone());
        let pipeline_service = PipelineService::new(repo.clone(), hub.clone(), locks);
        let dispatcher = BotDispatcher::new(
            repo.clone(),
            bots.clone(),
            survey_service.clone(),
            message_service.clone(),
        );

        Self {
            config: Arc::new(config),
            repo,
            hub,
            bots,
            survey_service,
            message_service,
            pipeline_service,
            dispatcher,
        }
    }
}
