pub mod bot_dispatcher;
pub mod bot_registry;
pub mod broadcast_hub;
pub mod candidate_locks;
pub mod field_projector;
pub mod message_service;
pub mod pipeline_service;
pub mod question_resolver;
pub mod survey_service;
