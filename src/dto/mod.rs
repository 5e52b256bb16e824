pub mod auth_dto;
pub mod candidate_dto;
pub mod column_dto;
pub mod message_dto;
