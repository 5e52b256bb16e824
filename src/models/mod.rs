pub mod answer;
pub mod candidate;
pub mod column;
pub mod comment;
pub mod event;
pub mod job;
pub mod message;
pub mod operator;
pub mod question;
