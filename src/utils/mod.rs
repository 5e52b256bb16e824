pub mod crypto;
pub mod i18n;
pub mod token;
