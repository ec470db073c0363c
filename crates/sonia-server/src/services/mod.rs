//! Business logic shared by the HTTP handlers.

pub mod account;
pub mod chat;
pub mod journal;
