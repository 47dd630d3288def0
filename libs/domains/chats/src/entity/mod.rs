//! Sea-ORM entities for the chats and messages tables

pub mod chat;
pub mod message;
