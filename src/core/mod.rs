pub mod catalog;
pub mod chat_stream;
pub mod compare;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod council;
pub mod dispatch;
pub mod message;
pub mod persona;
pub mod router;
pub mod session;
