pub mod chats;
pub mod common;
pub mod completions;
pub mod connections;
pub mod messages;
pub mod queries;
pub mod status;
pub mod sync;
