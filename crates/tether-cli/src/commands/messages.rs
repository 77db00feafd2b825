use tether_core::models::{Chat, ChatMessage};

use crate::commands::common::{preview, print_json, relative_time, resolve_record, App};
use crate::error::CliError;

pub async fn run_list(app: &App, chat: &str, as_json: bool) -> Result<(), CliError> {
    let chat: Chat = resolve_record(app.client.chats(), chat).await?;
    let messages = app.client.chat_messages(chat.id).await?;

    if as_json {
        return print_json(&messages);
    }

    if messages.is_empty() {
        println!("No messages in this chat.");
    }
    for line in format_message_lines(&messages) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_message_lines(messages: &[ChatMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|message| {
            let role = message.role.as_str();
            let text = preview(&message.text(), 60);
            let relative_time = relative_time(message.created_at);
            format!("{role:<10}  {text:<60}  {relative_time}")
        })
        .collect()
}
