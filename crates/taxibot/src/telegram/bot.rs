//! Bot instance creation and driver bot commands

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use dispatchcore::core::config;
use dispatchcore::AppResult;

/// Driver bot commands
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Driver bot commands:")]
pub enum Command {
    #[command(description = "check whether you receive orders")]
    Start,
    #[command(description = "show orders waiting for a driver")]
    Pending,
}

/// Creates a Bot for `token`, honouring `BOT_API_URL` for a local Bot API server.
///
/// # Errors
/// Fails on an empty token, an invalid `BOT_API_URL` or when the HTTP client
/// cannot be built.
pub fn create_bot(token: &str) -> anyhow::Result<Bot> {
    if token.trim().is_empty() {
        anyhow::bail!("bot token is not set");
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(token, client);

    let bot = match std::env::var("BOT_API_URL") {
        Ok(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        Err(_) => bot,
    };

    Ok(bot)
}

pub async fn setup_bot_commands(bot: &Bot) -> AppResult<()> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_descriptions() {
        let descriptions = Command::descriptions().to_string();

        assert!(descriptions.contains("Driver bot commands"));
        assert!(descriptions.contains("start"));
        assert!(descriptions.contains("pending"));
    }

    #[test]
    fn test_create_bot_rejects_empty_token() {
        assert!(create_bot("  ").is_err());
    }
}
