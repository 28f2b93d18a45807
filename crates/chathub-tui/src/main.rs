use anyhow::{bail, Result};
use chathub_core::{
    client_for, ChatController, Config, CredentialStore, JsonFileStore, Overrides,
};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "chathub")]
#[command(version, about = "Chat with Gemini or OpenAI models from the terminal")]
struct Cli {
    /// Provider to talk to (gemini, openai)
    #[arg(long, global = true)]
    provider: Option<String>,
    /// Model name, overriding the provider default
    #[arg(long, global = true)]
    model: Option<String>,
    /// API base URL, e.g. a local proxy
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    log_stderr: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Ask {
        /// Message text
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Store the API key. One key is shared by every provider.
    SetKey {
        key: String,
    },
    /// Show provider, model and where the key comes from
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The TUI draws on the terminal, so its logs go to a file
    if let Err(e) = logging::init(cli.log_stderr) {
        eprintln!("logging disabled: {:#}", e);
    }

    let config = load_config(&cli)?;
    let chat = build_controller(&config)?;
    info!(provider = %chat.provider().as_str(), model = %chat.model(), "starting");

    match cli.command {
        None => run_tui(chat, config).await,
        Some(Commands::Ask { text }) => ask(chat, &text.join(" ")).await,
        Some(Commands::SetKey { key }) => set_key(chat, &key),
        Some(Commands::Status) => status(&chat),
    }
}

/// Config file, then environment, then command-line flags
fn load_config(cli: &Cli) -> Result<Config> {
    let file = Config::load().unwrap_or_else(|e| {
        warn!("ignoring unreadable config: {:#}", e);
        Config::new()
    });
    resolve_config(file, Overrides::from_env()?, cli)
}

fn resolve_config(mut config: Config, env: Overrides, cli: &Cli) -> Result<Config> {
    let flags = Overrides::from_parts(
        cli.provider.as_deref(),
        cli.model.clone(),
        cli.base_url.clone(),
    )?;
    config.apply(&env.layered(flags));
    Ok(config)
}

fn build_controller(config: &Config) -> Result<ChatController> {
    let provider = config.provider();
    let client = client_for(provider, &config.client_options())?;
    let credentials = CredentialStore::new(JsonFileStore::new(Config::storage_path()?))
        .with_env_override(provider.key_env_var());

    Ok(ChatController::new(client, credentials))
}

async fn run_tui(chat: ChatController, config: Config) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(chat, config, Config::config_path().ok());

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            let Some(event) = events.next().await else {
                break;
            };
            handler::handle_event(&mut app, event).await?;
            app.update().await;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

async fn ask(mut chat: ChatController, text: &str) -> Result<()> {
    if !chat.has_credential() {
        bail!(
            "no {} API key set; run `chathub set-key <key>` or export {}",
            chat.provider().display_name(),
            chat.provider().key_env_var()
        );
    }

    chat.send_message(text);
    match chat.wait().await {
        Some(Ok(reply)) => {
            println!("{}", reply);
            Ok(())
        }
        Some(Err(e)) => bail!("{} request failed: {}", chat.provider().display_name(), e),
        None => bail!("message was empty"),
    }
}

fn set_key(mut chat: ChatController, key: &str) -> Result<()> {
    chat.save_credential(key)?;
    println!("{} API key saved.", chat.provider().display_name());
    Ok(())
}

fn status(chat: &ChatController) -> Result<()> {
    let storage = Config::storage_path()?;

    println!("provider: {} ({})", chat.provider().display_name(), chat.provider().as_str());
    println!("model:    {}", chat.model());
    match chat.key_source() {
        Some(source) => println!("API key:  set ({})", source.as_str()),
        None => println!("API key:  not set"),
    }
    println!("storage:  {}", storage.display());
    Ok(())
}
