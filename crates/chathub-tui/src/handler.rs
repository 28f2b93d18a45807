use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, Screen, TextInput};
use crate::tui::AppEvent;

const MOUSE_SCROLL_LINES: u16 = 3;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work on any screen
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }
    if ctrl && key.code == KeyCode::Char('l') {
        app.clear_chat();
        return;
    }

    match app.screen {
        Screen::Chat => handle_chat_key(app, key),
        Screen::Settings => handle_settings_key(app, key),
    }
}

fn handle_chat_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::F(2) => app.screen = Screen::Settings,
        KeyCode::Enter => app.submit_input(),
        KeyCode::PageUp => app.scroll_up(app.page_height()),
        KeyCode::PageDown => app.scroll_down(app.page_height()),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        _ => {
            // The input is disabled while sending or without a key
            if app.input_enabled() {
                edit_input(&mut app.input, key);
            }
        }
    }
}

fn handle_settings_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.api_key_input.clear();
            app.show_key = false;
            app.screen = Screen::Chat;
        }
        KeyCode::Enter => app.save_api_key(),
        KeyCode::Tab => app.show_key = !app.show_key,
        KeyCode::F(3) => app.switch_provider(),
        _ => edit_input(&mut app.api_key_input, key),
    }
}

/// Shared line-editing keys
fn edit_input(input: &mut TextInput, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.left(),
        KeyCode::Right => input.right(),
        KeyCode::Home => input.home(),
        KeyCode::End => input.end(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => input.insert(c),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    let target = match app.screen {
        Screen::Settings => &mut app.api_key_input,
        Screen::Chat if app.input_enabled() => &mut app.input,
        Screen::Chat => return,
    };

    // Single-line fields: newlines from the clipboard become spaces
    for c in text.trim_end_matches(['\r', '\n']).chars() {
        target.insert(if c == '\n' || c == '\r' { ' ' } else { c });
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen != Screen::Chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(MOUSE_SCROLL_LINES),
        MouseEventKind::ScrollUp => app.scroll_up(MOUSE_SCROLL_LINES),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chathub_core::{
        ChatController, ChatProvider, Config, CredentialStore, MemoryStore, Message, Provider,
        ProviderError, Sender,
    };
    use futures_util::future::BoxFuture;
    use std::sync::Arc;

    struct EchoProvider;

    impl ChatProvider for EchoProvider {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        fn model(&self) -> &str {
            "echo"
        }

        fn complete<'a>(
            &'a self,
            _api_key: &'a str,
            _history: &'a [Message],
            text: &'a str,
        ) -> BoxFuture<'a, Result<String, ProviderError>> {
            Box::pin(async move { Ok(format!("echo: {}", text)) })
        }
    }

    fn app(with_key: bool) -> App {
        let mut creds = CredentialStore::new(MemoryStore::new());
        if with_key {
            creds.set("test-key").unwrap();
        }
        let chat = ChatController::new(Arc::new(EchoProvider), creds);
        App::new(chat, Config::new(), None)
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> AppEvent {
        AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).await.unwrap();
        }
    }

    #[tokio::test]
    async fn first_run_opens_settings_and_blocks_typing() {
        let mut app = app(false);
        assert_eq!(app.screen, Screen::Settings);

        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.screen, Screen::Chat);

        type_text(&mut app, "hello").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();

        assert_eq!(app.input.value(), "");
        assert_eq!(app.chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn saving_a_key_returns_to_chat() {
        let mut app = app(false);

        handle_event(&mut app, AppEvent::Paste("  AIza-pasted\n".to_string()))
            .await
            .unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        app.update().await;

        assert!(app.chat.has_credential());
        assert_eq!(app.screen, Screen::Chat);
        assert_eq!(app.api_key_input.value(), "");
        assert_eq!(app.toasts.len(), 1);
        assert!(app.toasts[0].text.contains("saved successfully"));
    }

    #[tokio::test]
    async fn blank_key_is_not_saved() {
        let mut app = app(false);
        type_text(&mut app, "   ").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();

        assert!(!app.chat.has_credential());
        assert_eq!(app.screen, Screen::Settings);
    }

    #[tokio::test]
    async fn tab_toggles_key_visibility() {
        let mut app = app(false);
        assert!(!app.show_key);
        handle_event(&mut app, key(KeyCode::Tab)).await.unwrap();
        assert!(app.show_key);
    }

    #[tokio::test]
    async fn enter_sends_and_reply_arrives_on_update() {
        let mut app = app(true);
        type_text(&mut app, "ping").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();

        assert_eq!(app.input.value(), "");
        assert!(app.chat.is_sending());
        assert!(!app.input_enabled());

        // Typing is ignored while the request is outstanding
        type_text(&mut app, "x").await;
        assert_eq!(app.input.value(), "");

        while app.chat.is_sending() {
            tokio::task::yield_now().await;
            app.update().await;
        }

        let messages = app.chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].sender, Sender::User);
        assert_eq!(messages[2].text, "echo: ping");
        assert!(app.input_enabled());
    }

    #[tokio::test]
    async fn ctrl_l_clears_the_conversation() {
        let mut app = app(true);
        type_text(&mut app, "hi").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        app.chat.wait().await;
        assert_eq!(app.chat.messages().len(), 3);

        handle_event(&mut app, ctrl('l')).await.unwrap();
        assert_eq!(app.chat.messages().len(), 1);
        assert!(app.chat.has_credential());
    }

    #[tokio::test]
    async fn clear_is_unavailable_without_a_key() {
        let mut app = app(false);
        handle_event(&mut app, ctrl('l')).await.unwrap();
        app.update().await;
        assert!(app.toasts.is_empty());
    }

    #[tokio::test]
    async fn f3_cycles_provider_in_memory() {
        let mut app = app(true);
        handle_event(&mut app, key(KeyCode::F(2))).await.unwrap();
        handle_event(&mut app, key(KeyCode::F(3))).await.unwrap();

        assert_eq!(app.chat.provider(), Provider::OpenAI);
        assert_eq!(app.config.provider(), Provider::OpenAI);
        // The one stored key now goes to a different provider
        assert!(app.toasts.iter().any(|t| t.text.contains("API key is shared")));
    }

    #[tokio::test]
    async fn ctrl_c_quits_from_anywhere() {
        let mut app = app(false);
        handle_event(&mut app, ctrl('c')).await.unwrap();
        assert!(app.should_quit);
    }
}
