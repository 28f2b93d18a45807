use std::path::PathBuf;
use std::time::{Duration, Instant};

use chathub_core::{
    client_for, ChatController, ChatEvent, ClientOptions, Config, NoticeLevel, SendOutcome,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

const TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Settings,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub level: NoticeLevel,
    pub text: String,
    pub expires_at: Instant,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-line text field with a character-based cursor
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn char_count(&self) -> usize {
        self.value.chars().count()
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.char_count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }
}

pub struct App {
    pub should_quit: bool,
    pub screen: Screen,

    pub chat: ChatController,
    events: UnboundedReceiver<ChatEvent>,
    pub config: Config,
    // Where provider switches are remembered; None keeps them in memory
    config_path: Option<PathBuf>,

    // Chat input and transcript
    pub input: TextInput,
    pub chat_scroll: u16,
    pub follow_bottom: bool,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub animation_frame: u8,

    // Settings panel
    pub api_key_input: TextInput,
    pub show_key: bool,

    pub toasts: Vec<Toast>,
}

impl App {
    pub fn new(mut chat: ChatController, config: Config, config_path: Option<PathBuf>) -> Self {
        let events = chat.subscribe();
        // First run: go straight to the key form
        let screen = if chat.has_credential() {
            Screen::Chat
        } else {
            Screen::Settings
        };

        Self {
            should_quit: false,
            screen,
            chat,
            events,
            config,
            config_path,
            input: TextInput::default(),
            chat_scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            api_key_input: TextInput::default(),
            show_key: false,
            toasts: Vec::new(),
        }
    }

    /// Typing is only possible with a key and no request outstanding
    pub fn input_enabled(&self) -> bool {
        self.chat.has_credential() && !self.chat.is_sending()
    }

    pub fn submit_input(&mut self) {
        if !self.input_enabled() {
            return;
        }

        match self.chat.send_message(self.input.value()) {
            SendOutcome::Dispatched => {
                self.input.clear();
                self.follow_bottom = true;
            }
            outcome => debug!(?outcome, "message not sent"),
        }
    }

    pub fn save_api_key(&mut self) {
        if self.api_key_input.is_blank() {
            return;
        }

        match self.chat.save_credential(self.api_key_input.value()) {
            Ok(()) => {
                self.api_key_input.clear();
                self.show_key = false;
                self.screen = Screen::Chat;
            }
            Err(e) => {
                warn!("failed to save API key: {:#}", e);
                self.push_toast(NoticeLevel::Error, format!("Could not save API key: {}", e));
            }
        }
    }

    /// Move to the next provider and remember the choice in the config file
    pub fn switch_provider(&mut self) {
        if self.chat.is_sending() {
            self.push_toast(
                NoticeLevel::Error,
                "Wait for the current reply before switching provider".to_string(),
            );
            return;
        }

        let next = self.chat.provider().next();
        let options = ClientOptions {
            timeout: self.config.client_options().timeout,
            ..Default::default()
        };

        let client = match client_for(next, &options) {
            Ok(client) => client,
            Err(e) => {
                self.push_toast(NoticeLevel::Error, format!("Could not switch provider: {}", e));
                return;
            }
        };

        if !self.chat.set_provider(client) {
            return;
        }

        if self.chat.has_credential() {
            self.push_toast(
                NoticeLevel::Success,
                format!("{} selected. The API key is shared.", next.display_name()),
            );
        }

        self.config.set_provider(next);
        if let Some(path) = &self.config_path {
            if let Err(e) = Config::save_provider(path, next) {
                warn!("failed to persist provider choice: {:#}", e);
            }
        }
    }

    /// Only offered once a key is present, like the settings page it mirrors
    pub fn clear_chat(&mut self) {
        if self.chat.has_credential() {
            self.chat.clear_conversation();
            self.chat_scroll = 0;
            self.follow_bottom = true;
        }
    }

    /// Fold in finished replies, turn notices into toasts, expire old toasts
    pub async fn update(&mut self) {
        self.chat.poll().await;
        self.drain_events();
        let now = Instant::now();
        self.toasts.retain(|t| t.expires_at > now);
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                ChatEvent::Notice { level, text } => self.push_toast(level, text),
                ChatEvent::MessageAppended(_) | ChatEvent::ConversationCleared => {
                    self.follow_bottom = true;
                }
                _ => {}
            }
        }
    }

    pub fn push_toast(&mut self, level: NoticeLevel, text: String) {
        self.toasts.push(Toast {
            level,
            text,
            expires_at: Instant::now() + TOAST_TTL,
        });
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        self.follow_bottom = self.chat_scroll >= max;
    }

    pub fn page_height(&self) -> u16 {
        self.chat_height.max(1)
    }

    /// Keep the newest message in view unless the user scrolled away
    pub fn sync_scroll(&mut self) {
        if self.follow_bottom {
            self.chat_scroll = self.max_scroll();
        }
    }

    fn max_scroll(&self) -> u16 {
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.transcript_height().saturating_sub(visible_height)
    }

    /// Estimated rendered height of the transcript at the current width
    pub fn transcript_height(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.chat.messages() {
            total_lines = total_lines.saturating_add(1); // Sender line
            for line in msg.text.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                let wrapped = char_count.div_ceil(wrap_width).max(1);
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.chat.is_sending() {
            total_lines = total_lines.saturating_add(2); // "AI Assistant" + "Thinking..."
        }

        total_lines
    }
}
