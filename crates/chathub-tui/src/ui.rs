use chathub_core::{NoticeLevel, Sender};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Screen, TextInput};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if end == 0 {
            // "****" is not a bold span
            break;
        }

        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        spans.push(Span::styled(
            after[..end].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Mask an API key, keeping the last four characters visible
pub(crate) fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len <= 4 {
        "*".repeat(len)
    } else {
        let masked_len = len - 4;
        let last_four: String = key.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let banner_height = if app.chat.has_credential() { 0 } else { 1 };

    // Main layout: header, body, banner, footer
    let [header_area, body_area, banner_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(banner_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Settings => render_settings_screen(app, frame, body_area),
    }

    if banner_height > 0 {
        render_missing_key_banner(app, frame, banner_area);
    }
    render_footer(app, frame, footer_area);
    render_toasts(app, frame, area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" AI Chat Hub ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("{} · {}", app.chat.provider().display_name(), app.chat.model()),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_missing_key_banner(app: &App, frame: &mut Frame, area: Rect) {
    let text = format!(
        "Please set your {} API key in settings to start chatting.",
        app.chat.provider().display_name()
    );
    let banner = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(Style::default().bg(Color::Yellow).fg(Color::Black));
    frame.render_widget(banner, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Keys on gray, labels on black
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let (mode_text, mode_style) = match app.screen {
        Screen::Chat => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        Screen::Settings => (" SETTINGS ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    let mut hints = match app.screen {
        Screen::Chat => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" PgUp/PgDn ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" F2 ", key_style),
            Span::styled(" settings ", label_style),
        ],
        Screen::Settings => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" save key ", label_style),
            Span::styled(" Tab ", key_style),
            Span::styled(if app.show_key { " hide " } else { " show " }, label_style),
            Span::styled(" F3 ", key_style),
            Span::styled(" provider ", label_style),
        ],
    };

    if app.chat.has_credential() {
        hints.extend(vec![
            Span::styled(" ^L ", key_style),
            Span::styled(" clear ", label_style),
        ]);
    }

    hints.extend(match app.screen {
        Screen::Chat => vec![
            Span::styled(" Esc ", key_style),
            Span::styled(" quit ", label_style),
        ],
        Screen::Settings => vec![
            Span::styled(" Esc ", key_style),
            Span::styled(" back to chat ", label_style),
        ],
    });

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Inner size, used by App for scroll bounds
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);
    app.sync_scroll();

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let mut lines: Vec<Line> = Vec::new();

    for msg in app.chat.messages() {
        let (label_color, text_color) = match msg.sender {
            Sender::User => (Color::Cyan, Color::White),
            Sender::Assistant => (Color::Yellow, Color::Reset),
        };

        lines.push(Line::from(vec![
            Span::styled(
                msg.sender.label(),
                Style::default().fg(label_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", msg.timestamp.with_timezone(&chrono::Local).format("%H:%M")),
                Style::default().fg(Color::DarkGray),
            ),
        ]));

        match msg.sender {
            Sender::User => {
                for line in msg.text.lines() {
                    lines.push(Line::from(Span::styled(
                        line.to_string(),
                        Style::default().fg(text_color),
                    )));
                }
            }
            Sender::Assistant => {
                for line in msg.text.lines() {
                    lines.push(parse_markdown_line(line));
                }
            }
        }
        lines.push(Line::default());
    }

    if app.chat.is_sending() {
        lines.push(Line::from(Span::styled(
            Sender::Assistant.label(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    render_message_input(app, frame, input_area);
}

fn render_message_input(app: &App, frame: &mut Frame, area: Rect) {
    let enabled = app.input_enabled();
    let border_color = if enabled { Color::Cyan } else { Color::DarkGray };

    let title = if app.chat.is_sending() {
        " Waiting for reply... "
    } else if !app.chat.has_credential() {
        " Set an API key to start (F2) "
    } else {
        " Message "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    if enabled && app.input.value().is_empty() {
        let placeholder = Paragraph::new("Type your message here...")
            .style(Style::default().fg(Color::DarkGray))
            .block(input_block);
        frame.render_widget(placeholder, area);
        frame.set_cursor_position((area.x + 1, area.y + 1));
        return;
    }

    let (visible_text, cursor_x) = visible_slice(&app.input, area.width.saturating_sub(2) as usize);

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(if enabled { Color::Cyan } else { Color::DarkGray }))
        .block(input_block);

    frame.render_widget(input, area);

    if enabled {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// Horizontally scroll `input` so the cursor stays inside `width` columns.
/// Returns the visible text and the cursor column within it.
fn visible_slice(input: &TextInput, width: usize) -> (String, u16) {
    let cursor_pos = input.cursor();

    let scroll_offset = if width == 0 {
        0
    } else if cursor_pos >= width {
        cursor_pos - width + 1
    } else {
        0
    };

    let visible: String = input.value().chars().skip(scroll_offset).take(width).collect();
    (visible, (cursor_pos - scroll_offset) as u16)
}

fn render_settings_screen(app: &App, frame: &mut Frame, area: Rect) {
    let provider = app.chat.provider();

    // Calculate panel size and position (centered)
    let panel_width = 64.min(area.width.saturating_sub(4));
    let panel_height = 13.min(area.height);
    let panel_x = area.x + (area.width.saturating_sub(panel_width)) / 2;
    let panel_y = area.y + (area.height.saturating_sub(panel_height)) / 2;
    let panel_area = Rect::new(panel_x, panel_y, panel_width, panel_height);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Enter your {} API Key ", provider.display_name()));

    let inner = block.inner(panel_area);
    frame.render_widget(block, panel_area);

    let [intro_area, _, input_area, status_area, _, provider_area, clear_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(inner);

    let intro = Paragraph::new(format!(
        "Your API key is stored locally and only ever sent to {}'s API endpoint.",
        provider.display_name()
    ))
    .style(Style::default().fg(Color::Gray))
    .wrap(Wrap { trim: true });
    frame.render_widget(intro, intro_area);

    let field_width = input_area.width.saturating_sub(2) as usize;
    let (display_text, cursor_x) = if app.show_key {
        visible_slice(&app.api_key_input, field_width)
    } else {
        let masked = mask_key(app.api_key_input.value());
        let cursor = masked.chars().count().min(field_width) as u16;
        (masked, cursor)
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(if app.show_key { " Key (visible) " } else { " Key (hidden) " });

    let input = if app.api_key_input.value().is_empty() {
        Paragraph::new(format!("Paste your {} API key...", provider.display_name()))
            .style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(display_text).style(Style::default().fg(Color::Cyan))
    };
    frame.render_widget(input.block(input_block), input_area);
    let cursor_x = if app.api_key_input.value().is_empty() { 0 } else { cursor_x };
    frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));

    let key_status = match app.chat.key_source() {
        Some(source) => format!(
            "{} characters · current key: {}",
            app.api_key_input.char_count(),
            source.as_str()
        ),
        None => format!("{} characters · no key saved yet", app.api_key_input.char_count()),
    };
    frame.render_widget(
        Paragraph::new(key_status).style(Style::default().fg(Color::DarkGray)),
        status_area,
    );

    let provider_line = Line::from(vec![
        Span::styled("Provider: ", Style::default().fg(Color::Gray)),
        Span::styled(
            format!("{} ({})", provider.display_name(), app.chat.model()),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::styled("  F3 to switch", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(provider_line), provider_area);

    if app.chat.has_credential() {
        let clear = Paragraph::new("Ctrl+L  Clear chat history")
            .style(Style::default().fg(Color::LightRed));
        frame.render_widget(clear, clear_area);
    }
}

fn render_toasts(app: &App, frame: &mut Frame, area: Rect) {
    let width = 48.min(area.width.saturating_sub(2));
    let mut y = area.y + 1;

    // Newest on top
    for toast in app.toasts.iter().rev() {
        if y + 3 > area.y + area.height {
            break;
        }

        let (color, title) = match toast.level {
            NoticeLevel::Success => (Color::Green, " ✓ "),
            NoticeLevel::Error => (Color::Red, " ✗ "),
        };
        let toast_area = Rect::new(area.x + area.width.saturating_sub(width + 1), y, width, 3);

        frame.render_widget(Clear, toast_area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(title);
        let text: String = toast.text.chars().take(width.saturating_sub(2) as usize).collect();
        frame.render_widget(Paragraph::new(text).block(block), toast_area);

        y += 3;
    }
}
