//! Wizard rendering

use super::{focused, ViewState};
use crate::wizard::{Notice, NoticeLevel, Widget, WizardEngine};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

/// Draw the whole screen
pub fn draw(f: &mut Frame, engine: &WizardEngine, view: &ViewState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(8),    // Page
            Constraint::Length(3), // Footer
        ])
        .split(f.area());

    draw_header(f, engine, chunks[0]);
    draw_page(f, engine, view, chunks[1]);
    draw_footer(f, engine, view, chunks[2]);

    if let Some(notice) = engine.notice() {
        draw_notice(f, notice);
    }
    if view.confirm_quit {
        draw_quit_dialog(f, engine.has_running_tasks());
    }
}

fn draw_header(f: &mut Frame, engine: &WizardEngine, area: Rect) {
    let title = Paragraph::new(Line::from(vec![Span::styled(
        engine.title(),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(title, area);
}

fn draw_page(f: &mut Frame, engine: &WizardEngine, view: &ViewState, area: Rect) {
    let widgets = engine.view();
    let focus_id = focused(&widgets, view.focus).and_then(|w| w.id());

    let progress = widgets.iter().find_map(|w| match w {
        Widget::Progress { status, percent } => Some((status.clone(), *percent)),
        _ => None,
    });

    let (body, gauge_area) = if progress.is_some() {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(area);
        (chunks[0], Some(chunks[1]))
    } else {
        (area, None)
    };

    let mut lines: Vec<Line> = Vec::new();
    for widget in &widgets {
        let is_focused = widget.id().is_some() && widget.id() == focus_id;
        let rendered = widget_lines(widget, is_focused, view.item);
        if rendered.is_empty() {
            continue;
        }
        lines.extend(rendered);
        lines.push(Line::from(""));
    }

    let page = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    f.render_widget(page, body);

    if let (Some(area), Some((status, percent))) = (gauge_area, progress) {
        let gauge = Gauge::default()
            .block(
                Block::default()
                    .title(" Progress ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Green)),
            )
            .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
            .percent(percent.min(100))
            .label(status);
        f.render_widget(gauge, area);
    }
}

fn marker(active: bool) -> &'static str {
    if active {
        "> "
    } else {
        "  "
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

/// Lines for one widget. Progress is drawn as a gauge instead.
fn widget_lines(widget: &Widget, focused: bool, item: usize) -> Vec<Line<'static>> {
    match widget {
        Widget::Text(text) => text.lines().map(|l| Line::from(l.to_string())).collect(),
        Widget::Error(text) => text
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::Red))))
            .collect(),
        Widget::Warning(text) => text
            .lines()
            .map(|l| {
                Line::from(Span::styled(
                    l.to_string(),
                    Style::default().fg(Color::Yellow),
                ))
            })
            .collect(),
        Widget::Choice {
            options, selected, ..
        } => options
            .iter()
            .enumerate()
            .map(|(i, option)| {
                let radio = if i == *selected { "(*)" } else { "( )" };
                Line::from(Span::styled(
                    format!("{}{} {}", marker(focused && i == *selected), radio, option),
                    focus_style(focused && i == *selected),
                ))
            })
            .collect(),
        Widget::Toggle { label, checked, .. } => {
            let check = if *checked { "[x]" } else { "[ ]" };
            vec![Line::from(Span::styled(
                format!("{}{} {}", marker(focused), check, label),
                focus_style(focused),
            ))]
        }
        Widget::TextInput { label, value, .. } => {
            let cursor = if focused { "_" } else { "" };
            vec![
                Line::from(Span::styled(
                    format!("{}{}:", marker(focused), label),
                    focus_style(focused),
                )),
                Line::from(Span::styled(
                    format!("  {}{}", value, cursor),
                    Style::default().fg(Color::White).bg(Color::DarkGray),
                )),
            ]
        }
        Widget::Checklist { items, .. } => items
            .iter()
            .enumerate()
            .map(|(i, (label, checked))| {
                let check = if *checked { "[x]" } else { "[ ]" };
                let active = focused && i == item;
                Line::from(Span::styled(
                    format!("{}{} {}", marker(active), check, label),
                    focus_style(active),
                ))
            })
            .collect(),
        Widget::List {
            items, selected, ..
        } => items
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let is_selected = *selected == Some(i);
                let style = if is_selected {
                    Style::default()
                        .fg(Color::Black)
                        .bg(if focused { Color::Yellow } else { Color::Cyan })
                } else {
                    Style::default()
                };
                Line::from(Span::styled(
                    format!("{}{}", marker(is_selected), label),
                    style,
                ))
            })
            .collect(),
        Widget::Button { label, .. } => vec![Line::from(Span::styled(
            format!("{}[ {} ]", marker(focused), label),
            focus_style(focused),
        ))],
        Widget::Link { label, url, .. } => vec![Line::from(vec![
            Span::styled(format!("{}{}: ", marker(focused), label), focus_style(focused)),
            Span::styled(
                url.clone(),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::UNDERLINED),
            ),
        ])],
        Widget::Progress { .. } => Vec::new(),
    }
}

fn button(label: &str, enabled: bool) -> Span<'static> {
    let style = if enabled {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Span::styled(format!("[ {} ]", label), style)
}

fn draw_footer(f: &mut Frame, engine: &WizardEngine, view: &ViewState, area: Rect) {
    let widgets = engine.view();
    let hint = match focused(&widgets, view.focus) {
        Some(Widget::TextInput { .. }) => "Type to edit  Tab:focus  Esc:quit",
        Some(Widget::Choice { .. }) | Some(Widget::List { .. }) => {
            "Up/Down:select  Tab:focus  q:quit"
        }
        Some(Widget::Checklist { .. }) => "Up/Down:move  Space:toggle  Tab:focus  q:quit",
        Some(Widget::Toggle { .. }) => "Space:toggle  Tab:focus  q:quit",
        Some(Widget::Button { .. }) => "Space:press  Tab:focus  q:quit",
        Some(Widget::Link { .. }) => "o:open link  Tab:focus  q:quit",
        _ => "q:quit",
    };

    let line = Line::from(vec![
        button("Back", engine.back_enabled()),
        Span::raw(" "),
        button(engine.next_label(), engine.next_enabled()),
        Span::raw("   "),
        Span::styled(
            format!("Enter:{}  Left:back  {}", engine.next_label().to_lowercase(), hint),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let footer = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}

fn draw_notice(f: &mut Frame, notice: &Notice) {
    let area = centered_rect(60, 40, f.area());
    f.render_widget(Clear, area);

    let color = match notice.level {
        NoticeLevel::Info => Color::Cyan,
        NoticeLevel::Warning => Color::Yellow,
        NoticeLevel::Error => Color::Red,
    };

    let mut text: Vec<Line> = vec![Line::from("")];
    text.extend(notice.message.lines().map(|l| Line::from(l.to_string())));
    text.push(Line::from(""));
    text.push(Line::from("[Enter] OK"));

    let dialog = Paragraph::new(text)
        .block(
            Block::default()
                .title(format!(" {} ", notice.title))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(dialog, area);
}

fn draw_quit_dialog(f: &mut Frame, busy: bool) {
    let area = centered_rect(50, 30, f.area());
    f.render_widget(Clear, area);

    let mut text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Are you sure you want to quit the installer?",
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];
    if busy {
        text.push(Line::from(Span::styled(
            "An operation is still running and will be abandoned.",
            Style::default().fg(Color::Red),
        )));
    }
    text.push(Line::from(""));
    text.push(Line::from("[Y] Quit  [N] Cancel"));

    let dialog = Paragraph::new(text)
        .block(
            Block::default()
                .title(" Quit installation ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(dialog, area);
}

/// Helper function to create a centered rect
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_not_inlined() {
        let progress = Widget::Progress {
            status: "Downloading".to_string(),
            percent: 40,
        };
        assert!(widget_lines(&progress, false, 0).is_empty());
    }

    #[test]
    fn test_checklist_cursor() {
        let list = Widget::Checklist {
            id: "installations",
            items: vec![("a".to_string(), true), ("b".to_string(), false)],
        };
        let lines = widget_lines(&list, true, 1);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].to_string(), "  [x] a");
        assert_eq!(lines[1].to_string(), "> [ ] b");
    }

    #[test]
    fn test_multiline_text() {
        let text = Widget::Text("Installed version: 1.0,\nAvailable version: 2.0".to_string());
        assert_eq!(widget_lines(&text, false, 0).len(), 2);
    }

    #[test]
    fn test_centered_rect_is_inside() {
        let outer = Rect::new(0, 0, 100, 50);
        let inner = centered_rect(50, 30, outer);
        assert!(inner.x >= outer.x && inner.right() <= outer.right());
        assert!(inner.y >= outer.y && inner.bottom() <= outer.bottom());
        assert_eq!(inner.width, 50);
    }
}
