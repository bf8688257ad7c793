//! Terminal frontend for the installer wizard

mod ui;

use crate::app::App;
use crate::wizard::{Input, PageId, Widget, WizardEngine};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;

/// Per-page cursor state that lives outside the pages themselves
#[derive(Debug, Default)]
pub(crate) struct ViewState {
    page: Option<PageId>,
    /// Index into the focusable widgets of the page
    pub focus: usize,
    /// Cursor inside a focused checklist
    pub item: usize,
    pub confirm_quit: bool,
}

impl ViewState {
    fn sync(&mut self, page: Option<PageId>) {
        if self.page != page {
            self.page = page;
            self.focus = 0;
            self.item = 0;
        }
    }
}

/// Widgets that take keyboard input, in display order
pub(crate) fn focusable(widgets: &[Widget]) -> Vec<&Widget> {
    widgets.iter().filter(|w| w.id().is_some()).collect()
}

pub(crate) fn focused(widgets: &[Widget], focus: usize) -> Option<&Widget> {
    let focusable = focusable(widgets);
    if focusable.is_empty() {
        return None;
    }
    focusable.get(focus % focusable.len()).copied()
}

/// Terminal wrapper
pub struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl Tui {
    pub fn new() -> Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }

    fn setup(&mut self) -> Result<()> {
        enable_raw_mode()?;
        execute!(self.terminal.backend_mut(), EnterAlternateScreen)?;
        self.terminal.hide_cursor()?;
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    /// Run the wizard until the user closes it
    pub async fn run(&mut self, app: &mut App) -> Result<()> {
        self.setup()?;
        let result = self.event_loop(app).await;
        self.restore()?;
        result
    }

    async fn event_loop(&mut self, app: &mut App) -> Result<()> {
        let mut view = ViewState::default();
        loop {
            app.engine.poll_tasks();
            view.sync(app.engine.current_id());

            self.terminal.draw(|f| ui::draw(f, &app.engine, &view))?;

            if app.engine.is_closed() {
                break;
            }

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        handle_key(&mut app.engine, &mut view, key);
                    }
                }
            }
        }
        Ok(())
    }
}

fn request_quit(engine: &mut WizardEngine, view: &mut ViewState) {
    if !engine.request_close() {
        view.confirm_quit = true;
    }
}

fn handle_key(engine: &mut WizardEngine, view: &mut ViewState, key: KeyEvent) {
    if view.confirm_quit {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                view.confirm_quit = false;
                engine.confirm_close();
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => view.confirm_quit = false,
            _ => {}
        }
        return;
    }

    if engine.notice().is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
            engine.dismiss_notice();
        }
        return;
    }

    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        request_quit(engine, view);
        return;
    }

    let widgets = engine.view();
    let count = focusable(&widgets).len().max(1);
    let current = focused(&widgets, view.focus).cloned();

    match (key.code, current) {
        (KeyCode::Tab, _) => {
            view.focus = (view.focus + 1) % count;
            view.item = 0;
        }
        (KeyCode::BackTab, _) => {
            view.focus = (view.focus + count - 1) % count;
            view.item = 0;
        }

        // text entry swallows printable keys
        (KeyCode::Char(c), Some(Widget::TextInput { id, mut value, .. })) => {
            value.push(c);
            engine.input(id, Input::Edit(value));
        }
        (KeyCode::Backspace, Some(Widget::TextInput { id, mut value, .. })) => {
            value.pop();
            engine.input(id, Input::Edit(value));
        }

        (KeyCode::Up, Some(Widget::Choice { id, selected, .. })) if selected > 0 => {
            engine.input(id, Input::Select(selected - 1));
        }
        (KeyCode::Down, Some(Widget::Choice { id, options, selected })) => {
            if selected + 1 < options.len() {
                engine.input(id, Input::Select(selected + 1));
            }
        }
        (KeyCode::Up, Some(Widget::List { id, items, selected })) if !items.is_empty() => {
            let index = selected.map_or(0, |s| s.saturating_sub(1));
            engine.input(id, Input::Select(index));
        }
        (KeyCode::Down, Some(Widget::List { id, items, selected })) if !items.is_empty() => {
            let index = selected.map_or(0, |s| (s + 1).min(items.len() - 1));
            engine.input(id, Input::Select(index));
        }
        (KeyCode::Up, Some(Widget::Checklist { .. })) => {
            view.item = view.item.saturating_sub(1);
        }
        (KeyCode::Down, Some(Widget::Checklist { items, .. })) => {
            if view.item + 1 < items.len() {
                view.item += 1;
            }
        }

        (KeyCode::Char(' '), Some(Widget::Toggle { id, .. })) => engine.input(id, Input::Toggle),
        (KeyCode::Char(' '), Some(Widget::Checklist { id, .. })) => {
            engine.input(id, Input::ToggleItem(view.item));
        }
        (KeyCode::Char(' ') | KeyCode::Enter, Some(Widget::Button { id, .. })) => {
            engine.input(id, Input::Activate);
        }
        (KeyCode::Char(' ') | KeyCode::Char('o'), Some(Widget::Link { url, .. })) => {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open {}: {}", url, e);
            }
        }

        (KeyCode::Enter, _) => {
            engine.press_next();
        }
        (KeyCode::Left | KeyCode::Backspace, _) => {
            engine.press_back();
        }
        (KeyCode::Esc | KeyCode::Char('q'), _) => request_quit(engine, view),
        _ => {}
    }
}
