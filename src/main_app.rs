use crate::event_source::EventSource;
use crate::page::{BoundLink, Page};
use crate::popup::{Facybox, PopupState};
use crate::theme::current_theme;
use crate::widget::link_list::{LinkList, LinkListAction};
use anyhow::Result;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use log::{debug, warn};
use ratatui::{
    Frame, Terminal,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Paragraph},
};
use std::time::{Duration, Instant};

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum AppAction {
    Quit,
}

/// A page's lightbox links on the left of the screen, the lightbox on top.
pub struct App {
    links: LinkList,
    facybox: Facybox,
    location: String,
    terminal_size: Rect,
}

impl App {
    pub fn new(page: Page, mut facybox: Facybox) -> Self {
        let title = page
            .title()
            .unwrap_or_else(|| page.location().to_string());
        let location = page.location().to_string();
        let links = facybox.bind(page);
        debug!("App started with {} links", links.len());
        App {
            links: LinkList::new(title, links),
            facybox,
            location,
            terminal_size: Rect::default(),
        }
    }

    pub fn facybox(&self) -> &Facybox {
        &self.facybox
    }

    pub fn facybox_mut(&mut self) -> &mut Facybox {
        &mut self.facybox
    }

    pub fn links(&self) -> &LinkList {
        &self.links
    }

    pub fn open_selected(&mut self) {
        if let Some(link) = self.links.selected().cloned() {
            self.open_link(&link);
        }
    }

    /// Opens `href` as if a link to it had been clicked. Uses the bound link
    /// with that href when there is one so its class tag applies.
    pub fn open_href(&mut self, href: &str) {
        let link = self
            .links
            .items()
            .iter()
            .find(|link| link.href == href)
            .cloned()
            .unwrap_or_else(|| BoundLink {
                href: href.to_string(),
                label: href.to_string(),
                class_tag: None,
            });
        self.open_link(&link);
    }

    fn open_link(&mut self, link: &BoundLink) {
        debug!("Opening link {} ({})", link.label, link.href);
        if let Err(e) = self.facybox.open_link(link) {
            warn!("Failed to open {}: {e}", link.href);
        }
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(AppAction::Quit);
        }
        // The open popup swallows keys, including ones it does not bind.
        if self.facybox.is_visible() {
            self.facybox.handle_key(key);
            return None;
        }
        match self.links.handle_key(key)? {
            LinkListAction::Open(link) => {
                self.open_link(&link);
                None
            }
            LinkListAction::Quit => Some(AppAction::Quit),
        }
    }

    pub fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        if self.facybox.is_visible() {
            self.facybox.handle_mouse(mouse);
            return;
        }
        if mouse.kind == MouseEventKind::Down(MouseButton::Left)
            && self.links.handle_mouse_click(mouse.column, mouse.row)
        {
            self.open_selected();
        }
    }

    pub fn handle_resize(&mut self, width: u16, height: u16) {
        self.facybox.resize(width, height);
    }

    /// Applies background work. Returns true when a redraw is needed.
    pub fn tick(&mut self) -> bool {
        self.facybox.poll()
    }

    pub fn draw(&mut self, f: &mut Frame) {
        self.terminal_size = f.area();
        let palette = current_theme();

        let background = Block::default().style(Style::default().bg(palette.base_00));
        f.render_widget(background, f.area());

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(f.area());

        self.links.render(f, chunks[0]);
        self.render_status_bar(f, chunks[1]);

        self.facybox.render(f, f.area());
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let palette = current_theme();
        let state = match self.facybox.state() {
            PopupState::Hidden => "closed",
            PopupState::Loading => "loading",
            PopupState::Revealed => "open",
            PopupState::Failed(_) => "failed",
        };
        let mut spans = vec![
            Span::styled(format!(" {state} "), Style::default().fg(palette.base_00).bg(palette.base_0c)),
            Span::styled(format!(" {}", self.location), Style::default().fg(palette.base_04)),
        ];
        if let Some(gallery) = self.facybox.gallery() {
            spans.push(Span::styled(
                format!("  {}", gallery.counter()),
                Style::default().fg(palette.base_0a),
            ));
        }
        f.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(palette.base_01)),
            area,
        );
    }
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()> {
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();
    let mut first_render = true;
    loop {
        let mut events_processed = 0;
        let mut should_quit = false;
        while event_source.poll(Duration::from_millis(0))? && events_processed < 50 {
            let event = event_source.read()?;
            events_processed += 1;

            match event {
                Event::Mouse(mouse_event) => match mouse_event.kind {
                    MouseEventKind::ScrollLeft | MouseEventKind::ScrollRight => {}
                    _ => app.handle_mouse_event(mouse_event),
                },
                Event::Key(key) => {
                    if app.handle_key_event(key) == Some(AppAction::Quit) {
                        should_quit = true;
                    }
                }
                Event::Resize(cols, rows) => app.handle_resize(cols, rows),
                _ => {}
            }

            if should_quit {
                break;
            }
        }

        let mut needs_redraw = events_processed > 0;

        if first_render {
            needs_redraw = true;
            first_render = false;
        }

        if last_tick.elapsed() >= tick_rate {
            if app.tick() {
                debug!("Lightbox changed, forcing redraw");
                needs_redraw = true;
            }
            last_tick = Instant::now();
        }

        if needs_redraw {
            let draw_start = Instant::now();
            terminal.draw(|f| app.draw(f))?;
            let draw_duration = draw_start.elapsed();
            if draw_duration.as_millis() > 10 {
                debug!("Terminal draw/flush took {}ms", draw_duration.as_millis());
            }
        }

        if should_quit {
            return Ok(());
        }

        if events_processed == 0 {
            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));
            let _ = event_source.poll(timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Config;
    use crate::test_utils::FakeLoader;
    use std::sync::Arc;

    const PAGE: &str = r##"<html><head><title>Demo</title></head><body>
        <a href="#terms" rel="facybox.terms">Terms</a>
        <a href="#" rel="facybox">Nothing</a>
        <div id="terms"><p>Be nice.</p></div>
    </body></html>"##;

    fn app() -> App {
        let facybox = Facybox::new(Config::default()).with_loader(Arc::new(FakeLoader::new()));
        App::new(Page::parse("http://demo.test/index.html", PAGE), facybox)
    }

    #[test]
    fn test_enter_opens_selected_link() {
        let mut app = app();
        assert_eq!(app.links().items().len(), 2);
        app.handle_key_event(KeyEvent::from(KeyCode::Enter));
        assert_eq!(*app.facybox().state(), PopupState::Revealed);
        assert_eq!(app.facybox().slot().class(), "terms content");
    }

    #[test]
    fn test_popup_swallows_quit_key() {
        let mut app = app();
        app.open_href("#terms");
        assert_eq!(app.handle_key_event(KeyEvent::from(KeyCode::Char('q'))), None);
        assert!(app.facybox().is_visible());
        app.handle_key_event(KeyEvent::from(KeyCode::Esc));
        assert!(!app.facybox().is_visible());
        assert_eq!(
            app.handle_key_event(KeyEvent::from(KeyCode::Char('q'))),
            Some(AppAction::Quit)
        );
    }

    #[test]
    fn test_open_unbound_href() {
        let mut app = app();
        app.open_href("#missing");
        assert!(matches!(app.facybox().state(), PopupState::Failed(_)));
    }
}
