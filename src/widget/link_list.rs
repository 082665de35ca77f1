use crate::page::BoundLink;
use crate::theme::current_theme;
use crossterm::event::{KeyCode, KeyEvent};
use log::debug;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
};

pub enum LinkListAction {
    Open(BoundLink),
    Quit,
}

/// The lightbox links of the current page, one per row.
pub struct LinkList {
    title: String,
    items: Vec<BoundLink>,
    state: ListState,
    last_area: Option<Rect>,
}

impl LinkList {
    pub fn new(title: impl Into<String>, items: Vec<BoundLink>) -> Self {
        let mut state = ListState::default();
        if !items.is_empty() {
            state.select(Some(0));
        }
        LinkList {
            title: title.into(),
            items,
            state,
            last_area: None,
        }
    }

    pub fn items(&self) -> &[BoundLink] {
        &self.items
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        self.last_area = Some(area);
        let palette = current_theme();

        let items: Vec<ListItem> = self
            .items
            .iter()
            .map(|link| {
                let mut spans = vec![Span::styled(
                    link.label.as_str(),
                    Style::default().fg(palette.base_05),
                )];
                if let Some(tag) = &link.class_tag {
                    spans.push(Span::styled(
                        format!(" .{tag}"),
                        Style::default().fg(palette.base_0e),
                    ));
                }
                spans.push(Span::styled(
                    format!("  {}", link.href),
                    Style::default().fg(palette.base_03),
                ));
                ListItem::new(Line::from(spans))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .title(format!(" {} ", self.title))
                    .title_bottom(" ↑/↓ select · Enter open · q quit ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.base_0c))
                    .style(Style::default().bg(palette.base_00)),
            )
            .highlight_style(
                Style::default()
                    .bg(palette.base_02)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("» ");

        f.render_stateful_widget(list, area, &mut self.state);
    }

    pub fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < self.items.len() => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => self.items.len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn selected(&self) -> Option<&BoundLink> {
        self.state.selected().and_then(|i| self.items.get(i))
    }

    /// Selects the row under the cursor. Returns true if a link was hit.
    pub fn handle_mouse_click(&mut self, x: u16, y: u16) -> bool {
        let Some(area) = self.last_area else {
            return false;
        };
        if x < area.x || x >= area.right() || y <= area.y || y + 1 >= area.bottom() {
            return false;
        }
        let index = self.state.offset() + usize::from(y - area.y - 1);
        if index < self.items.len() {
            debug!("LinkList: clicked row {index}");
            self.state.select(Some(index));
            return true;
        }
        false
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<LinkListAction> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.next();
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.previous();
                None
            }
            KeyCode::Char('g') | KeyCode::Home => {
                if !self.items.is_empty() {
                    self.state.select(Some(0));
                }
                None
            }
            KeyCode::Char('G') | KeyCode::End => {
                if !self.items.is_empty() {
                    self.state.select(Some(self.items.len() - 1));
                }
                None
            }
            KeyCode::Enter => self.selected().cloned().map(LinkListAction::Open),
            KeyCode::Char('q') | KeyCode::Esc => Some(LinkListAction::Quit),
            _ => None,
        }
    }
}
