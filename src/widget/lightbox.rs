use crate::content::Content;
use crate::popup::PopupState;
use crate::resolve::gallery::Gallery;
use crate::template::FrameTemplate;
use crate::theme::current_theme;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

pub const FAILURE_HINT: &str = "Press ESC or click [×] to close";

/// Everything the lightbox needs to draw one frame.
pub struct LightboxView<'a> {
    pub template: &'a FrameTemplate,
    pub state: &'a PopupState,
    pub content: &'a Content,
    pub class_tag: Option<&'a str>,
    pub accent: Color,
    pub gallery: Option<&'a Gallery>,
}

/// Screen areas of the drawn popup, kept for mouse hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightboxLayout {
    pub popup: Rect,
    pub close: Rect,
    pub prev: Option<Rect>,
    pub next: Option<Rect>,
}

pub fn render(f: &mut Frame, popup: Rect, view: &LightboxView) -> LightboxLayout {
    let palette = current_theme();
    f.render_widget(Clear, popup);

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_set(view.template.border)
        .border_style(Style::default().fg(view.accent))
        .style(Style::default().bg(palette.base_00).fg(palette.base_05));
    if let Some(tag) = view.class_tag {
        block = block.title(format!(" {tag} "));
    }
    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let close_width = text_width(view.template.close_label);
    let close = Rect::new(
        popup.right().saturating_sub(close_width + 1).max(popup.x),
        popup.y,
        close_width,
        1,
    )
    .intersection(popup);
    f.buffer_mut().set_string(
        close.x,
        close.y,
        view.template.close_label,
        Style::default().fg(palette.base_08).bg(palette.base_00),
    );

    let (body, footer) = match view.gallery {
        Some(_) if inner.height > 1 => {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(1), Constraint::Length(1)])
                .split(inner);
            (rows[0], Some(rows[1]))
        }
        _ => (inner, None),
    };
    let body = body.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });

    match view.state {
        PopupState::Hidden => {}
        PopupState::Loading => {
            let loading = Paragraph::new(view.template.loading_label)
                .alignment(Alignment::Center)
                .style(
                    Style::default()
                        .fg(palette.base_03)
                        .add_modifier(Modifier::ITALIC),
                );
            f.render_widget(loading, body);
        }
        PopupState::Failed(message) => {
            let lines = vec![
                Line::styled(message.as_str(), Style::default().fg(palette.base_08)),
                Line::raw(""),
                Line::styled(FAILURE_HINT, Style::default().fg(palette.base_03)),
            ];
            f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), body);
        }
        PopupState::Revealed => render_content(f, body, view.content),
    }

    let (prev, next) = match (view.gallery, footer) {
        (Some(gallery), Some(footer)) => render_footer(f, footer, view.template, gallery),
        _ => (None, None),
    };

    LightboxLayout {
        popup,
        close,
        prev,
        next,
    }
}

fn render_content(f: &mut Frame, body: Rect, content: &Content) {
    match content {
        Content::Empty => {}
        Content::Html(html) => {
            let paragraph = Paragraph::new(html.text().clone()).wrap(Wrap { trim: false });
            f.render_widget(paragraph, body);
        }
        Content::Image(image) => {
            let (width, height) = image.cell_size(body.width, body.height);
            let area = Rect::new(
                body.x + (body.width - width) / 2,
                body.y + (body.height - height) / 2,
                width,
                height,
            );
            image.render(area, f.buffer_mut());
        }
    }
}

fn render_footer(
    f: &mut Frame,
    footer: Rect,
    template: &FrameTemplate,
    gallery: &Gallery,
) -> (Option<Rect>, Option<Rect>) {
    let palette = current_theme();
    let control = Style::default().fg(palette.base_0d);
    let footer = footer.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });

    let prev = Rect::new(footer.x, footer.y, text_width(template.prev_label), 1).intersection(footer);
    let next_width = text_width(template.next_label);
    let next = Rect::new(
        footer.right().saturating_sub(next_width).max(footer.x),
        footer.y,
        next_width,
        1,
    )
    .intersection(footer);

    let buf = f.buffer_mut();
    buf.set_string(prev.x, prev.y, template.prev_label, control);
    buf.set_string(next.x, next.y, template.next_label, control);

    let counter = gallery.counter();
    let counter_width = text_width(&counter);
    if footer.width >= counter_width {
        let x = footer.x + (footer.width - counter_width) / 2;
        buf.set_string(x, footer.y, &counter, Style::default().fg(palette.base_04));
    }

    (Some(prev), Some(next))
}

fn text_width(text: &str) -> u16 {
    Line::raw(text).width() as u16
}
