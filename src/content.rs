use crate::resolve::image::PopupImage;
use crate::theme::current_theme;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};

/// Whatever sits in the content slot.
#[derive(Debug, Clone, Default)]
pub enum Content {
    #[default]
    Empty,
    Html(HtmlContent),
    Image(PopupImage),
}

impl Content {
    pub fn html(markup: &str) -> Self {
        Content::Html(HtmlContent::parse(markup))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Content::Empty)
    }

    /// Plain text of the content, one entry per line. Images have none.
    pub fn plain_lines(&self) -> Vec<String> {
        match self {
            Content::Html(html) => html.plain_lines(),
            Content::Empty | Content::Image(_) => Vec::new(),
        }
    }
}

/// Markup rendered to styled terminal lines.
#[derive(Debug, Clone)]
pub struct HtmlContent {
    source: String,
    text: Text<'static>,
}

impl HtmlContent {
    pub fn parse(markup: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(markup);
        let mut writer = LineWriter::default();
        writer.walk(&dom.document, Style::default());
        Self {
            source: markup.to_string(),
            text: Text::from(writer.finish()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn text(&self) -> &Text<'static> {
        &self.text
    }

    pub fn plain_lines(&self) -> Vec<String> {
        self.text
            .lines
            .iter()
            .map(|line| line.spans.iter().map(|span| span.content.as_ref()).collect())
            .collect()
    }

    /// Widest line in terminal columns.
    pub fn width(&self) -> usize {
        self.text.width()
    }

    /// Number of rows once wrapped to `width` columns.
    pub fn wrapped_height(&self, width: usize) -> usize {
        let width = width.max(1);
        self.plain_lines()
            .iter()
            .map(|line| textwrap::wrap(line, width).len().max(1))
            .sum()
    }
}

const BLOCK_ELEMENTS: &[&str] = &[
    "p",
    "div",
    "section",
    "article",
    "header",
    "footer",
    "blockquote",
    "pre",
    "ul",
    "ol",
    "table",
    "tr",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
];

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "title", "template"];

#[derive(Default)]
struct LineWriter {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    preformatted: bool,
}

impl LineWriter {
    fn walk(&mut self, node: &Handle, style: Style) {
        match &node.data {
            NodeData::Document => self.walk_children(node, style),
            NodeData::Text { contents } => {
                let text = contents.borrow();
                self.push_text(&text, style);
            }
            NodeData::Element { name, attrs, .. } => {
                let tag: &str = &name.local;
                if SKIPPED_ELEMENTS.contains(&tag) {
                    return;
                }
                let palette = current_theme();
                match tag {
                    "br" => self.break_line(),
                    "hr" => {
                        self.break_line();
                        self.current
                            .push(Span::styled("────────", Style::default().fg(palette.base_03)));
                        self.break_line();
                    }
                    "img" => {
                        let alt = attrs
                            .borrow()
                            .iter()
                            .find(|attr| &*attr.name.local == "alt")
                            .map(|attr| attr.value.to_string())
                            .unwrap_or_default();
                        self.current.push(Span::styled(
                            format!("[image: {alt}]"),
                            Style::default().fg(palette.base_03),
                        ));
                    }
                    "li" => {
                        self.break_line();
                        self.current.push(Span::styled("• ", style));
                        self.walk_children(node, style);
                        self.break_line();
                    }
                    "pre" => {
                        self.break_line();
                        self.preformatted = true;
                        self.walk_children(node, style.fg(palette.base_0b));
                        self.preformatted = false;
                        self.break_line();
                    }
                    _ => {
                        let style = inline_style(tag, style);
                        let is_block = BLOCK_ELEMENTS.contains(&tag);
                        if is_block {
                            self.break_line();
                        }
                        self.walk_children(node, style);
                        if is_block {
                            self.break_line();
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn walk_children(&mut self, node: &Handle, style: Style) {
        for child in node.children.borrow().iter() {
            self.walk(child, style);
        }
    }

    fn push_text(&mut self, text: &str, style: Style) {
        if self.preformatted {
            let mut pieces = text.split('\n').peekable();
            while let Some(piece) = pieces.next() {
                if !piece.is_empty() {
                    self.current.push(Span::styled(piece.to_string(), style));
                }
                if pieces.peek().is_some() {
                    self.force_break();
                }
            }
            return;
        }

        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !text.is_empty() && !self.current.is_empty() {
                self.current.push(Span::raw(" "));
            }
            return;
        }
        let leading = text.starts_with(char::is_whitespace) && !self.current.is_empty();
        let trailing = text.ends_with(char::is_whitespace);
        let mut piece = String::new();
        if leading {
            piece.push(' ');
        }
        piece.push_str(&collapsed);
        if trailing {
            piece.push(' ');
        }
        self.current.push(Span::styled(piece, style));
    }

    /// Ends the current line if it has content.
    fn break_line(&mut self) {
        if self.current.iter().any(|span| !span.content.trim().is_empty()) {
            self.force_break();
        } else {
            self.current.clear();
        }
    }

    fn force_break(&mut self) {
        let spans = std::mem::take(&mut self.current);
        self.lines.push(trim_line(spans));
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.break_line();
        self.lines
    }
}

fn inline_style(tag: &str, style: Style) -> Style {
    let palette = current_theme();
    match tag {
        "b" | "strong" => style.add_modifier(Modifier::BOLD),
        "i" | "em" => style.add_modifier(Modifier::ITALIC),
        "u" => style.add_modifier(Modifier::UNDERLINED),
        "code" => style.fg(palette.base_0b),
        "a" => style.fg(palette.base_0d).add_modifier(Modifier::UNDERLINED),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            style.fg(palette.base_0a).add_modifier(Modifier::BOLD)
        }
        _ => style,
    }
}

fn trim_line(mut spans: Vec<Span<'static>>) -> Line<'static> {
    if let Some(first) = spans.first_mut() {
        let trimmed = first.content.trim_start().to_string();
        first.content = trimmed.into();
    }
    if let Some(last) = spans.last_mut() {
        let trimmed = last.content.trim_end().to_string();
        last.content = trimmed.into();
    }
    spans.retain(|span| !span.content.is_empty());
    Line::from(spans)
}
