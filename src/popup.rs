use crate::content::Content;
use crate::error::{FacyboxError, LoadError};
use crate::hooks::{Hook, Hooks, SubscriptionId};
use crate::overlay::Overlay;
use crate::page::{BoundLink, Page};
use crate::resolve::gallery::{Gallery, GalleryNav};
use crate::resolve::loader::{DefaultLoader, Loader, absolutize};
use crate::resolve::{self, Completion, HrefTarget, Resolved, Source, classify_href};
use crate::settings::{Config, Settings, SettingsOverride};
use crate::template::{self, FrameTemplate};
use crate::theme::{current_theme, parse_hex_color};
use crate::widget::lightbox::{self, FAILURE_HINT, LightboxLayout, LightboxView};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use log::{debug, warn};
use ratatui::Frame;
use ratatui::layout::{Position, Rect, Size};
use ratatui::text::Line;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Top offset used instead of centring when the popup is taller than the
/// viewport.
pub const OVERFLOW_TOP_OFFSET: i32 = 40;

const DEFAULT_CLASS: &str = "content";
const MIN_INNER_WIDTH: u16 = 12;
/// Border plus one column of padding on each side.
const FRAME_WIDTH: u16 = 4;
const FRAME_HEIGHT: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupState {
    Hidden,
    Loading,
    Revealed,
    Failed(String),
}

impl PopupState {
    pub fn is_visible(&self) -> bool {
        !matches!(self, PopupState::Hidden)
    }

    fn name(&self) -> &'static str {
        match self {
            PopupState::Hidden => "hidden",
            PopupState::Loading => "loading",
            PopupState::Revealed => "revealed",
            PopupState::Failed(_) => "failed",
        }
    }
}

/// The content container and its class list.
#[derive(Debug, Clone)]
pub struct ContentSlot {
    class: String,
    content: Content,
}

impl Default for ContentSlot {
    fn default() -> Self {
        Self {
            class: DEFAULT_CLASS.to_string(),
            content: Content::Empty,
        }
    }
}

impl ContentSlot {
    /// Full class list, e.g. `"terms content"`.
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn class_tag(&self) -> Option<&str> {
        self.class
            .strip_suffix(DEFAULT_CLASS)
            .map(str::trim_end)
            .filter(|tag| !tag.is_empty())
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Replaces whatever tag was set before.
    fn set_class_tag(&mut self, tag: Option<&str>) {
        self.class = match tag.map(str::trim).filter(|tag| !tag.is_empty()) {
            Some(tag) => format!("{tag} {DEFAULT_CLASS}"),
            None => DEFAULT_CLASS.to_string(),
        };
    }

    fn reset_class(&mut self) {
        self.class = DEFAULT_CLASS.to_string();
    }
}

/// Top-left corner of the popup relative to the viewport. May be negative or
/// out of range; the renderer clamps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
}

/// Centres `popup` in `viewport` on both axes, pinning it to
/// [`OVERFLOW_TOP_OFFSET`] when it is taller than the viewport.
pub fn centre(viewport: Size, popup: Size) -> Placement {
    let x = i32::from(viewport.width / 2) - i32::from(popup.width / 2);
    let y = if viewport.height < popup.height {
        OVERFLOW_TOP_OFFSET
    } else {
        i32::from(viewport.height / 2) - i32::from(popup.height / 2)
    };
    Placement { x, y }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacyboxAction {
    Closed,
    Navigated,
}

/// Requests a close from outside the event loop, e.g. from a hook listener.
/// Honoured on the next [`Facybox::poll`].
#[derive(Debug, Clone)]
pub struct CloseHandle(Arc<AtomicBool>);

impl CloseHandle {
    pub fn request_close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct PendingLoad {
    generation: u64,
    href: String,
    started: Instant,
}

/// The lightbox.
pub struct Facybox {
    config: Config,
    template: Option<FrameTemplate>,
    state: PopupState,
    slot: ContentSlot,
    pending_class: Option<String>,
    overlay: Overlay,
    hooks: Hooks,
    esc_bound: bool,
    nav: Option<GalleryNav>,
    page: Option<Page>,
    base: Option<Url>,
    loader: Arc<dyn Loader>,
    generation: u64,
    pending: Option<PendingLoad>,
    loading_since: Option<Instant>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    close_requested: Arc<AtomicBool>,
    viewport: Size,
    size: Size,
    placement: Placement,
    layout: Option<LightboxLayout>,
}

impl Facybox {
    pub fn new(config: Config) -> Self {
        let loader = Arc::new(DefaultLoader::new(config.load_timeout()));
        let (tx, rx) = mpsc::channel();
        Self {
            config,
            template: None,
            state: PopupState::Hidden,
            slot: ContentSlot::default(),
            pending_class: None,
            overlay: Overlay::new(),
            hooks: Hooks::new(),
            esc_bound: false,
            nav: None,
            page: None,
            base: None,
            loader,
            generation: 0,
            pending: None,
            loading_since: None,
            tx,
            rx,
            close_requested: Arc::new(AtomicBool::new(false)),
            viewport: Size::new(80, 24),
            size: Size::default(),
            placement: Placement::default(),
            layout: None,
        }
    }

    /// Merges `overrides` into `settings` and freezes the result.
    pub fn from_settings(mut settings: Settings, overrides: SettingsOverride) -> Self {
        settings.merge(overrides);
        Self::new(Config::new(settings))
    }

    pub fn with_loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &PopupState {
        &self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state.is_visible()
    }

    pub fn is_initialized(&self) -> bool {
        self.template.is_some()
    }

    pub fn slot(&self) -> &ContentSlot {
        &self.slot
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn gallery(&self) -> Option<&Gallery> {
        self.nav.as_ref().map(GalleryNav::gallery)
    }

    pub fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Outer size of the popup for the current state and content.
    pub fn popup_size(&self) -> Size {
        self.size
    }

    pub fn is_loading_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn on(&mut self, hook: Hook, listener: impl FnMut(Hook) + 'static) -> SubscriptionId {
        self.hooks.on(hook, listener)
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle(self.close_requested.clone())
    }

    /// Attaches `page` and returns its lightbox links. Builds the chrome right
    /// away unless `noAutoload` is set; a page without links changes nothing.
    pub fn bind(&mut self, page: Page) -> Vec<BoundLink> {
        let links = page.bind_links();
        if links.is_empty() {
            return links;
        }
        self.base = page.base_url();
        self.page = Some(page);
        if !self.config.no_autoload() {
            self.init();
        }
        links
    }

    /// One-time setup of the chrome.
    pub fn init(&mut self) {
        if self.template.is_some() {
            return;
        }
        self.hooks.emit(Hook::Init);
        self.template = Some(template::build(&self.config));
        debug!("Popup chrome built");
    }

    pub fn loading(&mut self) {
        self.init();
        if self.state == PopupState::Loading {
            return;
        }
        self.overlay.show(&self.config);
        self.slot.content = Content::Empty;
        self.state = PopupState::Loading;
        self.loading_since = Some(Instant::now());
        self.relayout();
        if !self.config.modal() {
            self.esc_bound = true;
        }
        self.hooks.emit(Hook::Loading);
    }

    /// Shows `content`. `class_tag` replaces any tag from a previous reveal.
    pub fn reveal(&mut self, content: Content, class_tag: Option<&str>) -> Result<(), FacyboxError> {
        if matches!(self.state, PopupState::Hidden | PopupState::Failed(_)) {
            return Err(FacyboxError::InvalidTransition {
                from: self.state.name(),
                action: "reveal",
            });
        }
        self.hooks.emit(Hook::BeforeReveal);
        self.slot.set_class_tag(class_tag);
        self.slot.content = content;
        self.pending = None;
        self.state = PopupState::Revealed;
        self.relayout();
        self.hooks.emit(Hook::Reveal);
        self.hooks.emit(Hook::AfterReveal);
        Ok(())
    }

    /// Hides the popup and backdrop. Always returns `false` so it can be
    /// handed back from an input handler to stop further processing.
    pub fn close(&mut self) -> bool {
        self.hooks.emit(Hook::Close);

        self.esc_bound = false;
        self.state = PopupState::Hidden;
        self.slot.reset_class();
        self.overlay.hide(&self.config);
        if let Some(nav) = self.nav.take() {
            nav.dispose();
        }
        self.generation += 1;
        self.pending = None;
        self.close_requested.store(false, Ordering::SeqCst);
        self.layout = None;

        self.hooks.emit(Hook::AfterClose);
        false
    }

    pub fn open(
        &mut self,
        source: impl Into<Source>,
        class_tag: Option<&str>,
    ) -> Result<(), FacyboxError> {
        let source = source.into();
        debug!("Opening {source:?}");
        self.loading();
        self.supersede();
        if !matches!(source, Source::Images { .. }) {
            self.drop_gallery();
        }
        self.pending_class = class_tag.map(str::to_string);
        match source {
            Source::Ajax(href) => self.reveal_ajax(&href),
            Source::Image(href) => self.reveal_image(&href),
            Source::Images { images, initial } => self.reveal_gallery(images, initial.as_deref()),
            Source::Div(selector) => self.reveal_div(&selector),
            Source::Deferred(load) => load(self),
            Source::Html(markup) => self.reveal(Content::html(&markup), class_tag),
        }
    }

    /// What clicking a bound link does.
    pub fn open_link(&mut self, link: &BoundLink) -> Result<(), FacyboxError> {
        self.loading();
        self.supersede();
        self.drop_gallery();
        self.pending_class = link.class_tag.clone();
        self.reveal_href(&link.href)
    }

    pub fn step_gallery(&mut self, delta: isize) -> Result<(), FacyboxError> {
        let Some(nav) = self.nav.as_mut() else {
            return Ok(());
        };
        let href = nav.gallery_mut().step(delta).to_string();
        self.reveal_image(&href)
    }

    /// Applies finished loads, close requests and the load timeout. Returns
    /// true when anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;

        if self.close_requested.swap(false, Ordering::SeqCst) {
            self.close();
            changed = true;
        }

        while let Ok(completion) = self.rx.try_recv() {
            let current = self
                .pending
                .as_ref()
                .is_some_and(|pending| pending.generation == completion.generation);
            if !current {
                debug!(
                    "Dropping stale load from generation {} (now {})",
                    completion.generation, self.generation
                );
                continue;
            }
            self.pending = None;
            let class_tag = self.pending_class.clone();
            let revealed = match completion.result {
                Ok(Resolved::Html(body)) => self.reveal(Content::html(&body), class_tag.as_deref()),
                Ok(Resolved::Image(image)) => {
                    self.reveal(Content::Image(image), class_tag.as_deref())
                }
                Err(e) => {
                    self.fail(e);
                    Ok(())
                }
            };
            if let Err(e) = revealed {
                warn!("Could not apply finished load: {e}");
            }
            changed = true;
        }

        // Content that never arrives, e.g. a deferred source that never
        // reveals, runs on the clock started by `loading`.
        let clock = match &self.pending {
            Some(pending) => Some((pending.started, pending.href.clone())),
            None if self.state == PopupState::Loading => self
                .loading_since
                .map(|since| (since, "deferred content".to_string())),
            None => None,
        };
        let timed_out = clock
            .filter(|(started, _)| started.elapsed() >= self.config.load_timeout())
            .map(|(_, href)| href);
        if let Some(href) = timed_out {
            self.fail(LoadError::TimedOut {
                href,
                after: self.config.load_timeout(),
            });
            changed = true;
        }

        changed
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.viewport = Size::new(width, height);
        if self.is_visible() {
            self.relayout();
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<FacyboxAction> {
        if key.kind != KeyEventKind::Press || !self.is_visible() {
            return None;
        }
        match key.code {
            KeyCode::Esc if self.esc_bound || matches!(self.state, PopupState::Failed(_)) => {
                self.close();
                Some(FacyboxAction::Closed)
            }
            KeyCode::Left | KeyCode::Char('h') if self.nav.is_some() => {
                self.navigate(-1);
                Some(FacyboxAction::Navigated)
            }
            KeyCode::Right | KeyCode::Char('l') if self.nav.is_some() => {
                self.navigate(1);
                Some(FacyboxAction::Navigated)
            }
            _ => None,
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> Option<FacyboxAction> {
        if !matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) || !self.is_visible() {
            return None;
        }
        let layout = self.layout?;
        let position = Position::new(mouse.column, mouse.row);

        if layout.close.contains(position) {
            self.close();
            return Some(FacyboxAction::Closed);
        }
        if layout.prev.is_some_and(|prev| prev.contains(position)) {
            self.navigate(-1);
            return Some(FacyboxAction::Navigated);
        }
        if layout.next.is_some_and(|next| next.contains(position)) {
            self.navigate(1);
            return Some(FacyboxAction::Navigated);
        }
        let closes_on_click = self
            .overlay
            .backdrop()
            .is_some_and(|backdrop| backdrop.closes_on_click);
        if !layout.popup.contains(position) && closes_on_click {
            self.close();
            return Some(FacyboxAction::Closed);
        }
        None
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        if !self.is_visible() {
            self.layout = None;
            return;
        }
        if Size::new(area.width, area.height) != self.viewport {
            self.resize(area.width, area.height);
        }
        let Some(template) = &self.template else {
            return;
        };

        self.overlay.render(area, f.buffer_mut());

        let popup = place(area, self.placement, self.size);
        let class_tag = self.slot.class_tag();
        let palette = current_theme();
        let accent = if matches!(self.state, PopupState::Failed(_)) {
            palette.base_08
        } else {
            class_tag
                .and_then(|tag| self.config.style_for(tag))
                .and_then(|hex| parse_hex_color(hex).ok())
                .unwrap_or(palette.base_0c)
        };
        let view = LightboxView {
            template,
            state: &self.state,
            content: &self.slot.content,
            class_tag,
            accent,
            gallery: self.nav.as_ref().map(GalleryNav::gallery),
        };
        self.layout = Some(lightbox::render(f, popup, &view));
    }

    fn reveal_href(&mut self, href: &str) -> Result<(), FacyboxError> {
        // Links are classified by the address they resolve to, so
        // `index.html#panel` on index.html is a fragment.
        let href = absolutize(self.base.as_ref(), href);
        let location = self
            .base
            .as_ref()
            .map(Url::as_str)
            .or_else(|| self.page.as_ref().map(Page::location));
        match classify_href(&href, location, &self.config) {
            HrefTarget::Div(selector) => self.reveal_div(&selector),
            HrefTarget::Skip => Ok(()),
            HrefTarget::Image(href) => self.reveal_image(&href),
            HrefTarget::Ajax(href) => self.reveal_ajax(&href),
        }
    }

    fn reveal_div(&mut self, selector: &str) -> Result<(), FacyboxError> {
        if selector == "#" {
            return Ok(());
        }
        match self.page.as_ref().and_then(|page| page.inner_html(selector)) {
            Some(markup) => {
                let class_tag = self.pending_class.clone();
                self.reveal(Content::html(&markup), class_tag.as_deref())
            }
            None => {
                self.fail(LoadError::MissingElement(selector.to_string()));
                Ok(())
            }
        }
    }

    fn reveal_ajax(&mut self, href: &str) -> Result<(), FacyboxError> {
        let href = absolutize(self.base.as_ref(), href);
        let generation = self.begin_pending(&href);
        resolve::spawn_fetch(self.loader.clone(), href, generation, self.tx.clone());
        Ok(())
    }

    fn reveal_image(&mut self, href: &str) -> Result<(), FacyboxError> {
        self.slot.content = Content::Empty;
        self.loading();
        let href = absolutize(self.base.as_ref(), href);
        let generation = self.begin_pending(&href);
        resolve::spawn_image(self.loader.clone(), href, generation, self.tx.clone());
        Ok(())
    }

    fn reveal_gallery(
        &mut self,
        images: Vec<String>,
        initial: Option<&str>,
    ) -> Result<(), FacyboxError> {
        let Some(gallery) = Gallery::new(images, initial) else {
            self.fail(LoadError::EmptyGallery);
            return Ok(());
        };
        let href = gallery.current().to_string();
        if let Some(previous) = self.nav.replace(GalleryNav::new(gallery)) {
            previous.dispose();
        }
        self.reveal_image(&href)
    }

    fn navigate(&mut self, delta: isize) {
        if let Err(e) = self.step_gallery(delta) {
            warn!("Gallery navigation failed: {e}");
        }
    }

    /// Invalidates whatever the previous invocation was waiting for.
    fn supersede(&mut self) {
        self.generation += 1;
        self.pending = None;
        self.loading_since = Some(Instant::now());
    }

    /// Navigation belongs to one gallery invocation.
    fn drop_gallery(&mut self) {
        if let Some(nav) = self.nav.take() {
            nav.dispose();
            self.relayout();
        }
    }

    /// Starts a new generation so completions from older requests are ignored.
    fn begin_pending(&mut self, href: &str) -> u64 {
        self.generation += 1;
        self.pending = Some(PendingLoad {
            generation: self.generation,
            href: href.to_string(),
            started: Instant::now(),
        });
        debug!("Loading {href} (generation {})", self.generation);
        self.generation
    }

    fn fail(&mut self, error: LoadError) {
        warn!("facybox: {error}");
        self.pending = None;
        self.state = PopupState::Failed(error.to_string());
        self.relayout();
        self.hooks.emit(Hook::Failed);
    }

    fn relayout(&mut self) {
        self.size = self.measure();
        self.placement = centre(self.viewport, self.size);
    }

    fn measure(&self) -> Size {
        let Some(template) = &self.template else {
            return Size::default();
        };
        let footer: u16 = if self.nav.is_some() { 1 } else { 0 };
        let max_inner_width = self
            .viewport
            .width
            .saturating_sub(FRAME_WIDTH + 4)
            .max(MIN_INNER_WIDTH);
        let max_inner_height = self
            .viewport
            .height
            .saturating_sub(FRAME_HEIGHT + footer + 2)
            .max(1);

        let min_inner_width = match self.gallery() {
            Some(gallery) => {
                let controls = line_width(template.prev_label)
                    + line_width(template.next_label)
                    + line_width(&gallery.counter())
                    + 4;
                controls.max(MIN_INNER_WIDTH)
            }
            None => MIN_INNER_WIDTH,
        };

        let (width, height) = match &self.state {
            PopupState::Hidden => return Size::default(),
            PopupState::Loading => (line_width(template.loading_label), 1),
            PopupState::Failed(message) => {
                let width = line_width(message)
                    .max(line_width(FAILURE_HINT))
                    .min(max_inner_width);
                let rows = cells(textwrap::wrap(message, usize::from(width).max(1)).len());
                (width, rows.saturating_add(2))
            }
            PopupState::Revealed => match &self.slot.content {
                Content::Html(html) => {
                    let width = cells(html.width().min(usize::from(max_inner_width))).max(1);
                    (width, cells(html.wrapped_height(usize::from(width))))
                }
                Content::Image(image) => image.cell_size(max_inner_width, max_inner_height),
                Content::Empty => (0, 1),
            },
        };

        Size::new(
            width.max(min_inner_width).saturating_add(FRAME_WIDTH),
            height.max(1).saturating_add(footer + FRAME_HEIGHT),
        )
    }
}

/// Saturating conversion of a row or column count.
fn cells(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

fn line_width(text: &str) -> u16 {
    cells(Line::raw(text).width())
}

/// Turns a placement into a rectangle inside `area`.
fn place(area: Rect, placement: Placement, size: Size) -> Rect {
    let width = size.width.min(area.width);
    let height = size.height.min(area.height);
    let x = placement.x.clamp(0, i32::from(area.width - width)) as u16;
    let y = placement.y.clamp(0, i32::from(area.height - height)) as u16;
    Rect::new(area.x + x, area.y + y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeLoader;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn facybox() -> Facybox {
        Facybox::new(Config::default()).with_loader(Arc::new(FakeLoader::new()))
    }

    fn record_hooks(fb: &mut Facybox) -> Rc<RefCell<Vec<Hook>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        fb.hooks_mut().on_any(move |hook| log.borrow_mut().push(hook));
        seen
    }

    #[test]
    fn test_centre_both_axes() {
        let placement = centre(Size::new(80, 24), Size::new(21, 9));
        assert_eq!(placement, Placement { x: 30, y: 8 });
    }

    #[test]
    fn test_centre_pins_tall_popups() {
        let placement = centre(Size::new(80, 24), Size::new(20, 30));
        assert_eq!(placement, Placement { x: 30, y: OVERFLOW_TOP_OFFSET });
    }

    #[test]
    fn test_centre_allows_negative_left_for_wide_popups() {
        let placement = centre(Size::new(10, 24), Size::new(31, 4));
        assert_eq!(placement.x, 5 - 15);
    }

    #[test]
    fn test_place_clamps_into_area() {
        let area = Rect::new(0, 0, 80, 24);
        let rect = place(area, Placement { x: 30, y: OVERFLOW_TOP_OFFSET }, Size::new(20, 30));
        assert_eq!(rect, Rect::new(30, 0, 20, 24));
        let rect = place(area, Placement { x: -5, y: 3 }, Size::new(90, 4));
        assert_eq!(rect, Rect::new(0, 3, 80, 4));
    }

    #[test]
    fn test_loading_is_idempotent() {
        let mut fb = facybox();
        let seen = record_hooks(&mut fb);
        fb.loading();
        fb.loading();
        assert_eq!(*fb.state(), PopupState::Loading);
        assert_eq!(*seen.borrow(), vec![Hook::Init, Hook::Loading]);
        assert!(fb.overlay().is_visible());
    }

    #[test]
    fn test_reveal_requires_visible_popup() {
        let mut fb = facybox();
        let err = fb.reveal(Content::html("hi"), None).unwrap_err();
        assert!(matches!(
            err,
            FacyboxError::InvalidTransition {
                from: "hidden",
                action: "reveal"
            }
        ));
    }

    #[test]
    fn test_reveal_replaces_class_tag() {
        let mut fb = facybox();
        fb.loading();
        fb.reveal(Content::html("one"), Some("first")).unwrap();
        assert_eq!(fb.slot().class(), "first content");
        fb.reveal(Content::html("two"), Some("second")).unwrap();
        assert_eq!(fb.slot().class(), "second content");
        assert_eq!(fb.slot().class_tag(), Some("second"));
        fb.reveal(Content::html("three"), None).unwrap();
        assert_eq!(fb.slot().class(), "content");
        assert_eq!(fb.slot().class_tag(), None);
    }

    #[test]
    fn test_close_resets_class_and_reports_unhandled() {
        let mut fb = facybox();
        let seen = record_hooks(&mut fb);
        fb.open("<p>hi</p>", Some("terms")).unwrap();
        assert_eq!(fb.slot().class(), "terms content");

        assert!(!fb.close());
        assert_eq!(*fb.state(), PopupState::Hidden);
        assert_eq!(fb.slot().class(), "content");
        assert!(!fb.overlay().is_visible());
        assert_eq!(
            *seen.borrow(),
            vec![
                Hook::Init,
                Hook::Loading,
                Hook::BeforeReveal,
                Hook::Reveal,
                Hook::AfterReveal,
                Hook::Close,
                Hook::AfterClose,
            ]
        );
    }

    #[test]
    fn test_close_from_loading() {
        let mut fb = facybox();
        fb.loading();
        fb.close();
        assert_eq!(*fb.state(), PopupState::Hidden);
        fb.loading();
        assert_eq!(*fb.state(), PopupState::Loading);
    }

    #[test]
    fn test_init_runs_once() {
        let mut fb = facybox();
        let seen = record_hooks(&mut fb);
        fb.init();
        fb.init();
        fb.loading();
        assert_eq!(
            seen.borrow().iter().filter(|hook| **hook == Hook::Init).count(),
            1
        );
        assert!(fb.is_initialized());
    }

    #[test]
    fn test_bind_autoloads_unless_disabled() {
        let html = r##"<a href="#x" rel="facybox">x</a><div id="x">x</div>"##;

        let mut fb = facybox();
        assert_eq!(fb.bind(Page::parse("http://t.test/", html)).len(), 1);
        assert!(fb.is_initialized());

        let mut lazy = Facybox::from_settings(
            Settings::default(),
            SettingsOverride {
                no_autoload: Some(true),
                ..SettingsOverride::default()
            },
        );
        lazy.bind(Page::parse("http://t.test/", html));
        assert!(!lazy.is_initialized());
    }

    #[test]
    fn test_bind_without_links_is_noop() {
        let mut fb = facybox();
        assert!(fb.bind(Page::parse("http://t.test/", "<p>none</p>")).is_empty());
        assert!(!fb.is_initialized());
        assert!(fb.page().is_none());
    }

    #[test]
    fn test_bare_fragment_link_is_skipped() {
        let mut fb = facybox();
        let link = BoundLink {
            href: "#".to_string(),
            label: "nothing".to_string(),
            class_tag: None,
        };
        fb.open_link(&link).unwrap();
        assert_eq!(*fb.state(), PopupState::Loading);
        assert!(!fb.is_loading_pending());
    }

    #[test]
    fn test_missing_div_fails() {
        let mut fb = facybox();
        fb.open(Source::Div("#nope".to_string()), None).unwrap();
        assert!(matches!(fb.state(), PopupState::Failed(message) if message.contains("#nope")));
        assert!(fb.reveal(Content::html("late"), None).is_err());
    }

    #[test]
    fn test_escape_closes_unless_modal() {
        let esc = KeyEvent::from(KeyCode::Esc);

        let mut fb = facybox();
        fb.open("hi", None).unwrap();
        assert_eq!(fb.handle_key(esc), Some(FacyboxAction::Closed));
        assert!(!fb.is_visible());

        let mut modal = Facybox::new(Config::new(Settings {
            modal: true,
            ..Settings::default()
        }));
        modal.open("hi", None).unwrap();
        assert_eq!(modal.handle_key(esc), None);
        assert!(modal.is_visible());
    }

    #[test]
    fn test_failed_popup_can_always_be_dismissed() {
        let mut modal = Facybox::new(Config::new(Settings {
            modal: true,
            ..Settings::default()
        }));
        modal.open(Source::Images { images: Vec::new(), initial: None }, None).unwrap();
        assert!(matches!(modal.state(), PopupState::Failed(_)));
        assert_eq!(modal.handle_key(KeyEvent::from(KeyCode::Esc)), Some(FacyboxAction::Closed));
    }

    #[test]
    fn test_unfinished_deferred_load_times_out() {
        let mut modal = Facybox::new(Config::new(Settings {
            modal: true,
            load_timeout_secs: 0.05,
            ..Settings::default()
        }));
        modal.open(Source::deferred(|_| Ok(())), None).unwrap();
        assert!(!modal.poll());
        assert_eq!(*modal.state(), PopupState::Loading);

        std::thread::sleep(std::time::Duration::from_millis(100));
        assert!(modal.poll());
        assert!(matches!(modal.state(), PopupState::Failed(message) if message.contains("did not load")));
        assert_eq!(modal.handle_key(KeyEvent::from(KeyCode::Esc)), Some(FacyboxAction::Closed));
    }

    #[test]
    fn test_bare_fragment_link_times_out() {
        let mut fb = Facybox::new(Config::new(Settings {
            load_timeout_secs: 0.05,
            ..Settings::default()
        }))
        .with_loader(Arc::new(FakeLoader::new()));
        let link = BoundLink {
            href: "#".to_string(),
            label: "nothing".to_string(),
            class_tag: None,
        };
        fb.open_link(&link).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert!(fb.poll());
        assert!(matches!(fb.state(), PopupState::Failed(_)));
    }

    #[test]
    fn test_non_gallery_open_disposes_navigation() {
        let mut fb = facybox();
        let images = vec!["a.jpg".to_string(), "b.jpg".to_string()];
        fb.open(Source::Images { images, initial: None }, None).unwrap();
        assert_eq!(fb.gallery().map(Gallery::counter).as_deref(), Some("1 / 2"));

        fb.open("<p>terms</p>", Some("terms")).unwrap();
        assert!(fb.gallery().is_none());
        assert_eq!(fb.handle_key(KeyEvent::from(KeyCode::Left)), None);
        assert_eq!(fb.slot().content().plain_lines(), vec!["terms"]);
        assert_eq!(fb.popup_size().height, 3);
    }

    #[test]
    fn test_link_open_disposes_navigation() {
        let mut fb = facybox();
        let images = vec!["a.jpg".to_string(), "b.jpg".to_string()];
        fb.open(Source::Images { images, initial: None }, None).unwrap();
        let link = BoundLink {
            href: "remote.html".to_string(),
            label: "remote".to_string(),
            class_tag: None,
        };
        fb.open_link(&link).unwrap();
        assert!(fb.gallery().is_none());
        assert_eq!(fb.handle_key(KeyEvent::from(KeyCode::Right)), None);
    }

    #[test]
    fn test_cells_saturate() {
        assert_eq!(cells(12), 12);
        assert_eq!(cells(70_000), u16::MAX);
    }

    #[test]
    fn test_huge_content_height_saturates() {
        let mut fb = facybox();
        fb.open("<p>x</p>".repeat(70_000), None).unwrap();
        assert_eq!(fb.popup_size().height, u16::MAX);
    }

    #[test]
    fn test_close_handle_is_honoured_on_poll() {
        let mut fb = facybox();
        let handle = fb.close_handle();
        fb.on(Hook::AfterReveal, move |_| handle.request_close());
        fb.open("<p>bye</p>", None).unwrap();
        assert_eq!(*fb.state(), PopupState::Revealed);
        assert!(fb.poll());
        assert_eq!(*fb.state(), PopupState::Hidden);
        assert!(!fb.poll());
    }

    #[test]
    fn test_deferred_source_runs_while_loading() {
        let mut fb = facybox();
        fb.open(
            Source::deferred(|fb| {
                assert_eq!(*fb.state(), PopupState::Loading);
                fb.reveal(Content::html("later"), Some("deferred"))
            }),
            None,
        )
        .unwrap();
        assert_eq!(*fb.state(), PopupState::Revealed);
        assert_eq!(fb.slot().content().plain_lines(), vec!["later"]);
    }

    #[test]
    fn test_reveal_sizes_and_centres_popup() {
        let mut fb = facybox();
        fb.resize(100, 30);
        fb.open("<p>0123456789abcdefghij</p>", None).unwrap();
        assert_eq!(fb.popup_size(), Size::new(24, 3));
        assert_eq!(fb.placement(), Placement { x: 38, y: 14 });
    }

    #[test]
    fn test_tall_content_is_pinned() {
        let mut fb = facybox();
        fb.resize(40, 10);
        let markup: String = (0..20).map(|i| format!("<p>line {i}</p>")).collect();
        fb.open(markup, None).unwrap();
        assert!(fb.popup_size().height > 10);
        assert_eq!(fb.placement().y, OVERFLOW_TOP_OFFSET);
    }
}
