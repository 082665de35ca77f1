//! Content resolvers: descriptors in, content out. The synchronous ones (div,
//! raw HTML) live on `Facybox`; the ones that fetch run here on worker
//! threads and report back through a channel.

pub mod gallery;
pub mod image;
pub mod loader;

use crate::error::{FacyboxError, LoadError};
use crate::popup::Facybox;
use crate::settings::Config;
use self::image::PopupImage;
use self::loader::Loader;
use log::debug;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

pub type DeferredLoad = Box<dyn FnOnce(&mut Facybox) -> Result<(), FacyboxError>>;

/// What to show in the popup.
pub enum Source {
    Ajax(String),
    Image(String),
    Images {
        images: Vec<String>,
        initial: Option<String>,
    },
    Div(String),
    Html(String),
    /// Runs with the popup already in its loading state; expected to reveal
    /// something eventually.
    Deferred(DeferredLoad),
}

impl Source {
    pub fn deferred(load: impl FnOnce(&mut Facybox) -> Result<(), FacyboxError> + 'static) -> Self {
        Source::Deferred(Box::new(load))
    }
}

impl From<&str> for Source {
    fn from(markup: &str) -> Self {
        Source::Html(markup.to_string())
    }
}

impl From<String> for Source {
    fn from(markup: String) -> Self {
        Source::Html(markup)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Ajax(url) => f.debug_tuple("Ajax").field(url).finish(),
            Source::Image(url) => f.debug_tuple("Image").field(url).finish(),
            Source::Images { images, initial } => f
                .debug_struct("Images")
                .field("images", images)
                .field("initial", initial)
                .finish(),
            Source::Div(selector) => f.debug_tuple("Div").field(selector).finish(),
            Source::Html(markup) => f.debug_tuple("Html").field(markup).finish(),
            Source::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Where a link's href leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HrefTarget {
    Div(String),
    /// A bare `#`: nothing to show.
    Skip,
    Image(String),
    Ajax(String),
}

/// Sorts an href into div, image or ajax. `location` is the address of the
/// page the link sits on; a prefix of it is stripped before the fragment test.
pub fn classify_href(href: &str, location: Option<&str>, config: &Config) -> HrefTarget {
    if href.contains('#') {
        let page = location
            .and_then(|location| location.split('#').next())
            .unwrap_or_default();
        let target = if page.is_empty() {
            href.to_string()
        } else {
            href.replacen(page, "", 1)
        };
        if target == "#" {
            return HrefTarget::Skip;
        }
        HrefTarget::Div(target)
    } else if config.is_image_href(href) {
        HrefTarget::Image(href.to_string())
    } else {
        HrefTarget::Ajax(href.to_string())
    }
}

#[derive(Debug)]
pub(crate) enum Resolved {
    Html(String),
    Image(PopupImage),
}

/// A finished fetch, tagged with the generation it was requested under.
#[derive(Debug)]
pub(crate) struct Completion {
    pub generation: u64,
    pub result: Result<Resolved, LoadError>,
}

pub(crate) fn spawn_fetch(
    loader: Arc<dyn Loader>,
    href: String,
    generation: u64,
    tx: Sender<Completion>,
) {
    thread::spawn(move || {
        let result = loader.fetch_text(&href).map(Resolved::Html);
        send(&tx, Completion { generation, result });
    });
}

pub(crate) fn spawn_image(
    loader: Arc<dyn Loader>,
    href: String,
    generation: u64,
    tx: Sender<Completion>,
) {
    thread::spawn(move || {
        let result = loader
            .fetch_bytes(&href)
            .and_then(|bytes| PopupImage::decode(&href, &bytes))
            .map(Resolved::Image);
        send(&tx, Completion { generation, result });
    });
}

fn send(tx: &Sender<Completion>, completion: Completion) {
    if tx.send(completion).is_err() {
        debug!("Popup dropped before load finished");
    }
}
