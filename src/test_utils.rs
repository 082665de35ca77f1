use crate::error::LoadError;
use crate::popup::Facybox;
use crate::resolve::loader::Loader;
use image::{ImageFormat, Rgb, RgbImage};
use ratatui::{Terminal, backend::TestBackend, buffer::Buffer};
use std::collections::HashMap;
use std::io::Cursor;
use std::thread;
use std::time::{Duration, Instant};

/// In-memory loader. Keys match either the whole href or its last path
/// segments, so `a.png` answers for `http://host/gallery/a.png`.
#[derive(Default)]
pub struct FakeLoader {
    pages: HashMap<String, String>,
    images: HashMap<String, Vec<u8>>,
    delays: HashMap<String, Duration>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, href: &str, body: &str) -> Self {
        self.pages.insert(href.to_string(), body.to_string());
        self
    }

    pub fn with_image(mut self, href: &str, bytes: Vec<u8>) -> Self {
        self.images.insert(href.to_string(), bytes);
        self
    }

    /// Makes every fetch of `href` take `delay` before answering.
    pub fn with_delay(mut self, href: &str, delay: Duration) -> Self {
        self.delays.insert(href.to_string(), delay);
        self
    }

    fn wait(&self, href: &str) {
        if let Some(delay) = lookup(&self.delays, href) {
            thread::sleep(*delay);
        }
    }
}

fn lookup<'a, V>(map: &'a HashMap<String, V>, href: &str) -> Option<&'a V> {
    map.get(href).or_else(|| {
        map.iter()
            .find(|(key, _)| href.ends_with(&format!("/{key}")))
            .map(|(_, value)| value)
    })
}

fn not_found(href: &str) -> LoadError {
    LoadError::Http {
        url: href.to_string(),
        message: "404 Not Found".to_string(),
    }
}

impl Loader for FakeLoader {
    fn fetch_text(&self, href: &str) -> Result<String, LoadError> {
        self.wait(href);
        lookup(&self.pages, href).cloned().ok_or_else(|| not_found(href))
    }

    fn fetch_bytes(&self, href: &str) -> Result<Vec<u8>, LoadError> {
        self.wait(href);
        lookup(&self.images, href)
            .cloned()
            .or_else(|| lookup(&self.pages, href).map(|body| body.clone().into_bytes()))
            .ok_or_else(|| not_found(href))
    }
}

/// A solid-colour PNG.
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(rgb));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encoding an in-memory PNG");
    bytes.into_inner()
}

/// Polls until no load is pending, for at most two seconds. Returns whether
/// the popup settled.
pub fn settle(facybox: &mut Facybox) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        facybox.poll();
        if !facybox.is_loading_pending() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
    Terminal::new(TestBackend::new(width, height)).expect("creating a test terminal")
}

/// The rows of `buffer` as plain strings.
pub fn buffer_lines(buffer: &Buffer) -> Vec<String> {
    (0..buffer.area.height)
        .map(|y| {
            (0..buffer.area.width)
                .map(|x| buffer[(x, y)].symbol().to_string())
                .collect()
        })
        .collect()
}
