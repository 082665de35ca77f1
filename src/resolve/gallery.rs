use log::debug;

/// A cyclic cursor over the images of a gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gallery {
    sources: Vec<String>,
    position: usize,
}

impl Gallery {
    /// Starts at `initial` when it is one of `sources`, otherwise at the
    /// first image. Returns `None` for an empty list.
    pub fn new(sources: Vec<String>, initial: Option<&str>) -> Option<Self> {
        if sources.is_empty() {
            return None;
        }
        let position = initial
            .and_then(|initial| sources.iter().position(|source| source == initial))
            .unwrap_or(0);
        Some(Self { sources, position })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn current(&self) -> &str {
        &self.sources[self.position]
    }

    /// Moves by `delta` with wraparound and returns the new current source.
    pub fn step(&mut self, delta: isize) -> &str {
        let len = self.sources.len() as isize;
        self.position = (self.position as isize + delta).rem_euclid(len) as usize;
        self.current()
    }

    pub fn counter(&self) -> String {
        format!("{} / {}", self.position + 1, self.sources.len())
    }
}

/// Navigation controls installed for one gallery invocation.
#[derive(Debug)]
pub struct GalleryNav {
    gallery: Gallery,
}

impl GalleryNav {
    pub fn new(gallery: Gallery) -> Self {
        debug!("Installing gallery navigation for {} images", gallery.len());
        Self { gallery }
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn gallery_mut(&mut self) -> &mut Gallery {
        &mut self.gallery
    }

    /// Tears the controls down. Consumes the navigation so it can only happen once.
    pub fn dispose(self) {
        debug!(
            "Removing gallery navigation at {}",
            self.gallery.counter()
        );
    }
}
