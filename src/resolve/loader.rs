use crate::error::LoadError;
use log::debug;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Fetches the raw material resolvers turn into content. Implementations are
/// called from worker threads.
pub trait Loader: Send + Sync {
    fn fetch_text(&self, href: &str) -> Result<String, LoadError>;
    fn fetch_bytes(&self, href: &str) -> Result<Vec<u8>, LoadError>;
}

enum Location {
    Remote(Url),
    Local(PathBuf),
}

/// Loads `http(s)://` locations over the network and everything else from
/// the filesystem.
pub struct DefaultLoader {
    agent: ureq::Agent,
}

impl DefaultLoader {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
        }
    }

    fn locate(&self, href: &str) -> Result<Location, LoadError> {
        match Url::parse(href) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Location::Remote(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Location::Local)
                .map_err(|_| LoadError::InvalidLocation(href.to_string())),
            Ok(_) => Err(LoadError::InvalidLocation(href.to_string())),
            Err(_) => Ok(Location::Local(PathBuf::from(href))),
        }
    }

    fn get(&self, url: &Url) -> Result<ureq::http::Response<ureq::Body>, LoadError> {
        debug!("GET {url}");
        self.agent.get(url.as_str()).call().map_err(|e| LoadError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl Loader for DefaultLoader {
    fn fetch_text(&self, href: &str) -> Result<String, LoadError> {
        match self.locate(href)? {
            Location::Remote(url) => {
                let mut response = self.get(&url)?;
                response
                    .body_mut()
                    .read_to_string()
                    .map_err(|e| LoadError::Http {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
            }
            Location::Local(path) => {
                fs::read_to_string(&path).map_err(|source| LoadError::Io { path, source })
            }
        }
    }

    fn fetch_bytes(&self, href: &str) -> Result<Vec<u8>, LoadError> {
        match self.locate(href)? {
            Location::Remote(url) => {
                let mut response = self.get(&url)?;
                response
                    .body_mut()
                    .read_to_vec()
                    .map_err(|e| LoadError::Http {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
            }
            Location::Local(path) => fs::read(&path).map_err(|source| LoadError::Io { path, source }),
        }
    }
}

/// Resolves `href` against the page it came from. Absolute hrefs and hrefs
/// without a base are returned unchanged.
pub fn absolutize(base: Option<&Url>, href: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    match base.map(|base| base.join(href)) {
        Some(Ok(url)) => url.to_string(),
        _ => href.to_string(),
    }
}
