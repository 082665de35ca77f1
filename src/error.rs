use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FacyboxError {
    #[error("cannot {action} while the popup is {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },
}

/// Why a resolver could not produce content.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("request for {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode image {href}: {source}")]
    Decode {
        href: String,
        #[source]
        source: image::ImageError,
    },

    #[error("{0} is not a location that can be loaded")]
    InvalidLocation(String),

    #[error("nothing on the page matches {0}")]
    MissingElement(String),

    #[error("the gallery has no images")]
    EmptyGallery,

    #[error("{href} did not load within {after:?}")]
    TimedOut { href: String, after: Duration },
}
