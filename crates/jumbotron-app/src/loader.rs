//! Image fetching.
//!
//! References from the server are resolved against the image base, fetched
//! on a background thread and decoded there, so the event loop never blocks
//! on the network. Results come back over a channel tagged with the ticket
//! they were requested under.

use jumbotron_core::{LoadRequest, LoadTicket};
use jumbotron_render::decode_image;
use peniko::ImageData;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Upper bound for a single HTTP fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Image loading errors.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("Can't resolve image reference '{0}'")]
    Unresolvable(String),
    #[error("Failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("Request for {url} failed: {message}")]
    Http { url: Url, message: String },
    #[error("{0}")]
    Decode(String),
    #[error("HTTP client unavailable: {0}")]
    Client(String),
}

/// Where image bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Http(Url),
    File(PathBuf),
}

/// Resolve a server-provided image reference.
///
/// Accepts absolute http(s) and file URLs, filesystem paths, and references
/// relative to `base`. Without a base, relative references are filesystem
/// paths.
pub fn resolve_ref(image_ref: &str, base: Option<&Url>) -> Result<ImageSource, LoadError> {
    let image_ref = image_ref.trim();
    if image_ref.is_empty() {
        return Err(LoadError::Unresolvable(image_ref.to_string()));
    }

    if Path::new(image_ref).is_absolute() {
        return Ok(ImageSource::File(PathBuf::from(image_ref)));
    }

    let url = match Url::parse(image_ref) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base
                .join(image_ref)
                .map_err(|_| LoadError::Unresolvable(image_ref.to_string()))?,
            None => return Ok(ImageSource::File(PathBuf::from(image_ref))),
        },
        Err(_) => return Err(LoadError::Unresolvable(image_ref.to_string())),
    };

    match url.scheme() {
        "http" | "https" => Ok(ImageSource::Http(url)),
        "file" => url
            .to_file_path()
            .map(ImageSource::File)
            .map_err(|_| LoadError::Unresolvable(image_ref.to_string())),
        _ => Err(LoadError::Unresolvable(image_ref.to_string())),
    }
}

/// Read the raw bytes behind `source`.
fn fetch(client: &reqwest::blocking::Client, source: &ImageSource) -> Result<Vec<u8>, LoadError> {
    match source {
        ImageSource::File(path) => std::fs::read(path).map_err(|e| LoadError::Io {
            path: path.clone(),
            message: e.to_string(),
        }),
        ImageSource::Http(url) => {
            let http_error = |message: String| LoadError::Http {
                url: url.clone(),
                message,
            };
            let response = client
                .get(url.clone())
                .send()
                .and_then(|r| r.error_for_status())
                .map_err(|e| http_error(e.to_string()))?;
            let bytes = response.bytes().map_err(|e| http_error(e.to_string()))?;
            Ok(bytes.to_vec())
        }
    }
}

/// Resolve, fetch and decode one image on the current thread.
pub fn load_image(
    client: &reqwest::blocking::Client,
    image_ref: &str,
    base: Option<&Url>,
) -> Result<ImageData, LoadError> {
    let source = resolve_ref(image_ref, base)?;
    log::debug!("Fetching {:?}", source);
    let bytes = fetch(client, &source)?;
    decode_image(&bytes).map_err(|e| LoadError::Decode(e.to_string()))
}

/// A finished load.
#[derive(Debug)]
pub struct LoadOutcome {
    pub ticket: LoadTicket,
    pub result: Result<ImageData, LoadError>,
}

/// Runs image loads on background threads.
pub struct ImageLoader {
    client: reqwest::blocking::Client,
    base: Option<Url>,
    result_tx: Sender<LoadOutcome>,
    result_rx: Receiver<LoadOutcome>,
    in_flight: usize,
}

impl ImageLoader {
    /// Create a loader resolving relative references against `base`.
    pub fn new(base: Option<Url>) -> Result<Self, LoadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| LoadError::Client(e.to_string()))?;
        let (result_tx, result_rx) = channel();
        Ok(Self {
            client,
            base,
            result_tx,
            result_rx,
            in_flight: 0,
        })
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// Number of loads started but not yet collected.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Start loading in the background.
    pub fn request(&mut self, request: LoadRequest) {
        let client = self.client.clone();
        let base = self.base.clone();
        let tx = self.result_tx.clone();
        self.in_flight += 1;

        thread::spawn(move || {
            let result = load_image(&client, &request.image_ref, base.as_ref());
            let _ = tx.send(LoadOutcome {
                ticket: request.ticket,
                result,
            });
        });
    }

    /// Collect finished loads (non-blocking).
    pub fn poll(&mut self) -> Vec<LoadOutcome> {
        let outcomes: Vec<_> = self.result_rx.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(outcomes.len());
        outcomes
    }
}
