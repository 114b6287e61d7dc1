//! Asynchronous image fetcher.
//!
//! Spawns background threads to read or download images and decode them
//! into RGBA pixel buffers ready for egui texture creation. Sources are
//! http(s) URLs, inline base64 `data:` URIs and local paths.

use std::collections::HashMap;
use std::sync::mpsc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use super::texture::{TextureError, TextureLoader};

/// Longest edge kept after decoding; tiles are small on screen.
const MAX_EDGE: u32 = 512;

/// Decoded image data (RGBA).
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

type LoadResult = Result<ImageData, TextureError>;

/// Manages background image fetching and decoding.
pub struct ImageLoader {
    pending: HashMap<String, mpsc::Receiver<LoadResult>>,
}

impl ImageLoader {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    /// Number of images still being fetched.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureLoader for ImageLoader {
    fn request(&mut self, url: &str) {
        if self.pending.contains_key(url) {
            return;
        }

        let (tx, rx) = mpsc::channel();
        let url_owned = url.to_string();

        std::thread::spawn(move || {
            let result = fetch_and_decode(&url_owned);
            let _ = tx.send(result);
        });

        self.pending.insert(url.to_string(), rx);
    }

    fn poll(&mut self) -> Vec<(String, LoadResult)> {
        let mut completed = Vec::new();
        self.pending.retain(|url, rx| match rx.try_recv() {
            Ok(result) => {
                completed.push((url.clone(), result));
                false
            }
            Err(mpsc::TryRecvError::Empty) => true,
            Err(mpsc::TryRecvError::Disconnected) => {
                completed.push((url.clone(), Err(TextureError::Cancelled)));
                false
            }
        });
        completed
    }
}

/// Payload of a `data:[<mediatype>];base64,<data>` URI. Image payloads are
/// binary, so only the base64 form is accepted.
fn data_uri_bytes(uri: &str) -> Result<Vec<u8>, TextureError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or(TextureError::DataUri("missing data: scheme"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or(TextureError::DataUri("missing ',' before payload"))?;
    if !header
        .rsplit(';')
        .next()
        .is_some_and(|p| p.eq_ignore_ascii_case("base64"))
    {
        return Err(TextureError::DataUri("payload is not base64"));
    }
    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(BASE64.decode(payload)?)
}

fn read_bytes(url: &str) -> Result<Vec<u8>, TextureError> {
    if url.starts_with("data:") {
        return data_uri_bytes(url);
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        let resp = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?
            .get(url)
            .send()?;

        if !resp.status().is_success() {
            return Err(TextureError::Status(resp.status().as_u16()));
        }
        return Ok(resp.bytes()?.to_vec());
    }

    let path = url.strip_prefix("file://").unwrap_or(url);
    Ok(std::fs::read(path)?)
}

fn fetch_and_decode(url: &str) -> LoadResult {
    let bytes = read_bytes(url)?;
    let img = image::load_from_memory(&bytes)?;
    Ok(downscale(img.to_rgba8()))
}

fn downscale(rgba: image::RgbaImage) -> ImageData {
    let (w, h) = rgba.dimensions();
    let longest = w.max(h);

    let (w, h, pixels) = if longest > MAX_EDGE {
        let ratio = MAX_EDGE as f32 / longest as f32;
        let new_w = ((w as f32 * ratio) as u32).max(1);
        let new_h = ((h as f32 * ratio) as u32).max(1);
        let resized =
            image::imageops::resize(&rgba, new_w, new_h, image::imageops::FilterType::Triangle);
        let (rw, rh) = resized.dimensions();
        (rw, rh, resized.into_raw())
    } else {
        (w, h, rgba.into_raw())
    };

    ImageData {
        width: w,
        height: h,
        rgba: pixels,
    }
}
