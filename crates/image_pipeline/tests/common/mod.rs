#![allow(dead_code)]

use anyhow::{bail, Result};
use image::{ImageFormat, Rgb, RgbImage};
use image_pipeline::provision::{ClassSource, Fetch};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Encodes a solid-colour RGB image as PNG bytes.
pub fn png_bytes(width: u32, height: u32, colour: [u8; 3]) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    RgbImage::from_pixel(width, height, Rgb(colour))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Writes `<root>/<split>/<class>/image_{i}.png` for every split and class.
///
/// Class `c` image `i` is filled with grey level `40 * c + 10 * i` and has
/// width `24 + i`, so samples are distinguishable after loading.
pub fn write_image_tree(root: &Path, splits: &[&str], classes: &[&str], per_class: u32) -> Result<()> {
    for split in splits {
        for (c, class) in classes.iter().enumerate() {
            let dir = root.join(split).join(class);
            fs::create_dir_all(&dir)?;
            for i in 0..per_class {
                let level = (40 * c as u32 + 10 * i).min(255) as u8;
                RgbImage::from_pixel(24 + i, 20, Rgb([level, level, level]))
                    .save(dir.join(format!("image_{}.png", i)))?;
            }
        }
    }
    Ok(())
}

/// In-process stand-in for HTTP: serves fixed bodies, 404s everything else.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    bodies: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn with(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.bodies.insert(url.into(), body);
        self
    }
}

impl Fetch for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        match self.bodies.get(url) {
            Some(body) => Ok(body.clone()),
            None => bail!("HTTP status client error (404 Not Found) for url ({})", url),
        }
    }
}

/// Two classes with two PNG images each, and a fetcher serving all four.
pub fn chest_xray_fixture() -> Result<(Vec<ClassSource>, MemoryFetcher)> {
    let mut fetcher = MemoryFetcher::default();
    let mut sources = Vec::new();
    for (c, class) in ["NORMAL", "PNEUMONIA"].iter().enumerate() {
        let urls: Vec<String> = (0..2)
            .map(|i| format!("mem://{}/{}.jpg", class.to_lowercase(), i))
            .collect();
        for (i, url) in urls.iter().enumerate() {
            let level = 60 + 100 * c as u8 + 20 * i as u8;
            fetcher = fetcher.with(url.clone(), png_bytes(40, 32, [level, level, level])?);
        }
        sources.push(ClassSource::new(*class, urls));
    }
    Ok((sources, fetcher))
}

/// Collects formatted log output written by a `tracing_subscriber::fmt` layer.
#[derive(Debug, Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `f` with a thread-local fmt subscriber and returns its log output.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let output = tracing::subscriber::with_default(subscriber, f);
    (output, capture.contents())
}
