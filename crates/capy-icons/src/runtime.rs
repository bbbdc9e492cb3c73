//! Content-addressed cache for icons synthesized at runtime.
//!
//! Window-manager hints, tray pixmaps, notification images and favicons
//! arrive as raw pixel buffers. Each icon is named by the SHA-256 of its
//! pixel bytes, so resubmitting the same pixels yields the same name and
//! no second write. Files live flat in one directory as
//! `<digest>-<size>.png`, which makes the directory its own on-disk index.

use crate::error::IconError;
use crate::index::{IconFile, IconFormat, rank_candidates};
use image::RgbaImage;
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// How the bytes of a [`RawImage`] are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    /// 4 bytes per pixel, A R G B, rows packed (StatusNotifierItem pixmaps).
    Argb32,
    /// R G B [A] with an explicit row stride (notification `image-data`).
    Rgb {
        rowstride: usize,
        has_alpha: bool,
        channels: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl RawImage {
    pub fn argb32(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layout: PixelLayout::Argb32,
            data,
        }
    }

    /// From freedesktop notification `image-data` fields.
    pub fn from_image_data(
        width: i32,
        height: i32,
        rowstride: i32,
        has_alpha: bool,
        bits_per_sample: i32,
        channels: i32,
        data: Vec<u8>,
    ) -> Result<Self, IconError> {
        if bits_per_sample != 8 {
            return Err(IconError::UnsupportedPixels(format!(
                "{} bits per sample",
                bits_per_sample
            )));
        }
        if channels != 3 && channels != 4 {
            return Err(IconError::UnsupportedPixels(format!(
                "{} channels",
                channels
            )));
        }
        if has_alpha != (channels == 4) {
            return Err(IconError::UnsupportedPixels(
                "alpha flag does not match channel count".into(),
            ));
        }
        let row_bytes = width.checked_mul(channels);
        if width <= 0 || height <= 0 || row_bytes.is_none_or(|min| rowstride < min) {
            return Err(IconError::UnsupportedPixels(format!(
                "{}x{} with rowstride {}",
                width, height, rowstride
            )));
        }
        Ok(Self {
            width: width as u32,
            height: height as u32,
            layout: PixelLayout::Rgb {
                rowstride: rowstride as usize,
                has_alpha,
                channels: channels as usize,
            },
            data,
        })
    }

    /// Split an X11 `_NET_WM_ICON` property (width, height, then
    /// width*height ARGB cardinals, repeated) into images.
    pub fn from_x11_cardinals(cardinals: &[u32]) -> Vec<Self> {
        let mut images = Vec::new();
        let mut rest = cardinals;
        while let [width, height, tail @ ..] = rest {
            let count = (*width as usize).saturating_mul(*height as usize);
            if count == 0 || tail.len() < count {
                break;
            }
            let data = tail[..count]
                .iter()
                .flat_map(|argb| argb.to_be_bytes())
                .collect();
            images.push(Self::argb32(*width, *height, data));
            rest = &tail[count..];
        }
        images
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    pub fn to_rgba(&self) -> Result<RgbaImage, IconError> {
        let (w, h) = (self.width as usize, self.height as usize);
        let too_short = || IconError::UnsupportedPixels("image buffer too short".into());
        let rgba_len = w
            .checked_mul(h)
            .and_then(|n| n.checked_mul(4))
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                IconError::UnsupportedPixels(format!("{}x{} image", self.width, self.height))
            })?;

        match self.layout {
            PixelLayout::Argb32 => {
                if self.data.len() < rgba_len {
                    return Err(too_short());
                }
            }
            PixelLayout::Rgb {
                rowstride,
                has_alpha,
                channels,
            } => {
                if channels < 3 || (has_alpha && channels < 4) {
                    return Err(IconError::UnsupportedPixels(format!("{} channels", channels)));
                }
                let needed = rowstride
                    .checked_mul(h - 1)
                    .zip(w.checked_mul(channels))
                    .and_then(|(rows, last)| rows.checked_add(last));
                if needed.is_none_or(|n| self.data.len() < n) {
                    return Err(too_short());
                }
            }
        }

        let mut out = Vec::with_capacity(rgba_len);
        match self.layout {
            PixelLayout::Argb32 => {
                for px in self.data[..rgba_len].chunks_exact(4) {
                    out.extend_from_slice(&[px[1], px[2], px[3], px[0]]);
                }
            }
            PixelLayout::Rgb {
                rowstride,
                has_alpha,
                channels,
            } => {
                for y in 0..h {
                    for x in 0..w {
                        let pos = y * rowstride + x * channels;
                        let alpha = if has_alpha { self.data[pos + 3] } else { 255 };
                        out.extend_from_slice(&[
                            self.data[pos],
                            self.data[pos + 1],
                            self.data[pos + 2],
                            alpha,
                        ]);
                    }
                }
            }
        }

        RgbaImage::from_raw(self.width, self.height, out)
            .ok_or_else(|| IconError::UnsupportedPixels("buffer size mismatch".into()))
    }
}

/// Icon name for `images`: hex SHA-256 over their pixel bytes.
pub fn digest_name(images: &[RawImage]) -> String {
    let mut hasher = Sha256::new();
    for image in images {
        hasher.update(&image.data);
    }
    hex::encode(hasher.finalize())
}

pub struct RuntimeIconCache {
    dir: PathBuf,
    known: Mutex<HashMap<String, Vec<IconFile>>>,
    writes: AtomicUsize,
}

impl RuntimeIconCache {
    /// Open (creating if needed) the cache in `dir`, picking up files left
    /// by an earlier run.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, IconError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let known = scan_existing(&dir);
        debug!("Runtime icon cache {} holds {} icons", dir.display(), known.len());
        Ok(Self {
            dir,
            known: Mutex::new(known),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of files this cache has written since it was opened.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Store `images` under their digest name and return it.
    ///
    /// Non-square images are skipped. Resubmitting known pixels writes
    /// nothing.
    pub fn add(&self, images: &[RawImage]) -> Result<String, IconError> {
        let name = digest_name(images);
        // Held across the writes so concurrent submissions of one icon write once.
        let mut known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
        if known.contains_key(&name) {
            return Ok(name);
        }

        let mut files = Vec::new();
        for image in images {
            if !image.is_square() {
                warn!(
                    "Ignoring {}x{} runtime icon image, not square",
                    image.width, image.height
                );
                continue;
            }
            let path = self.dir.join(format!("{}-{}.png", name, image.width));
            if !path.exists() {
                image.to_rgba()?.save(&path)?;
                self.writes.fetch_add(1, Ordering::Relaxed);
            }
            files.push(sized_file(path, image.width));
        }

        if files.is_empty() {
            return Err(IconError::UnsupportedPixels("no square image".into()));
        }
        known.insert(name.clone(), files);
        Ok(name)
    }

    pub fn lookup(&self, name: &str, size: u32) -> Option<PathBuf> {
        let known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
        let candidates = known.get(name)?;
        rank_candidates(candidates, size)
            .first()
            .map(|c| c.path.clone())
    }
}

fn sized_file(path: PathBuf, size: u32) -> IconFile {
    IconFile {
        path,
        min_size: size,
        max_size: size,
        format: IconFormat::Png,
        dir: String::new(),
    }
}

fn scan_existing(dir: &Path) -> HashMap<String, Vec<IconFile>> {
    let mut known: HashMap<String, Vec<IconFile>> = HashMap::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return known;
    };
    for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some((name, size)) = stem.rsplit_once('-') else {
            continue;
        };
        let Ok(size) = size.parse::<u32>() else {
            continue;
        };
        known
            .entry(name.to_string())
            .or_default()
            .push(sized_file(path.clone(), size));
    }
    known
}
