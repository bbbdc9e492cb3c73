//! Conversion of legacy icon formats to PNG.

use crate::error::IconError;
use image::{Rgba, RgbaImage};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Converts one icon file into a PNG at `target`.
pub trait IconConverter: Send + Sync {
    fn convert(&self, source: &Path, target: &Path) -> Result<(), IconError>;
}

/// XPM (X PixMap) to PNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct XpmConverter;

impl IconConverter for XpmConverter {
    fn convert(&self, source: &Path, target: &Path) -> Result<(), IconError> {
        let content = fs::read_to_string(source)?;
        let image = decode_xpm(&content)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        image.save(target)?;
        debug!("Converted {} -> {}", source.display(), target.display());
        Ok(())
    }
}

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// The quoted strings of an XPM file, in order.
fn quoted_strings(content: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find('"') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('"') else {
            break;
        };
        out.push(&after[..end]);
        rest = &after[end + 1..];
    }
    out
}

fn parse_color(value: &str) -> Option<Rgba<u8>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") {
        return Some(TRANSPARENT);
    }

    if let Some(hex) = value.strip_prefix('#') {
        // #RGB, #RRGGBB or #RRRRGGGGBBBB: keep the most significant byte of each channel.
        let width = match hex.len() {
            3 => 1,
            6 => 2,
            12 => 4,
            _ => return None,
        };
        let channel = |i: usize| -> Option<u8> {
            let digits = hex.get(i * width..i * width + width)?;
            let v = u16::from_str_radix(digits, 16).ok()?;
            Some(match width {
                1 => (v * 17) as u8,
                2 => v as u8,
                _ => (v >> 8) as u8,
            })
        };
        return Some(Rgba([channel(0)?, channel(1)?, channel(2)?, 255]));
    }

    let named = match value.to_lowercase().as_str() {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "green" => [0, 255, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "gray" | "grey" => [190, 190, 190],
        _ => return None,
    };
    Some(Rgba([named[0], named[1], named[2], 255]))
}

/// Decode XPM3 text into an RGBA image.
pub fn decode_xpm(content: &str) -> Result<RgbaImage, IconError> {
    let strings = quoted_strings(content);
    let (header, rest) = strings
        .split_first()
        .ok_or_else(|| IconError::Xpm("no header".into()))?;

    let numbers: Vec<usize> = header
        .split_whitespace()
        .take(4)
        .map(|n| n.parse::<usize>())
        .collect::<Result<_, _>>()
        .map_err(|_| IconError::Xpm(format!("bad header {:?}", header)))?;
    let [width, height, ncolors, cpp] = numbers[..] else {
        return Err(IconError::Xpm(format!("short header {:?}", header)));
    };
    if cpp == 0 || width == 0 || height == 0 {
        return Err(IconError::Xpm(format!("degenerate header {:?}", header)));
    }
    if rest.len() < ncolors + height {
        return Err(IconError::Xpm("truncated".into()));
    }

    let mut palette: HashMap<&str, Rgba<u8>> = HashMap::with_capacity(ncolors);
    for line in &rest[..ncolors] {
        let key = line
            .get(..cpp)
            .ok_or_else(|| IconError::Xpm(format!("bad color line {:?}", line)))?;
        let tokens: Vec<&str> = line[cpp..].split_whitespace().collect();
        // Visual "c" is the color one; fall back to whatever comes first.
        let value = tokens
            .iter()
            .position(|t| *t == "c")
            .or_else(|| tokens.first().map(|_| 0))
            .and_then(|i| tokens.get(i + 1))
            .ok_or_else(|| IconError::Xpm(format!("no color in {:?}", line)))?;
        let color = parse_color(value).unwrap_or_else(|| {
            debug!("Unknown XPM color {:?}, using black", value);
            Rgba([0, 0, 0, 255])
        });
        palette.insert(key, color);
    }

    let mut image = RgbaImage::new(width as u32, height as u32);
    for (y, row) in rest[ncolors..ncolors + height].iter().enumerate() {
        for x in 0..width {
            let key = row
                .get(x * cpp..x * cpp + cpp)
                .ok_or_else(|| IconError::Xpm(format!("row {} too short", y)))?;
            let color = palette.get(key).copied().unwrap_or(TRANSPARENT);
            image.put_pixel(x as u32, y as u32, color);
        }
    }

    Ok(image)
}
