//! Image binarization and the persisted-vector loader.
//!
//! A source image becomes a `size × size` binary vector in two steps:
//! decode/resize to grayscale, then a local-adaptive threshold (a pixel
//! brighter than its neighbourhood mean is a 1). The vector is persisted
//! as a CSV artifact, one comma-separated 0/1 row per image row, and
//! read back by `load_vector` before every presentation.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::GrayImage;

use crate::error::LabError;

/// Neighbourhood radius for the adaptive threshold.
const ADAPTIVE_RADIUS: u32 = 3;

/// Binarize one image and persist the result under `out_dir`, creating the
/// directory if absent. Returns the artifact path.
///
/// Deterministic for a given input file: same decode, same resize, same
/// threshold.
pub fn binarize_image(path: &Path, size: u32, out_dir: &Path) -> Result<PathBuf, LabError> {
    let img = image::open(path).map_err(|source| LabError::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;
    let gray = img.resize_exact(size, size, FilterType::Nearest).to_luma8();
    let bits = adaptive_threshold(&gray);

    fs::create_dir_all(out_dir)?;
    let stem = file_stem(path);
    let out_path = out_dir.join(format!("{stem}.csv"));

    let mut text = String::with_capacity(bits.len() * 2);
    for row in bits.chunks(size as usize) {
        for (x, bit) in row.iter().enumerate() {
            if x > 0 {
                text.push(',');
            }
            text.push(if *bit == 0 { '0' } else { '1' });
        }
        text.push('\n');
    }
    fs::write(&out_path, text)?;

    Ok(out_path)
}

/// Pixel strictly brighter than the mean of its clamped `(2r+1)²`
/// neighbourhood -> 1, else 0. Flat regions binarize to 0.
fn adaptive_threshold(gray: &GrayImage) -> Vec<u8> {
    let (w, h) = gray.dimensions();
    let mut bits = vec![0u8; (w * h) as usize];

    for y in 0..h {
        for x in 0..w {
            let x0 = x.saturating_sub(ADAPTIVE_RADIUS);
            let x1 = (x + ADAPTIVE_RADIUS).min(w - 1);
            let y0 = y.saturating_sub(ADAPTIVE_RADIUS);
            let y1 = (y + ADAPTIVE_RADIUS).min(h - 1);

            let mut sum: u32 = 0;
            let mut count: u32 = 0;
            for ny in y0..=y1 {
                for nx in x0..=x1 {
                    sum += gray.get_pixel(nx, ny)[0] as u32;
                    count += 1;
                }
            }
            let mean = sum / count;

            let pixel = gray.get_pixel(x, y)[0] as u32;
            bits[(y * w + x) as usize] = (pixel > mean) as u8;
        }
    }

    bits
}

/// Parse a persisted binarized artifact back into a flat 0/1 vector.
///
/// Non-numeric tokens load as 0 so a partially corrupt artifact still
/// yields a usable fixed-shape vector instead of killing the training
/// loop. The only hard failure is a length mismatch.
pub fn load_vector(path: &Path, expected_len: usize) -> Result<Vec<u8>, LabError> {
    let text = fs::read_to_string(path)?;

    let mut vector = Vec::with_capacity(expected_len);
    for line in text.lines() {
        for token in line.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let value = token.parse::<i64>().unwrap_or(0);
            vector.push((value != 0) as u8);
        }
    }

    if vector.len() != expected_len {
        return Err(LabError::ShapeMismatch {
            path: path.to_path_buf(),
            expected: expected_len,
            actual: vector.len(),
        });
    }
    Ok(vector)
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
        .to_string()
}
