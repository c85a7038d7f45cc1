//! Report emitter.
//!
//! Pure boundary adapter: takes the ordered similarity series and the
//! dense permanence rows the evaluator produced and renders the run's
//! artifacts: the combined similarity plot, one 1-D heatmap per image,
//! and the JSON run summary. No numeric post-processing happens here.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use serde::Serialize;
use tracing::info;

use crate::error::LabError;

pub const PLOT_WIDTH: u32 = 1000;
pub const PLOT_HEIGHT: u32 = 850;

const PLOT_MARGIN: u32 = 40;
const HEATMAP_STRIP_HEIGHT: u32 = 32;

const BACKGROUND: Rgb<u8> = Rgb([15, 15, 25]);
const FRAME: Rgb<u8> = Rgb([90, 90, 110]);
const SERIES: Rgb<u8> = Rgb([50, 200, 220]);

/// Render the ordered similarity series (one value per image, in corpus
/// order) as a connected-line plot, creating the destination directory if
/// absent.
pub fn write_similarity_plot(series: &[f64], path: &Path) -> Result<(), LabError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut img = RgbImage::from_pixel(PLOT_WIDTH, PLOT_HEIGHT, BACKGROUND);
    draw_frame(&mut img);

    let inner_w = PLOT_WIDTH - 2 * PLOT_MARGIN;
    let inner_h = PLOT_HEIGHT - 2 * PLOT_MARGIN;

    let mut previous: Option<(u32, u32)> = None;
    for (i, &value) in series.iter().enumerate() {
        let x = if series.len() <= 1 {
            PLOT_MARGIN + inner_w / 2
        } else {
            PLOT_MARGIN + (i as u32 * inner_w) / (series.len() as u32 - 1)
        };
        let clamped = value.clamp(0.0, 1.0);
        let y = PLOT_MARGIN + inner_h - (clamped * inner_h as f64) as u32;

        if let Some((px, py)) = previous {
            draw_line(&mut img, px, py, x, y, SERIES);
        }
        draw_marker(&mut img, x, y, SERIES);
        previous = Some((x, y));
    }

    img.save(path).map_err(|source| LabError::ArtifactWrite {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), points = series.len(), "similarity plot written");
    Ok(())
}

/// Render one 1-D heatmap strip per permanence row, `heatmap_<n>.png` with
/// a 1-based counter, creating the directory if absent. Each row is
/// normalized to its own maximum for display; the numeric pipeline never
/// sees these values.
pub fn write_heatmaps(rows: &[&[f32]], dir: &Path) -> Result<Vec<PathBuf>, LabError> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let width = row.len().max(1) as u32;
        let max = row.iter().copied().fold(0.0f32, f32::max);

        let mut img = RgbImage::from_pixel(width, HEATMAP_STRIP_HEIGHT, BACKGROUND);
        for (x, &value) in row.iter().enumerate() {
            let intensity = if max > 0.0 { value / max } else { 0.0 };
            let color = ramp(intensity);
            for y in 0..HEATMAP_STRIP_HEIGHT {
                img.put_pixel(x as u32, y, color);
            }
        }

        let path = dir.join(format!("heatmap_{}.png", i + 1));
        img.save(&path).map_err(|source| LabError::ArtifactWrite {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }

    info!(dir = %dir.display(), count = written.len(), "heatmaps written");
    Ok(written)
}

/// Persist the machine-readable run summary as pretty JSON.
pub fn write_run_summary<T: Serialize>(path: &Path, summary: &T) -> Result<(), LabError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, json)?;
    info!(path = %path.display(), "run summary written");
    Ok(())
}

/// Cold-to-hot colour ramp: blue through purple to red.
fn ramp(intensity: f32) -> Rgb<u8> {
    let v = intensity.clamp(0.0, 1.0);
    Rgb([(v * 255.0) as u8, 40, ((1.0 - v) * 255.0) as u8])
}

fn draw_frame(img: &mut RgbImage) {
    let x1 = PLOT_WIDTH - PLOT_MARGIN;
    let y1 = PLOT_HEIGHT - PLOT_MARGIN;
    draw_line(img, PLOT_MARGIN, PLOT_MARGIN, x1, PLOT_MARGIN, FRAME);
    draw_line(img, PLOT_MARGIN, y1, x1, y1, FRAME);
    draw_line(img, PLOT_MARGIN, PLOT_MARGIN, PLOT_MARGIN, y1, FRAME);
    draw_line(img, x1, PLOT_MARGIN, x1, y1, FRAME);
}

fn draw_marker(img: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            let px = x as i32 + dx;
            let py = y as i32 + dy;
            if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
                img.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}

/// Bresenham line.
fn draw_line(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
    let (mut x, mut y) = (x0 as i32, y0 as i32);
    let (x1, y1) = (x1 as i32, y1 as i32);
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
            img.put_pixel(x as u32, y as u32, color);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
