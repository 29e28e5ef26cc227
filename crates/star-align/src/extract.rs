//! Point-source extraction from grayscale images.
//!
//! A deliberately simple detector: global background from the pixel median,
//! noise from the global standard deviation, threshold at
//! `median + detection_sigma * std`, then 4-connected component labeling
//! with flux-weighted centroids. Good enough to feed the asterism matcher;
//! callers with demanding data should detect sources themselves and pass
//! coordinates directly.

use image::GrayImage;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Settings for the point-source extractor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceDetectionParams {
    /// Detection threshold in standard deviations above the background.
    pub detection_sigma: f64,
    /// Minimum connected-component area in pixels.
    pub min_area: usize,
    /// Keep at most this many sources, brightest first. Zero means no cap.
    pub max_sources: usize,
}

impl Default for SourceDetectionParams {
    fn default() -> Self {
        Self {
            detection_sigma: 5.0,
            min_area: 5,
            max_sources: 50,
        }
    }
}

/// A detected point source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedSource {
    /// Flux-weighted centroid, sub-pixel.
    pub centroid: Point2<f64>,
    /// Background-subtracted flux summed over the component.
    pub flux: f64,
    /// Component area in pixels.
    pub area: usize,
}

/// Detect point sources in a grayscale image, most significant first.
pub fn find_sources(image: &GrayImage, params: &SourceDetectionParams) -> Vec<DetectedSource> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let data = image.as_raw();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let background = median_u8(data);
    let std = std_dev(data);
    let threshold = background + params.detection_sigma * std;

    let mut visited = vec![false; data.len()];
    let mut sources = Vec::new();
    let mut stack = Vec::new();

    for start in 0..data.len() {
        if visited[start] || (data[start] as f64) <= threshold {
            continue;
        }

        // Flood-fill one 4-connected component above threshold.
        let mut area = 0usize;
        let mut flux = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        stack.push(start);
        visited[start] = true;

        while let Some(idx) = stack.pop() {
            let x = idx % width;
            let y = idx / width;
            let weight = data[idx] as f64 - background;
            area += 1;
            flux += weight;
            cx += weight * x as f64;
            cy += weight * y as f64;

            let mut push = |nx: usize, ny: usize| {
                let nidx = ny * width + nx;
                if !visited[nidx] && (data[nidx] as f64) > threshold {
                    visited[nidx] = true;
                    stack.push(nidx);
                }
            };
            if x > 0 {
                push(x - 1, y);
            }
            if x + 1 < width {
                push(x + 1, y);
            }
            if y > 0 {
                push(x, y - 1);
            }
            if y + 1 < height {
                push(x, y + 1);
            }
        }

        if area < params.min_area || flux <= 0.0 {
            continue;
        }
        sources.push(DetectedSource {
            centroid: Point2::new(cx / flux, cy / flux),
            flux,
            area,
        });
    }

    sources.sort_by(|a, b| b.flux.partial_cmp(&a.flux).unwrap_or(std::cmp::Ordering::Equal));
    if params.max_sources > 0 {
        sources.truncate(params.max_sources);
    }

    log::debug!(
        "extracted {} sources ({}x{} image, threshold {:.1})",
        sources.len(),
        width,
        height,
        threshold
    );
    sources
}

fn median_u8(data: &[u8]) -> f64 {
    let mut histogram = [0usize; 256];
    for &v in data {
        histogram[v as usize] += 1;
    }
    let half = data.len() / 2;
    let mut seen = 0usize;
    for (value, &count) in histogram.iter().enumerate() {
        seen += count;
        if seen > half {
            return value as f64;
        }
    }
    0.0
}

fn std_dev(data: &[u8]) -> f64 {
    let n = data.len() as f64;
    let mean = data.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = data
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    var.sqrt()
}
