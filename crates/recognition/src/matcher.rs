//! Slider gap location by template matching.
//!
//! The default locator is normalized cross-correlation with per-channel mean
//! subtraction, the same score OpenCV calls `TM_CCOEFF_NORMED`:
//!
//! ```text
//!            Σc Σ T'c(i,j) · I'c(x+i, y+j)
//! R(x,y) = ----------------------------------
//!          sqrt(Σc Σ T'c² · Σc Σ I'c(x+i,y+j)²)
//! ```
//!
//! where `T'` and `I'` are the template and the covered window with their
//! channel means removed. Because `Σ T' = 0`, the numerator only needs the raw
//! window pixels, and the window variance comes from summed-area tables, so
//! each position costs one pass over the template.

use image::RgbImage;
use rayon::prelude::*;

use crate::RecognitionError;

/// Windows whose combined variance falls below this are treated as flat.
const FLAT_EPSILON: f64 = 1e-9;

/// Locates a target piece inside a background image.
pub trait GapLocator: Send + Sync {
    /// Top-left corner `(x, y)` of the best match of `target` in `background`.
    fn locate(
        &self,
        background: &RgbImage,
        target: &RgbImage,
    ) -> Result<(u32, u32), RecognitionError>;
}

/// Normalized cross-correlation matcher.
#[derive(Debug, Clone, Copy)]
pub struct NccTemplateMatcher {
    /// Score rows on the rayon pool.
    pub use_parallel: bool,
}

impl Default for NccTemplateMatcher {
    fn default() -> Self {
        Self { use_parallel: true }
    }
}

/// Best score found on one row of the correlation surface.
#[derive(Debug, Clone, Copy)]
struct RowBest {
    score: f64,
    x: usize,
}

/// Planar f64 copy of an RGB image.
struct Planes {
    width: usize,
    height: usize,
    channels: [Vec<f64>; 3],
}

impl Planes {
    fn from_rgb(img: &RgbImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let mut channels = [
            Vec::with_capacity(width * height),
            Vec::with_capacity(width * height),
            Vec::with_capacity(width * height),
        ];
        for pixel in img.pixels() {
            for (plane, &value) in channels.iter_mut().zip(pixel.0.iter()) {
                plane.push(f64::from(value));
            }
        }
        Self {
            width,
            height,
            channels,
        }
    }
}

/// Summed-area tables of values and squared values, `(w + 1) x (h + 1)`.
struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sq: Vec<f64>,
}

impl Integral {
    fn new(plane: &[f64], width: usize, height: usize) -> Self {
        let stride = width + 1;
        let mut sum = vec![0.0; stride * (height + 1)];
        let mut sq = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..width {
                let v = plane[y * width + x];
                row_sum += v;
                row_sq += v * v;
                let at = (y + 1) * stride + x + 1;
                sum[at] = sum[at - stride] + row_sum;
                sq[at] = sq[at - stride] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let s = self.stride;
        let (a, b, c, d) = (y * s + x, y * s + x + w, (y + h) * s + x, (y + h) * s + x + w);
        (
            self.sum[d] - self.sum[b] - self.sum[c] + self.sum[a],
            self.sq[d] - self.sq[b] - self.sq[c] + self.sq[a],
        )
    }
}

impl NccTemplateMatcher {
    pub fn sequential() -> Self {
        Self {
            use_parallel: false,
        }
    }

    fn score_row(
        &self,
        y: usize,
        bg: &Planes,
        integrals: &[Integral; 3],
        tpl: &Planes,
        tpl_energy: f64,
    ) -> RowBest {
        let (w, h) = (tpl.width, tpl.height);
        let n = (w * h) as f64;
        let cols = bg.width - w + 1;
        let mut best = RowBest {
            score: f64::NEG_INFINITY,
            x: 0,
        };

        for x in 0..cols {
            let mut numerator = 0.0;
            let mut window_energy = 0.0;
            for c in 0..3 {
                let (sum, sq) = integrals[c].window(x, y, w, h);
                window_energy += sq - sum * sum / n;

                let bg_plane = &bg.channels[c];
                let tpl_plane = &tpl.channels[c];
                for j in 0..h {
                    let bg_row = &bg_plane[(y + j) * bg.width + x..(y + j) * bg.width + x + w];
                    let tpl_row = &tpl_plane[j * w..(j + 1) * w];
                    numerator += bg_row.iter().zip(tpl_row).map(|(a, b)| a * b).sum::<f64>();
                }
            }

            let denominator = (tpl_energy * window_energy.max(0.0)).sqrt();
            let score = if denominator > FLAT_EPSILON {
                numerator / denominator
            } else {
                0.0
            };
            if score > best.score {
                best = RowBest { score, x };
            }
        }

        best
    }
}

impl GapLocator for NccTemplateMatcher {
    fn locate(
        &self,
        background: &RgbImage,
        target: &RgbImage,
    ) -> Result<(u32, u32), RecognitionError> {
        if target.width() == 0 || target.height() == 0 {
            return Err(RecognitionError::InvalidInput("target image is empty".into()));
        }
        if target.width() > background.width() || target.height() > background.height() {
            return Err(RecognitionError::InvalidInput(format!(
                "target {}x{} does not fit in background {}x{}",
                target.width(),
                target.height(),
                background.width(),
                background.height()
            )));
        }

        let bg = Planes::from_rgb(background);
        let mut tpl = Planes::from_rgb(target);
        let n = (tpl.width * tpl.height) as f64;

        // Centre the template so the numerator needs no window mean.
        let mut tpl_energy = 0.0;
        for plane in tpl.channels.iter_mut() {
            let mean = plane.iter().sum::<f64>() / n;
            for v in plane.iter_mut() {
                *v -= mean;
                tpl_energy += *v * *v;
            }
        }

        let integrals = [
            Integral::new(&bg.channels[0], bg.width, bg.height),
            Integral::new(&bg.channels[1], bg.width, bg.height),
            Integral::new(&bg.channels[2], bg.width, bg.height),
        ];

        let rows = bg.height - tpl.height + 1;
        let row_bests: Vec<RowBest> = if self.use_parallel {
            (0..rows)
                .into_par_iter()
                .map(|y| self.score_row(y, &bg, &integrals, &tpl, tpl_energy))
                .collect()
        } else {
            (0..rows)
                .map(|y| self.score_row(y, &bg, &integrals, &tpl, tpl_energy))
                .collect()
        };

        // Row-major scan with a strict comparison keeps the first maximum.
        let mut best = (f64::NEG_INFINITY, 0usize, 0usize);
        for (y, row) in row_bests.iter().enumerate() {
            if row.score > best.0 {
                best = (row.score, row.x, y);
            }
        }

        tracing::debug!(score = best.0, x = best.1, y = best.2, "template match");
        Ok((best.1 as u32, best.2 as u32))
    }
}
