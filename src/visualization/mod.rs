//! Visualization of sample faces
//!
//! Renders feature rows back into 48x48 grayscale tiles laid out on a grid
//! and saved as a PNG, with a text legend of the labels in the same layout.

use image::{GrayImage, Luma};
use ndarray::{Array2, ArrayView1};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::data::{Emotion, HEIGHT, N_PIXELS, WIDTH};
use crate::error::{FerError, Result};

/// Grid layout for a preview image
#[derive(Debug, Clone)]
pub struct PreviewGrid {
    pub rows: usize,
    pub cols: usize,
    /// Gap between tiles in pixels
    pub padding: u32,
    /// Integer upscale factor per tile
    pub scale: u32,
}

impl Default for PreviewGrid {
    fn default() -> Self {
        Self {
            rows: 5,
            cols: 6,
            padding: 2,
            scale: 1,
        }
    }
}

impl PreviewGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest default-width grid holding `count` tiles
    pub fn for_count(count: usize) -> Self {
        let base = Self::default();
        let cols = base.cols.min(count.max(1));
        Self {
            rows: count.max(1).div_ceil(cols),
            cols,
            ..base
        }
    }

    pub fn capacity(&self) -> usize {
        self.rows * self.cols
    }

    /// Render up to [`Self::capacity`] rows of normalised pixels
    pub fn render(&self, features: &Array2<f64>) -> Result<GrayImage> {
        if features.ncols() != N_PIXELS {
            return Err(FerError::Shape {
                expected: format!("{} columns", N_PIXELS),
                actual: format!("{} columns", features.ncols()),
            });
        }

        let tile_w = WIDTH as u32 * self.scale;
        let tile_h = HEIGHT as u32 * self.scale;
        let width = self.cols as u32 * (tile_w + self.padding) + self.padding;
        let height = self.rows as u32 * (tile_h + self.padding) + self.padding;
        let mut canvas = GrayImage::from_pixel(width, height, Luma([255]));

        for (i, row) in features.rows().into_iter().take(self.capacity()).enumerate() {
            let x0 = self.padding + (i % self.cols) as u32 * (tile_w + self.padding);
            let y0 = self.padding + (i / self.cols) as u32 * (tile_h + self.padding);
            self.draw_tile(&mut canvas, row, x0, y0);
        }

        Ok(canvas)
    }

    fn draw_tile(&self, canvas: &mut GrayImage, pixels: ArrayView1<f64>, x0: u32, y0: u32) {
        for (idx, &v) in pixels.iter().enumerate() {
            let intensity = (v * 255.0).round().clamp(0.0, 255.0) as u8;
            let px = (idx % WIDTH) as u32 * self.scale;
            let py = (idx / WIDTH) as u32 * self.scale;
            for dy in 0..self.scale {
                for dx in 0..self.scale {
                    canvas.put_pixel(x0 + px + dx, y0 + py + dy, Luma([intensity]));
                }
            }
        }
    }

    /// Render and write a PNG
    pub fn save(&self, features: &Array2<f64>, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let image = self.render(features)?;
        image.save(path)?;
        info!(path = %path.display(), tiles = features.nrows().min(self.capacity()), "Preview written");
        Ok(())
    }

    /// Label names arranged in the grid layout, one line per grid row
    pub fn legend(&self, labels: &[Emotion]) -> String {
        let width = Emotion::ALL.iter().map(|e| e.name().len()).max().unwrap_or(0);
        let mut out = String::new();
        for chunk in labels.iter().take(self.capacity()).collect::<Vec<_>>().chunks(self.cols) {
            let line: Vec<String> = chunk
                .iter()
                .map(|l| format!("{:<w$}", l.name(), w = width))
                .collect();
            let _ = writeln!(out, "{}", line.join(" ").trim_end());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_dimensions() {
        let grid = PreviewGrid::default();
        let features = Array2::from_elem((3, N_PIXELS), 0.5);
        let image = grid.render(&features).unwrap();
        assert_eq!(image.width(), 6 * (48 + 2) + 2);
        assert_eq!(image.height(), 5 * (48 + 2) + 2);
        // First tile is filled, last slot keeps the background
        assert_eq!(image.get_pixel(2, 2)[0], 128);
        assert_eq!(image.get_pixel(image.width() - 3, image.height() - 3)[0], 255);
    }

    #[test]
    fn test_render_rejects_wrong_width() {
        let features = Array2::zeros((1, 10));
        assert!(matches!(
            PreviewGrid::default().render(&features),
            Err(FerError::Shape { .. })
        ));
    }

    #[test]
    fn test_for_count() {
        let grid = PreviewGrid::for_count(8);
        assert_eq!((grid.rows, grid.cols), (2, 6));
        let grid = PreviewGrid::for_count(3);
        assert_eq!((grid.rows, grid.cols), (1, 3));
    }

    #[test]
    fn test_legend_layout() {
        let grid = PreviewGrid::for_count(7);
        let labels = vec![Emotion::Happy; 7];
        let legend = grid.legend(&labels);
        assert_eq!(legend.lines().count(), 2);
        assert_eq!(legend.lines().nth(1).unwrap(), "Happy");
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let features = Array2::zeros((2, N_PIXELS));
        PreviewGrid::for_count(2).save(&features, &path).unwrap();
        assert!(path.exists());
    }
}
