//! Portrait plot rendering.
//!
//! A portrait plot is a grid of models (rows) by variables (columns). With
//! several layers each cell is split into triangles, one per layer:
//!
//! ```text
//!   2 layers        4 layers
//!  +-------+       +-------+
//!  | 0   / |       | \ 0 / |
//!  |   /   |       | 3 X 1 |
//!  | /   1 |       | / 2 \ |
//!  +-------+       +-------+
//! ```
//!
//! The colour bar is drawn below the grid. Text (title, tick labels, legend)
//! is not rasterised; it is stored in PNG `tEXt` chunks so the image stays
//! self-describing.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use super::colormap::DiscreteColormap;
use crate::model::PlotError;

const CELL_PX: usize = 32;
const MARGIN_PX: usize = 16;
const CBAR_GAP_PX: usize = 24;
const CBAR_HEIGHT_PX: usize = 16;
const CBAR_BIN_PX: usize = 24;

const BACKGROUND: [u8; 3] = [0xff, 0xff, 0xff];
const GRID_LINE: [u8; 3] = [0xff, 0xff, 0xff];
const FRAME: [u8; 3] = [0x00, 0x00, 0x00];

/// A portrait plot ready to render. Layers are row-major models × variables
/// matrices of the same shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PortraitPlot {
    pub layers: Vec<Vec<Vec<f64>>>,
    pub xaxis_labels: Vec<String>,
    pub yaxis_labels: Vec<String>,
    pub legend_labels: Vec<String>,
    pub title: String,
    pub cbar_label: String,
    pub colormap: DiscreteColormap,
}

/// An 8-bit RGBA raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl Raster {
    fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut pixels = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            pixels.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 0xff]);
        }
        Raster { width, height, pixels }
    }

    fn set(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        if x < self.width && y < self.height {
            let i = (y * self.width + x) * 4;
            self.pixels[i..i + 3].copy_from_slice(&rgb);
        }
    }

    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    fn fill_rect(&mut self, x0: usize, y0: usize, w: usize, h: usize, rgb: [u8; 3]) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                self.set(x, y, rgb);
            }
        }
    }
}

/// Which layer's triangle the point `(dx, dy)` of a unit cell falls in,
/// with y pointing down.
fn layer_at(nlayers: usize, dx: f64, dy: f64) -> usize {
    match nlayers {
        2 => usize::from(dx + dy >= 1.0),
        4 => {
            // Closest edge wins: top, right, bottom, left.
            let distances = [dy, 1.0 - dx, 1.0 - dy, dx];
            distances
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap_or(0)
        }
        _ => 0,
    }
}

impl PortraitPlot {
    pub fn nrows(&self) -> usize {
        self.layers.first().map(Vec::len).unwrap_or(0)
    }

    pub fn ncols(&self) -> usize {
        self.layers.first().and_then(|l| l.first()).map(Vec::len).unwrap_or(0)
    }

    /// Checks the layer count and that every layer has the same shape.
    pub fn validate(&self) -> Result<(), PlotError> {
        if !matches!(self.layers.len(), 1 | 2 | 4) {
            return Err(PlotError::LayerCount(self.layers.len()));
        }
        let (rows, cols) = (self.nrows(), self.ncols());
        if rows == 0 || cols == 0 {
            return Err(PlotError::Empty);
        }
        for (layer, data) in self.layers.iter().enumerate() {
            let bad_row = data.iter().any(|row| row.len() != cols);
            if data.len() != rows || bad_row {
                return Err(PlotError::ShapeMismatch {
                    layer,
                    rows: data.len(),
                    cols: data.iter().map(Vec::len).max().unwrap_or(0),
                    expected_rows: rows,
                    expected_cols: cols,
                });
            }
        }
        Ok(())
    }

    fn grid_origin(&self) -> (usize, usize) {
        (MARGIN_PX, MARGIN_PX)
    }

    fn cbar_origin(&self) -> (usize, usize) {
        (MARGIN_PX, MARGIN_PX + self.nrows() * CELL_PX + CBAR_GAP_PX)
    }

    pub fn render(&self) -> Result<Raster, PlotError> {
        self.validate()?;
        let (rows, cols) = (self.nrows(), self.ncols());
        let nbins = self.colormap.colors().len();

        let width = 2 * MARGIN_PX + (cols * CELL_PX).max(nbins * CBAR_BIN_PX);
        let height = 2 * MARGIN_PX + rows * CELL_PX + CBAR_GAP_PX + CBAR_HEIGHT_PX;
        let mut img = Raster::filled(width, height, BACKGROUND);

        let (gx, gy) = self.grid_origin();
        let nlayers = self.layers.len();
        for row in 0..rows {
            for col in 0..cols {
                let colors: Vec<[u8; 3]> = self
                    .layers
                    .iter()
                    .map(|layer| self.colormap.color(layer[row][col]))
                    .collect();
                for py in 0..CELL_PX {
                    for px in 0..CELL_PX {
                        let on_border = px == 0 || py == 0;
                        let rgb = if on_border {
                            GRID_LINE
                        } else {
                            let dx = (px as f64 + 0.5) / CELL_PX as f64;
                            let dy = (py as f64 + 0.5) / CELL_PX as f64;
                            colors[layer_at(nlayers, dx, dy)]
                        };
                        img.set(gx + col * CELL_PX + px, gy + row * CELL_PX + py, rgb);
                    }
                }
            }
        }

        // Frame around the grid.
        let (gw, gh) = (cols * CELL_PX, rows * CELL_PX);
        img.fill_rect(gx, gy, gw, 1, FRAME);
        img.fill_rect(gx, gy + gh, gw + 1, 1, FRAME);
        img.fill_rect(gx, gy, 1, gh, FRAME);
        img.fill_rect(gx + gw, gy, 1, gh, FRAME);

        let (cx, cy) = self.cbar_origin();
        for (i, rgb) in self.colormap.colors().iter().enumerate() {
            img.fill_rect(cx + i * CBAR_BIN_PX, cy, CBAR_BIN_PX, CBAR_HEIGHT_PX, *rgb);
        }

        Ok(img)
    }

    /// Text chunks written alongside the image.
    pub fn text_chunks(&self) -> Vec<(String, String)> {
        let bounds: Vec<String> = self.colormap.bounds().iter().map(|b| format!("{:.1}", b)).collect();
        vec![
            ("Title".to_string(), self.title.clone()),
            ("XAxisLabels".to_string(), self.xaxis_labels.join(", ")),
            ("YAxisLabels".to_string(), self.yaxis_labels.join(", ")),
            ("Legend".to_string(), self.legend_labels.join(", ")),
            (
                "Colorbar".to_string(),
                format!("{} [{}] extend=both", self.cbar_label, bounds.join(", ")),
            ),
        ]
    }

    /// Renders the plot and writes it as an RGBA PNG.
    pub fn save_png(&self, path: &Path) -> Result<(), PlotError> {
        let img = self.render()?;
        let io_err = |source| PlotError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_err)?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), img.width as u32, img.height as u32);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        for (keyword, text) in self.text_chunks() {
            encoder.add_text_chunk(keyword, text)?;
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&img.pixels)?;
        writer.finish()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn plot(layers: Vec<Vec<Vec<f64>>>) -> PortraitPlot {
        let rows = layers[0].len();
        let cols = layers[0].first().map(Vec::len).unwrap_or(0);
        PortraitPlot {
            legend_labels: (0..layers.len()).map(|i| format!("layer{}", i)).collect(),
            layers,
            xaxis_labels: (0..cols).map(|i| format!("var{}", i)).collect(),
            yaxis_labels: (0..rows).map(|i| format!("model{}", i)).collect(),
            title: "DJF climatology RMSE-AMIP".into(),
            cbar_label: "RMSE".into(),
            colormap: DiscreteColormap::default(),
        }
    }

    #[test]
    fn test_triangle_assignment() {
        assert_eq!(layer_at(4, 0.5, 0.1), 0);
        assert_eq!(layer_at(4, 0.9, 0.5), 1);
        assert_eq!(layer_at(4, 0.5, 0.9), 2);
        assert_eq!(layer_at(4, 0.1, 0.5), 3);
        assert_eq!(layer_at(2, 0.2, 0.2), 0);
        assert_eq!(layer_at(2, 0.8, 0.8), 1);
        assert_eq!(layer_at(1, 0.8, 0.8), 0);
    }

    #[test]
    fn test_validate_rejects_bad_layers() {
        let three = plot(vec![vec![vec![0.0]]; 3]);
        assert!(matches!(three.validate(), Err(PlotError::LayerCount(3))));

        let ragged = plot(vec![vec![vec![0.0, 0.1]], vec![vec![0.0]]]);
        assert!(matches!(ragged.validate(), Err(PlotError::ShapeMismatch { layer: 1, .. })));

        let empty = plot(vec![vec![]]);
        assert!(matches!(empty.validate(), Err(PlotError::Empty)));
    }

    #[test]
    fn test_render_colours_each_triangle() {
        let cmap = DiscreteColormap::default();
        let p = plot(vec![
            vec![vec![-0.45]],
            vec![vec![0.45]],
            vec![vec![f64::NAN]],
            vec![vec![0.0]],
        ]);
        let img = p.render().unwrap();
        let (x0, y0) = (MARGIN_PX, MARGIN_PX);
        let mid = CELL_PX / 2;

        assert_eq!(img.get(x0 + mid, y0 + 3), cmap.color(-0.45));
        assert_eq!(img.get(x0 + CELL_PX - 3, y0 + mid), cmap.color(0.45));
        assert_eq!(img.get(x0 + mid, y0 + CELL_PX - 3), cmap.color(f64::NAN));
        assert_eq!(img.get(x0 + 3, y0 + mid), cmap.color(0.0));
    }

    #[test]
    fn test_save_png_carries_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.png");
        let p = plot(vec![vec![vec![0.1, 0.2], vec![0.3, f64::NAN]]]);
        p.save_png(&path).unwrap();

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        let img = p.render().unwrap();
        assert_eq!(info.width as usize, img.width);
        assert_eq!(info.height as usize, img.height);

        let title = info
            .uncompressed_latin1_text
            .iter()
            .find(|chunk| chunk.keyword == "Title")
            .map(|chunk| chunk.text.clone());
        assert_eq!(title.as_deref(), Some("DJF climatology RMSE-AMIP"));
    }
}
