//! Mean-climate portrait plots.
//!
//! Two families of images are drawn from the merged result store, both for
//! the `rms_xy` statistic and normalised per variable by the ensemble median:
//! one per season with the four regions as cell triangles, and one per region
//! with the four seasons as triangles.
//!
//! Submodules:
//! - `colormap`: the binned `RdYlBu_r` colour map.
//! - `portrait`: rasterising and PNG encoding.

pub mod colormap;
pub mod portrait;

use std::path::{Path, PathBuf};

use crate::logging::{self, Stage};
use crate::metrics::{ResultStore, normalize_by_median};
use crate::model::{Convention, PlotError, Season};

pub use colormap::DiscreteColormap;
pub use portrait::PortraitPlot;

/// Statistic shown in the portrait plots.
pub const PORTRAIT_STAT: &str = "rms_xy";

/// Regions drawn as triangles, in layer order (top, right, bottom, left).
pub const PLOT_REGIONS: [&str; 4] = ["global", "NHEX", "TROPICS", "SHEX"];

const CBAR_LABEL: &str = "RMSE";

/// The two families of portrait plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    /// One image per season, regions as layers.
    RegionsPerSeason,
    /// One image per region, seasons as layers.
    SeasonsPerRegion,
}

impl PlotKind {
    pub fn file_prefix(&self) -> &'static str {
        match self {
            PlotKind::RegionsPerSeason => "mean_clim_portrait_plot_4regions",
            PlotKind::SeasonsPerRegion => "mean_clim_portrait_plot_4seasons",
        }
    }
}

/// `mean_clim_portrait_plot_4regions_DJF_AMIP.png` and friends. `label` is
/// upper-cased.
pub fn image_file_name(kind: PlotKind, label: &str, convention: Convention) -> String {
    format!("{}_{}_{}.png", kind.file_prefix(), label.to_uppercase(), convention)
}

pub fn plot_title(label: &str, convention: Convention) -> String {
    format!("{} climatology RMSE-{}", label.to_uppercase(), convention)
}

/// Every image name the plot step produces for `convention`, seasons first
/// and then regions.
pub fn expected_images(convention: Convention) -> Vec<String> {
    Season::QUARTERS
        .iter()
        .map(|s| image_file_name(PlotKind::RegionsPerSeason, s.as_str(), convention))
        .chain(
            PLOT_REGIONS
                .iter()
                .map(|r| image_file_name(PlotKind::SeasonsPerRegion, r, convention)),
        )
        .collect()
}

/// Builds one portrait plot from `(season, region)` leaves of the store,
/// one layer per leaf.
fn build(
    store: &ResultStore,
    leaves: &[(Season, &str)],
    legend_labels: Vec<String>,
    title: String,
) -> PortraitPlot {
    let variables: Vec<String> = store.variables().iter().cloned().collect();
    let layers = leaves
        .iter()
        .map(|(season, region)| {
            let table = store.table(PORTRAIT_STAT, *season, region);
            normalize_by_median(&table.to_matrix(&variables))
        })
        .collect();
    let yaxis_labels = leaves
        .first()
        .map(|(season, region)| store.table(PORTRAIT_STAT, *season, region).model_names())
        .unwrap_or_default();

    PortraitPlot {
        layers,
        xaxis_labels: variables,
        yaxis_labels,
        legend_labels,
        title,
        cbar_label: CBAR_LABEL.to_string(),
        colormap: DiscreteColormap::default(),
    }
}

/// The per-season plots: layers are `PLOT_REGIONS`.
pub fn season_plots(store: &ResultStore, convention: Convention) -> Vec<(String, PortraitPlot)> {
    Season::QUARTERS
        .iter()
        .map(|&season| {
            let leaves: Vec<(Season, &str)> = PLOT_REGIONS.iter().map(|r| (season, *r)).collect();
            let legend = PLOT_REGIONS.iter().map(|r| r.to_string()).collect();
            let plot = build(store, &leaves, legend, plot_title(season.as_str(), convention));
            (image_file_name(PlotKind::RegionsPerSeason, season.as_str(), convention), plot)
        })
        .collect()
}

/// The per-region plots: layers are the four seasons, DJF first.
pub fn region_plots(store: &ResultStore, convention: Convention) -> Vec<(String, PortraitPlot)> {
    PLOT_REGIONS
        .iter()
        .map(|&region| {
            let leaves: Vec<(Season, &str)> = Season::QUARTERS.iter().map(|s| (*s, region)).collect();
            let legend = Season::QUARTERS.iter().map(|s| s.as_str().to_string()).collect();
            let plot = build(store, &leaves, legend, plot_title(region, convention));
            (image_file_name(PlotKind::SeasonsPerRegion, region, convention), plot)
        })
        .collect()
}

/// Draws both plot families into `outdir` and returns the written paths.
pub fn write_portrait_plots(
    store: &ResultStore,
    convention: Convention,
    outdir: &Path,
) -> Result<Vec<PathBuf>, PlotError> {
    let mut written = Vec::new();
    for (name, plot) in season_plots(store, convention)
        .into_iter()
        .chain(region_plots(store, convention))
    {
        let path = outdir.join(&name);
        plot.save_png(&path)?;
        logging::info(
            Stage::Plot,
            Some(&name),
            &format!("{} models x {} variables", plot.nrows(), plot.ncols()),
        );
        written.push(path);
    }
    Ok(written)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
