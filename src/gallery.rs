//! Static HTML gallery of the portrait plots.
//!
//! One page in the output directory with a four-column grid of the images
//! that exist and a click-to-enlarge lightbox. Images that were not produced
//! are logged and left out.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config;
use crate::logging::{self, Stage};
use crate::model::Convention;
use crate::plot::{self, PlotKind};

/// Seasons in gallery order.
pub const GALLERY_SEASONS: [&str; 4] = ["MAM", "JJA", "SON", "DJF"];

/// Regions in gallery order.
pub const GALLERY_REGIONS: [&str; 4] = ["GLOBAL", "NHEX", "SHEX", "TROPICS"];

const STYLE: &str = r#"<style>
/* Basic styling for the modal */
.modal {
  display: none;
  position: fixed;
  z-index: 1;
  left: 0;
  top: 0;
  width: 100%;
  height: 100%;
  overflow: auto;
  background-color: rgba(0,0,0,0.8);
  padding-top: 60px;
}
.modal-content {
  margin: auto;
  display: block;
  max-width: 80%;
  max-height: 80%;
}
.close {
  position: absolute;
  top: 15px;
  right: 35px;
  color: #fff;
  font-size: 40px;
  font-weight: bold;
  transition: 0.3s;
  cursor: pointer;
}
.close:hover,
.close:focus {
  color: #bbb;
  text-decoration: none;
  cursor: pointer;
}
/* Grid layout for images */
.grid-container {
  display: grid;
  grid-template-columns: repeat(4, 1fr);
  gap: 20px;
  align-items: flex-end;
  margin-top: 20px;
}
.grid-item {
  display: flex;
  flex-direction: column;
  justify-content: flex-end;
  text-align: center;
  border: 2px solid #ccc;
  padding: 10px;
  border-radius: 10px;
}
.grid-item img {
  width: 100%;
  height: auto;
  border: 1px solid #999;
  border-radius: 5px;
}
</style>
"#;

const MODAL: &str = r#"<div id='myModal' class='modal'>
<span class='close' onclick='closeModal()'>&times;</span>
<img class='modal-content' id='modalImage'>
</div>
<script>
function openModal(imageSrc) {
  var modal = document.getElementById('myModal');
  var modalImage = document.getElementById('modalImage');
  modal.style.display = 'block';
  modalImage.src = imageSrc;
}
function closeModal() {
  var modal = document.getElementById('myModal');
  modal.style.display = 'none';
}
</script>
"#;

/// One candidate image of the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub file_name: String,
    pub alt: String,
}

/// Outcome of writing the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryReport {
    pub html_path: PathBuf,
    pub included: Vec<String>,
    pub missing: Vec<PathBuf>,
}

/// Every image the gallery looks for, in page order.
pub fn gallery_entries(convention: Convention) -> Vec<GalleryEntry> {
    let seasons = GALLERY_SEASONS.iter().map(|season| GalleryEntry {
        file_name: plot::image_file_name(PlotKind::RegionsPerSeason, season, convention),
        alt: format!("4 Regions over {}", season),
    });
    let regions = GALLERY_REGIONS.iter().map(|region| GalleryEntry {
        file_name: plot::image_file_name(PlotKind::SeasonsPerRegion, region, convention),
        alt: format!("4 Seasons over {}", region),
    });
    seasons.chain(regions).collect()
}

/// Renders the page for the given images, which are referenced by file
/// name relative to the page.
pub fn render_html(descriptor: &str, entries: &[&GalleryEntry]) -> String {
    let mut html = String::new();
    html.push_str("<html><head><title>PCMDI Figures Gallery</title>\n");
    html.push_str(STYLE);
    html.push_str("</head><body>\n");
    let _ = writeln!(
        html,
        "<h1 style='text-align: center;'>PCMDI (v2.2.2) Mean Climate Metrics Figures Gallery for Experiment: {}</h1>",
        descriptor
    );

    html.push_str("<div class='grid-container'>\n");
    for entry in entries {
        html.push_str("<div class='grid-item'>\n");
        let _ = writeln!(
            html,
            "<img src='{0}' alt='{1}' onclick='openModal(\"{0}\")'/><br/>",
            entry.file_name, entry.alt
        );
        html.push_str("</div>\n");
    }
    html.push_str("</div>\n");

    html.push_str(MODAL);
    html.push_str("</body></html>\n");
    html
}

/// Writes `<outdir>/pcmdi_figures_gallery.html` with every portrait plot
/// present in `outdir`.
pub fn write_gallery(outdir: &Path, descriptor: &str, convention: Convention) -> io::Result<GalleryReport> {
    let entries = gallery_entries(convention);
    let mut present = Vec::new();
    let mut missing = Vec::new();

    for entry in &entries {
        let path = outdir.join(&entry.file_name);
        if path.exists() {
            present.push(entry);
        } else {
            logging::log_missing_file(Stage::Gallery, &path);
            missing.push(path);
        }
    }

    let html_path = config::gallery_path(outdir);
    fs::write(&html_path, render_html(descriptor, &present))?;
    logging::info(
        Stage::Gallery,
        Some(descriptor),
        &format!("HTML file '{}' created successfully.", html_path.display()),
    );

    Ok(GalleryReport {
        html_path,
        included: present.iter().map(|e| e.file_name.clone()).collect(),
        missing,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
