//! Asset store: the font, the three priority flash panels, and the weather
//! icon set, loaded once at startup from the assets directory.
//!
//! Expected layout:
//! ```text
//! assets/
//!   fonts/DejaVuSansMono.ttf
//!   images/red.png  orange.png  blue.png
//!   images/weather/<icon>.png
//! ```
//! Every file is required. A missing or undecodable asset is a fatal startup
//! error, reported with the offending path.

use crate::queue::Priority;
use crate::render::load_font;
use crate::weather::WeatherIcon;
use crate::{Error, PANEL_SIZE, Result};
use fontdue::Font;
use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Solid full-panel images shown during a priority flash.
#[derive(Clone, Debug)]
pub struct FlashPanels {
    pub red: RgbImage,
    pub orange: RgbImage,
    pub blue: RgbImage,
}

impl FlashPanels {
    /// The panel flashed before an announcement, or `None` for no flash.
    pub fn for_priority(&self, priority: Priority) -> Option<&RgbImage> {
        match priority {
            Priority::Critical => Some(&self.red),
            Priority::Warning => Some(&self.orange),
            Priority::Info => Some(&self.blue),
            Priority::None => None,
        }
    }
}

/// One panel-sized image per weather icon.
#[derive(Clone, Debug)]
pub struct WeatherIcons(HashMap<WeatherIcon, RgbImage>);

impl WeatherIcons {
    pub fn load(dir: &Path) -> Result<Self> {
        let mut icons = HashMap::new();
        for icon in WeatherIcon::ALL {
            let path = dir.join(format!("{}.png", icon.file_stem()));
            icons.insert(icon, load_and_resize_image(&path)?);
        }
        Ok(Self(icons))
    }

    pub fn get(&self, icon: WeatherIcon) -> Option<&RgbImage> {
        self.0.get(&icon)
    }
}

/// Everything loaded from the assets directory.
pub struct AssetStore {
    pub font: Font,
    pub flash: FlashPanels,
    pub weather: WeatherIcons,
}

impl AssetStore {
    /// Load all assets. `font` is relative to `assets_dir`.
    pub fn load(assets_dir: &Path, font: &Path) -> Result<Self> {
        let font_path = assets_dir.join(font);
        let font_bytes = fs::read(&font_path).map_err(|source| Error::Io {
            path: font_path.clone(),
            source,
        })?;
        let font = load_font(&font_bytes)?;

        let images = assets_dir.join("images");
        let flash = FlashPanels {
            red: load_and_resize_image(&images.join("red.png"))?,
            orange: load_and_resize_image(&images.join("orange.png"))?,
            blue: load_and_resize_image(&images.join("blue.png"))?,
        };
        let weather = WeatherIcons::load(&images.join("weather"))?;

        tracing::info!(
            "Loaded assets from {} (font: {})",
            assets_dir.display(),
            font_path.display()
        );

        Ok(Self {
            font,
            flash,
            weather,
        })
    }
}

/// Load an image from disk and resize it to the panel dimensions.
pub fn load_and_resize_image(path: &Path) -> Result<RgbImage> {
    let image_err = |source| Error::Image {
        path: path.to_path_buf(),
        source,
    };

    let reader = ImageReader::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let img = reader.decode().map_err(image_err)?;

    if img.width() == PANEL_SIZE && img.height() == PANEL_SIZE {
        Ok(img.to_rgb8())
    } else {
        Ok(img
            .resize_exact(PANEL_SIZE, PANEL_SIZE, FilterType::Lanczos3)
            .to_rgb8())
    }
}
