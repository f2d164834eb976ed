// ============================================================================
// SETTINGS: persisted key=value configuration
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use egui::Color32;

use crate::ops::ingest::ImageColormap;

/// Settings that persist across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Base URL of the annotation backend (no trailing slash).
    pub backend_url: String,
    /// Quiet period before a slice/axis change triggers the batch refetch.
    pub refetch_debounce_ms: u64,
    /// Minimum spacing between two SAM point clicks.
    pub sam_cooldown_ms: u64,
    /// Brush size applied at startup.
    pub brush_size: u32,
    pub label_alpha: f32,
    pub annotation_alpha: f32,
    pub superpixel_alpha: f32,
    pub superpixel_tint: Color32,
    /// Draw label outlines instead of filled regions.
    pub label_contour: bool,
    /// Pseudo-color map for the image and preview layers.
    pub image_colormap: ImageColormap,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5000".to_string(),
            refetch_debounce_ms: 250,
            sam_cooldown_ms: 250,
            brush_size: 10,
            label_alpha: 1.0,
            annotation_alpha: 1.0,
            superpixel_alpha: 0.3,
            superpixel_tint: Color32::from_rgb(255, 0, 0),
            label_contour: false,
            image_colormap: ImageColormap::Greys,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/volpaint/volpaint_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\VolPaint\volpaint_settings.cfg
    /// On macOS:   ~/Library/Application Support/VolPaint/volpaint_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("volpaint");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("volpaint_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join("VolPaint");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("volpaint_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("VolPaint");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("volpaint_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("volpaint_settings.cfg")))
        }
    }

    pub fn refetch_debounce(&self) -> Duration {
        Duration::from_millis(self.refetch_debounce_ms)
    }

    pub fn sam_cooldown(&self) -> Duration {
        Duration::from_millis(self.sam_cooldown_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Serialize a Color32 as "r,g,b,a"
    fn color_to_str(c: Color32) -> String {
        format!("{},{},{},{}", c.r(), c.g(), c.b(), c.a())
    }

    /// Parse a Color32 from "r,g,b,a"
    fn str_to_color(s: &str) -> Option<Color32> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 4 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            let a = parts[3].trim().parse::<u8>().ok()?;
            Some(Color32::from_rgba_unmultiplied(r, g, b, a))
        } else {
            None
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "backend_url={}\n\
             refetch_debounce_ms={}\n\
             sam_cooldown_ms={}\n\
             brush_size={}\n\
             label_alpha={}\n\
             annotation_alpha={}\n\
             superpixel_alpha={}\n\
             superpixel_tint={}\n\
             label_contour={}\n\
             image_colormap={}\n\
             request_timeout_secs={}\n",
            self.backend_url,
            self.refetch_debounce_ms,
            self.sam_cooldown_ms,
            self.brush_size,
            self.label_alpha,
            self.annotation_alpha,
            self.superpixel_alpha,
            Self::color_to_str(self.superpixel_tint),
            self.label_contour,
            self.image_colormap.name(),
            self.request_timeout_secs,
        )
    }

    /// Parse `key=value` lines over the defaults.  Unknown keys and
    /// unparsable values are ignored.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "backend_url" => {
                    if !val.is_empty() {
                        s.backend_url = val.trim_end_matches('/').to_string();
                    }
                }
                "refetch_debounce_ms" => {
                    if let Ok(v) = val.parse() {
                        s.refetch_debounce_ms = v;
                    }
                }
                "sam_cooldown_ms" => {
                    if let Ok(v) = val.parse() {
                        s.sam_cooldown_ms = v;
                    }
                }
                "brush_size" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.brush_size = v.max(crate::components::brush::MIN_BRUSH_SIZE);
                    }
                }
                "label_alpha" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.label_alpha = v.clamp(0.0, 1.0);
                    }
                }
                "annotation_alpha" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.annotation_alpha = v.clamp(0.0, 1.0);
                    }
                }
                "superpixel_alpha" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.superpixel_alpha = v.clamp(0.0, 1.0);
                    }
                }
                "superpixel_tint" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.superpixel_tint = c;
                    }
                }
                "label_contour" => s.label_contour = val == "true",
                "image_colormap" => {
                    if let Some(c) = ImageColormap::parse(val) {
                        s.image_colormap = c;
                    }
                }
                "request_timeout_secs" => {
                    if let Ok(v) = val.parse() {
                        s.request_timeout_secs = v;
                    }
                }
                _ => {}
            }
        }
        s
    }

    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            crate::log_warn!("Could not save settings to {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config_str(&content)
    }
}
