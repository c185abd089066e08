//! Display settings for the viewer

use serde::{Deserialize, Serialize};

/// Background presets offered by the settings panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundColor {
    Black,
    White,
    Gray,
    /// User-picked 24-bit RGB color
    Custom,
}

impl Default for BackgroundColor {
    fn default() -> Self {
        Self::Black
    }
}

/// Clear-color value for the "black" preset (near-black with a blue cast)
pub const BACKGROUND_BLACK: u32 = 0x0a0a0f;
/// Clear-color value for the "white" preset
pub const BACKGROUND_WHITE: u32 = 0xffffff;
/// Clear-color value for the "gray" preset
pub const BACKGROUND_GRAY: u32 = 0x808080;
/// Initial custom color before the user picks one
pub const DEFAULT_CUSTOM_BACKGROUND: u32 = 0x1a1a2e;

/// Valid range for the splat footprint scale
pub const POINT_SIZE_RANGE: (f32, f32) = (0.1, 3.0);
/// Valid range for the auto-rotate speed multiplier
pub const AUTO_ROTATE_SPEED_RANGE: (f32, f32) = (0.1, 3.0);

/// Display preferences, replaced wholesale on each update
///
/// A value type: updates go through [`ViewerSettings::merged`], which
/// produces a new value rather than mutating in place. Callers are expected
/// to supply values inside the documented ranges; out-of-range input is a
/// caller bug, not a reported error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewerSettings {
    pub background_color: BackgroundColor,
    /// Retained even while a preset is active, so switching back to
    /// `Custom` restores the last picked color
    pub custom_background_color: u32,
    /// Render raw points instead of shaded splats
    pub point_cloud_mode: bool,
    /// Splat footprint scale factor in [0.1, 3.0]
    pub point_size: f32,
    pub auto_rotate: bool,
    /// Angular-speed multiplier in [0.1, 3.0]
    pub auto_rotate_speed: f32,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            background_color: BackgroundColor::Black,
            custom_background_color: DEFAULT_CUSTOM_BACKGROUND,
            point_cloud_mode: false,
            point_size: 1.0,
            auto_rotate: false,
            auto_rotate_speed: 1.0,
        }
    }
}

impl ViewerSettings {
    /// Produce a new settings value with the fields named by `update`
    /// overwritten and all others preserved
    pub fn merged(&self, update: &SettingsUpdate) -> Self {
        Self {
            background_color: update.background_color.unwrap_or(self.background_color),
            custom_background_color: update
                .custom_background_color
                .unwrap_or(self.custom_background_color),
            point_cloud_mode: update.point_cloud_mode.unwrap_or(self.point_cloud_mode),
            point_size: update.point_size.unwrap_or(self.point_size),
            auto_rotate: update.auto_rotate.unwrap_or(self.auto_rotate),
            auto_rotate_speed: update.auto_rotate_speed.unwrap_or(self.auto_rotate_speed),
        }
    }

    /// The 24-bit clear color for the active background selection
    pub fn resolved_background(&self) -> u32 {
        match self.background_color {
            BackgroundColor::Black => BACKGROUND_BLACK,
            BackgroundColor::White => BACKGROUND_WHITE,
            BackgroundColor::Gray => BACKGROUND_GRAY,
            BackgroundColor::Custom => self.custom_background_color,
        }
    }
}

/// Partial settings update: any subset of fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub background_color: Option<BackgroundColor>,
    pub custom_background_color: Option<u32>,
    pub point_cloud_mode: Option<bool>,
    pub point_size: Option<f32>,
    pub auto_rotate: Option<bool>,
    pub auto_rotate_speed: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_overwrites_only_named_fields() {
        let settings = ViewerSettings::default();
        let merged = settings.merged(&SettingsUpdate {
            point_size: Some(2.0),
            ..Default::default()
        });
        assert_eq!(merged.point_size, 2.0);
        assert_eq!(merged.background_color, settings.background_color);
        assert_eq!(merged.point_cloud_mode, settings.point_cloud_mode);
        assert_eq!(merged.auto_rotate, settings.auto_rotate);
        assert_eq!(merged.auto_rotate_speed, settings.auto_rotate_speed);
        assert_eq!(
            merged.custom_background_color,
            settings.custom_background_color
        );
    }

    #[test]
    fn test_merged_does_not_mutate_the_original() {
        let settings = ViewerSettings::default();
        let _ = settings.merged(&SettingsUpdate {
            auto_rotate: Some(true),
            ..Default::default()
        });
        assert_eq!(settings, ViewerSettings::default());
    }

    #[test]
    fn test_custom_background_survives_preset_switches() {
        let mut settings = ViewerSettings::default();
        settings = settings.merged(&SettingsUpdate {
            background_color: Some(BackgroundColor::Custom),
            custom_background_color: Some(0x112233),
            ..Default::default()
        });
        settings = settings.merged(&SettingsUpdate {
            background_color: Some(BackgroundColor::White),
            ..Default::default()
        });
        assert_eq!(settings.resolved_background(), BACKGROUND_WHITE);
        settings = settings.merged(&SettingsUpdate {
            background_color: Some(BackgroundColor::Custom),
            ..Default::default()
        });
        assert_eq!(settings.resolved_background(), 0x112233);
    }

    #[test]
    fn test_preset_clear_colors() {
        let mut settings = ViewerSettings::default();
        assert_eq!(settings.resolved_background(), BACKGROUND_BLACK);
        settings.background_color = BackgroundColor::Gray;
        assert_eq!(settings.resolved_background(), BACKGROUND_GRAY);
    }
}
