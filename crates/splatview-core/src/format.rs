//! Scene format inference from filenames

use serde::{Deserialize, Serialize};

/// Binary encodings understood by the external renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneFormat {
    /// Uncompressed PLY point-splat container
    Ply,
    /// Packed `.splat` container
    Splat,
    /// Compressed `.ksplat` container
    KSplat,
}

impl SceneFormat {
    /// Infer the format from a filename extension, case-insensitively.
    ///
    /// Unrecognized or missing extensions fall back to [`SceneFormat::Ply`];
    /// the renderer decides whether the payload is actually readable.
    pub fn from_filename(filename: &str) -> Self {
        let extension = filename
            .rsplit('.')
            .next()
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("splat") => Self::Splat,
            Some("ksplat") => Self::KSplat,
            _ => Self::Ply,
        }
    }

    /// Canonical lowercase extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ply => "ply",
            Self::Splat => "splat",
            Self::KSplat => "ksplat",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_matches_known_extensions() {
        assert_eq!(SceneFormat::from_filename("scene.ply"), SceneFormat::Ply);
        assert_eq!(SceneFormat::from_filename("scene.splat"), SceneFormat::Splat);
        assert_eq!(
            SceneFormat::from_filename("scene.ksplat"),
            SceneFormat::KSplat
        );
    }

    #[test]
    fn test_inference_is_case_insensitive() {
        assert_eq!(SceneFormat::from_filename("SCENE.PLY"), SceneFormat::Ply);
        assert_eq!(SceneFormat::from_filename("Scene.Splat"), SceneFormat::Splat);
        assert_eq!(
            SceneFormat::from_filename("scene.KSplat"),
            SceneFormat::KSplat
        );
    }

    #[test]
    fn test_unknown_or_missing_extension_defaults_to_ply() {
        assert_eq!(SceneFormat::from_filename("scene.gltf"), SceneFormat::Ply);
        assert_eq!(SceneFormat::from_filename("scene"), SceneFormat::Ply);
        assert_eq!(SceneFormat::from_filename(""), SceneFormat::Ply);
        assert_eq!(SceneFormat::from_filename("archive.splat.zip"), SceneFormat::Ply);
    }
}
