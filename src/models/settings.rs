use garde::Validate;
use serde::{Deserialize, Serialize};

/// Partial edit settings as stored in a batch template or a per-image override.
///
/// Unknown keys are ignored and `null` counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_point: Option<f64>,
}

impl SettingsOverride {
    /// Parse a JSON settings object. A missing or `null` object is empty.
    pub fn from_json(value: Option<&serde_json::Value>) -> Result<Self, SettingsError> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(v) => Self::deserialize(v).map_err(SettingsError::Malformed),
        }
    }
}

/// Fully resolved edit settings, one value per field.
///
/// The ranges are only enforced when strict settings are enabled; by default
/// out-of-range values are passed to the pipeline untouched and end up clipped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EditSettings {
    #[garde(range(min = 0.5, max = 2.0))]
    pub brightness: f64,

    #[garde(range(min = 0.5, max = 2.0))]
    pub contrast: f64,

    #[garde(range(min = 0.0, max = 3.0))]
    pub saturation: f64,

    /// Degrees, 0–360.
    #[garde(range(min = 0.0, max = 360.0))]
    pub hue: f64,

    /// Magenta (positive) or green (negative) overlay strength, -180–180.
    #[garde(range(min = -180.0, max = 180.0))]
    pub tint: f64,

    /// Red/blue balance, -100–100.
    #[garde(range(min = -100.0, max = 100.0))]
    pub warmth: f64,

    /// Shadow floor, 0–100.
    #[garde(range(min = 0.0, max = 100.0))]
    pub black_point: f64,
}

impl Default for EditSettings {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            hue: 0.0,
            tint: 0.0,
            warmth: 0.0,
            black_point: 0.0,
        }
    }
}

impl EditSettings {
    /// Merge a batch template with a per-image override.
    ///
    /// Override values replace template values field by field; fields absent
    /// from both fall back to the defaults.
    pub fn resolve(template: &SettingsOverride, image_override: &SettingsOverride) -> Self {
        let defaults = Self::default();
        let pick = |o: Option<f64>, t: Option<f64>, d: f64| o.or(t).unwrap_or(d);

        Self {
            brightness: pick(image_override.brightness, template.brightness, defaults.brightness),
            contrast: pick(image_override.contrast, template.contrast, defaults.contrast),
            saturation: pick(image_override.saturation, template.saturation, defaults.saturation),
            hue: pick(image_override.hue, template.hue, defaults.hue),
            tint: pick(image_override.tint, template.tint, defaults.tint),
            warmth: pick(image_override.warmth, template.warmth, defaults.warmth),
            black_point: pick(image_override.black_point, template.black_point, defaults.black_point),
        }
    }

    /// Resolve straight from the stored JSON objects.
    ///
    /// With `strict` set, the resolved record must also fall inside the editor's
    /// slider ranges.
    pub fn resolve_json(
        template: Option<&serde_json::Value>,
        image_override: Option<&serde_json::Value>,
        strict: bool,
    ) -> Result<Self, SettingsError> {
        let template = SettingsOverride::from_json(template)?;
        let image_override = SettingsOverride::from_json(image_override)?;
        let resolved = Self::resolve(&template, &image_override);

        if strict {
            resolved
                .validate()
                .map_err(|report| SettingsError::OutOfRange(report.to_string()))?;
        }

        Ok(resolved)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Malformed settings object: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Settings out of range: {0}")]
    OutOfRange(String),
}
