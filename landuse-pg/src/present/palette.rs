//! Couleurs par classe

use std::collections::BTreeMap;

use crate::config::MapConfig;

/// Contour des polygones
pub const STROKE_COLOR: &str = "black";
pub const STROKE_WEIGHT: f64 = 0.5;
pub const FILL_OPACITY: f64 = 0.7;

/// Table classe → couleur, avec couleur par défaut explicite
#[derive(Debug, Clone)]
pub struct Palette {
    colors: BTreeMap<String, String>,
    default_color: String,
}

impl Palette {
    pub fn new(colors: BTreeMap<String, String>, default_color: &str) -> Self {
        Self {
            colors,
            default_color: default_color.to_string(),
        }
    }

    pub fn from_config(config: &MapConfig) -> Self {
        Self::new(config.palette.clone(), &config.default_color)
    }

    /// Couleur de remplissage d'une classe
    pub fn color_for(&self, class: &str) -> &str {
        self.colors
            .get(class)
            .map(String::as_str)
            .unwrap_or(&self.default_color)
    }

    pub fn default_color(&self) -> &str {
        &self.default_color
    }

    /// Entrées de légende, dans l'ordre des classes
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.colors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::from_config(&MapConfig::default())
    }
}
