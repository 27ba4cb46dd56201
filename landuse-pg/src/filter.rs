//! Filtre par classe d'occupation du sol

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Filtre appliqué à la requête et clé du cache de rendu
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ClassFilter {
    /// Toutes les classes
    #[default]
    All,
    /// Une seule classe
    Class(String),
}

impl ClassFilter {
    /// Analyse une saisie utilisateur : vide, `all` ou `*` signifie toutes les classes
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "*" || trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Class(trimmed.to_string())
        }
    }

    /// Classe filtrée, `None` pour toutes
    pub fn class(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Class(class) => Some(class),
        }
    }
}

impl FromStr for ClassFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for ClassFilter {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<ClassFilter> for String {
    fn from(filter: ClassFilter) -> Self {
        filter.to_string()
    }
}

impl fmt::Display for ClassFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Class(class) => write!(f, "{}", class),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(ClassFilter::parse(""), ClassFilter::All);
        assert_eq!(ClassFilter::parse("  "), ClassFilter::All);
        assert_eq!(ClassFilter::parse("ALL"), ClassFilter::All);
        assert_eq!(ClassFilter::parse("*"), ClassFilter::All);
        assert_eq!(
            ClassFilter::parse(" forest "),
            ClassFilter::Class("forest".into())
        );
        assert_eq!(ClassFilter::parse("forest").class(), Some("forest"));
        assert_eq!(ClassFilter::All.class(), None);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&ClassFilter::Class("forest".into())).unwrap();
        assert_eq!(json, r#""forest""#);
        let filter: ClassFilter = serde_json::from_str(r#""all""#).unwrap();
        assert_eq!(filter, ClassFilter::All);
    }
}
