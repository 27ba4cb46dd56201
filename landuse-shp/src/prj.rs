//! Détection du code EPSG depuis le fichier .prj (WKT ESRI ou OGC)

use std::sync::LazyLock;

use regex::Regex;

use crate::{Projection, ShpError};

/// `AUTHORITY` enfant direct de la racine : suivi du `]` final du WKT
static ROOT_AUTHORITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]\s*\]$"#).expect("static regex")
});

static ROOT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(PROJCS|GEOGCS)\[\s*"([^"]+)""#).expect("static regex"));

static UTM_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(ETRS_1989|ETRS89|WGS_1984|WGS_84)_UTM_ZONE_(\d{1,2})([NS])$")
        .expect("static regex")
});

/// Détecte la projection décrite par le contenu d'un fichier .prj
///
/// Ordre de résolution :
/// 1. `AUTHORITY["EPSG","n"]` de la racine
/// 2. Nom ESRI ou OGC connu du `PROJCS`/`GEOGCS` racine
///
/// Les `AUTHORITY` des nœuds imbriqués (`UNIT`, `GEOGCS` d'un `PROJCS`...) ne
/// décrivent pas le CRS et sont ignorées.
pub fn parse(wkt: &str) -> Result<Projection, ShpError> {
    let wkt = wkt.trim();

    if let Some(epsg) = ROOT_AUTHORITY
        .captures(wkt)
        .and_then(|c| c[1].parse::<u32>().ok())
    {
        return Ok(Projection { epsg });
    }

    let name = ROOT_NAME
        .captures(wkt)
        .map(|c| c[2].to_string())
        .ok_or_else(|| ShpError::UnknownProjection(truncate(wkt)))?;

    epsg_from_name(&name)
        .map(|epsg| Projection { epsg })
        .ok_or(ShpError::UnknownProjection(name))
}

/// Associe un nom de CRS ESRI/OGC à son code EPSG
fn epsg_from_name(name: &str) -> Option<u32> {
    let normalized = name.replace([' ', '/'], "_").to_ascii_uppercase();
    let normalized = normalized.replace("__", "_").replace("__", "_");

    match normalized.as_str() {
        "GCS_WGS_1984" | "WGS_84" | "WGS84" => return Some(4326),
        "GCS_ETRS_1989" | "ETRS89" => return Some(4258),
        "WGS_1984_WEB_MERCATOR_AUXILIARY_SPHERE" | "WGS_84_PSEUDO-MERCATOR" => return Some(3857),
        _ => {}
    }

    let caps = UTM_NAME.captures(&normalized)?;
    let zone: u32 = caps[2].parse().ok()?;
    if !(1..=60).contains(&zone) {
        return None;
    }

    match (&caps[1], &caps[3]) {
        ("ETRS_1989" | "ETRS89", "N") => Some(25800 + zone),
        ("WGS_1984" | "WGS_84", "N") => Some(32600 + zone),
        ("WGS_1984" | "WGS_84", "S") => Some(32700 + zone),
        _ => None,
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(60).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OSM_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["Degree",0.017453292519943295]]"#;

    const OGC_25830: &str = r#"PROJCS["ETRS89 / UTM zone 30N",GEOGCS["ETRS89",DATUM["European_Terrestrial_Reference_System_1989",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6258"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4258"]],PROJECTION["Transverse_Mercator"],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AUTHORITY["EPSG","25830"]]"#;

    #[test]
    fn test_esri_wgs84() {
        assert_eq!(parse(OSM_PRJ).unwrap().epsg, 4326);
    }

    #[test]
    fn test_outermost_authority_wins() {
        assert_eq!(parse(OGC_25830).unwrap().epsg, 25830);
    }

    #[test]
    fn test_nested_authorities_ignored() {
        // Racine sans AUTHORITY : ni l'unité (9001) ni le GEOGCS (4258)
        let prj = r#"PROJCS["ETRS89 / UTM zone 30N",GEOGCS["ETRS89",DATUM["European_Terrestrial_Reference_System_1989",SPHEROID["GRS 1980",6378137,298.257222101]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4258"]],PROJECTION["Transverse_Mercator"],PARAMETER["central_meridian",-3],UNIT["metre",1,AUTHORITY["EPSG","9001"]]]"#;
        assert_eq!(parse(prj).unwrap().epsg, 25830);

        let unnamed = r#"PROJCS["Local grid",GEOGCS["GCS_Local"],UNIT["metre",1,AUTHORITY["EPSG","9001"]]]"#;
        assert!(matches!(parse(unnamed), Err(ShpError::UnknownProjection(_))));
    }

    #[test]
    fn test_geographic_root_authority() {
        let prj = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]]
"#;
        assert_eq!(parse(prj).unwrap().epsg, 4326);
    }

    #[test]
    fn test_esri_utm_names() {
        assert_eq!(epsg_from_name("ETRS_1989_UTM_Zone_30N"), Some(25830));
        assert_eq!(epsg_from_name("WGS_1984_UTM_Zone_20N"), Some(32620));
        assert_eq!(epsg_from_name("WGS_1984_UTM_Zone_40S"), Some(32740));
        assert_eq!(epsg_from_name("WGS 84 / UTM zone 31N"), Some(32631));
        assert_eq!(epsg_from_name("ETRS_1989_UTM_Zone_30S"), None);
        assert_eq!(epsg_from_name("WGS_1984_UTM_Zone_61N"), None);
    }

    #[test]
    fn test_web_mercator() {
        let prj = r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984"]]"#;
        assert_eq!(parse(prj).unwrap().epsg, 3857);
    }

    #[test]
    fn test_unknown_projection() {
        let prj = r#"PROJCS["Some_Local_Grid",GEOGCS["GCS_Local"]]"#;
        assert!(matches!(parse(prj), Err(ShpError::UnknownProjection(_))));
        assert!(parse("garbage").is_err());
    }
}
