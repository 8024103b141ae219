//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module is the single place where INI key names are mapped to struct
//! fields. Nothing downstream reads string keys.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::{ConfigFile, StalenessMode};
use crate::coord::{TileRect, MAX_ZOOM};
use crate::prerender::PrerenderArea;

/// Prefix of per-area sections, as in `[area.germany]`.
const AREA_SECTION_PREFIX: &str = "area.";

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = non_empty(section, "directory") {
            config.cache.directory = expand_tilde(v);
        }
        if let Some(v) = non_empty(section, "prerendered_directory") {
            config.cache.prerendered_directory = Some(expand_tilde(v));
        }
    }

    // [map] section
    if let Some(section) = ini.section(Some("map")) {
        if let Some(v) = non_empty(section, "data_directory") {
            config.map.data_directory = expand_tilde(v);
        }
        if let Some(v) = non_empty(section, "theme_file") {
            config.map.theme_file = expand_tilde(v);
        }
        if let Some(v) = non_empty(section, "coverage") {
            config.map.coverage = v.parse().map_err(|reason| invalid("map", "coverage", v, reason))?;
        }
    }

    // [server] section
    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = non_empty(section, "http_bind") {
            config.server.http_bind = parse_value(
                "server",
                "http_bind",
                v,
                "expected address like 0.0.0.0:8000",
            )?;
        }
        if let Some(v) = non_empty(section, "socket_bind") {
            config.server.socket_bind = parse_value(
                "server",
                "socket_bind",
                v,
                "expected address like 0.0.0.0:8001",
            )?;
        }
        if let Some(v) = non_empty(section, "socket_workers") {
            let workers: usize =
                parse_value("server", "socket_workers", v, "expected a positive integer")?;
            if workers == 0 {
                return Err(invalid("server", "socket_workers", v, "must be at least 1"));
            }
            config.server.socket_workers = workers;
        }
    }

    // [queue] section
    if let Some(section) = ini.section(Some("queue")) {
        if let Some(v) = non_empty(section, "directory") {
            config.queue.directory = expand_tilde(v);
        }
        if let Some(v) = non_empty(section, "output_directory") {
            config.queue.output_directory = Some(expand_tilde(v));
        }
        if let Some(v) = non_empty(section, "poll_timeout_secs") {
            config.queue.poll_timeout = parse_nonzero_secs("queue", "poll_timeout_secs", v)?;
        }
        if let Some(v) = non_empty(section, "scan_interval_secs") {
            config.queue.scan_interval = parse_nonzero_secs("queue", "scan_interval_secs", v)?;
        }
    }

    // [prerender] section
    if let Some(section) = ini.section(Some("prerender")) {
        if let Some(v) = non_empty(section, "enabled") {
            config.prerender.enabled = parse_bool("prerender", "enabled", v)?;
        }
        if let Some(v) = non_empty(section, "global_max_zoom") {
            config.prerender.global_max_zoom = parse_zoom("prerender", "global_max_zoom", v)?;
        }
        if let Some(v) = non_empty(section, "interval_secs") {
            config.prerender.interval = parse_nonzero_secs("prerender", "interval_secs", v)?;
        }
        if let Some(v) = non_empty(section, "staleness") {
            config.prerender.staleness = match v.to_lowercase().as_str() {
                "age" => StalenessMode::Age,
                "zoom" => StalenessMode::Zoom,
                _ => return Err(invalid("prerender", "staleness", v, "must be one of: age, zoom")),
            };
        }
        if let Some(v) = non_empty(section, "max_age_secs") {
            config.prerender.max_age = parse_secs("prerender", "max_age_secs", v)?;
        }
        if let Some(v) = non_empty(section, "zoom_ceiling") {
            config.prerender.zoom_ceiling = parse_zoom("prerender", "zoom_ceiling", v)?;
        }
        if let Some(v) = non_empty(section, "skip_unchanged") {
            config.prerender.skip_unchanged = parse_bool("prerender", "skip_unchanged", v)?;
        }
        if let Some(v) = non_empty(section, "run_once") {
            config.prerender.run_once = parse_bool("prerender", "run_once", v)?;
        }
    }

    // [area.<name>] sections replace the built-in area list
    let mut areas = Vec::new();
    for (name, section) in ini.iter() {
        let Some(area_name) = name.and_then(|n| n.strip_prefix(AREA_SECTION_PREFIX)) else {
            continue;
        };
        areas.push(parse_area(area_name, section)?);
    }
    if !areas.is_empty() {
        config.areas = areas;
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section, "file") {
            config.logging.file = expand_tilde(v);
        }
    }

    Ok(config)
}

fn parse_area(name: &str, section: &Properties) -> Result<PrerenderArea, ConfigFileError> {
    let section_name = format!("{}{}", AREA_SECTION_PREFIX, name);
    let coordinate = |key: &str| -> Result<u32, ConfigFileError> {
        let v = non_empty(section, key)
            .ok_or_else(|| invalid(&section_name, key, "", "required key is missing"))?;
        parse_value(&section_name, key, v, "expected a non-negative integer")
    };

    let rect = TileRect::new(
        coordinate("min_x")?,
        coordinate("min_y")?,
        coordinate("max_x")?,
        coordinate("max_y")?,
    );
    let max_zoom = match non_empty(section, "max_zoom") {
        Some(v) => parse_zoom(&section_name, "max_zoom", v)?,
        None => return Err(invalid(&section_name, "max_zoom", "", "required key is missing")),
    };

    let area = PrerenderArea::new(name, rect, max_zoom);
    area.validate()
        .map_err(|reason| invalid(&section_name, "bounds", &area.to_string(), reason))?;
    Ok(area)
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(section: &str, key: &str, value: &str, reason: impl Into<String>) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    v: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    v.parse().map_err(|_| invalid(section, key, v, reason))
}

fn parse_secs(section: &str, key: &str, v: &str) -> Result<Duration, ConfigFileError> {
    parse_value(section, key, v, "expected a number of seconds").map(Duration::from_secs)
}

fn parse_nonzero_secs(section: &str, key: &str, v: &str) -> Result<Duration, ConfigFileError> {
    let secs = parse_secs(section, key, v)?;
    if secs.is_zero() {
        return Err(invalid(section, key, v, "must be at least 1 second"));
    }
    Ok(secs)
}

fn parse_zoom(section: &str, key: &str, v: &str) -> Result<u8, ConfigFileError> {
    let zoom: u8 = parse_value(section, key, v, "expected a zoom level")?;
    if zoom > MAX_ZOOM {
        return Err(invalid(
            section,
            key,
            v,
            format!("must be at most {}", MAX_ZOOM),
        ));
    }
    Ok(zoom)
}

fn parse_bool(section: &str, key: &str, v: &str) -> Result<bool, ConfigFileError> {
    match v.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(invalid(section, key, v, "expected true or false")),
    }
}

/// Expand `~/` to the user's home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
