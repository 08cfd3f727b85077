//! Loading simulation inputs from disk.
//!
//! The core crate only parses; reading files happens here so that the
//! tick path never touches the filesystem.

use std::path::Path;

use gridwar_core::config::SimulationConfig;
use gridwar_core::data::UnitCatalog;
use gridwar_core::map::MapInfo;
use gridwar_core::simulation::Simulation;

use crate::error::{Result, ServerError};
use crate::ServerConfig;

fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ServerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a RON simulation config.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_sim_config(path: &Path) -> Result<SimulationConfig> {
    let text = read_to_string(path)?;
    Ok(SimulationConfig::from_ron(&path.display().to_string(), &text)?)
}

/// Load a RON unit catalog.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_catalog(path: &Path) -> Result<UnitCatalog> {
    let text = read_to_string(path)?;
    Ok(UnitCatalog::from_ron(&path.display().to_string(), &text)?)
}

/// Load a bincode simulation snapshot.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn load_snapshot(path: &Path) -> Result<Simulation> {
    let bytes = std::fs::read(path).map_err(|source| ServerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Simulation::deserialize(&bytes)?)
}

/// Build the starting simulation described by `config`.
///
/// A snapshot, when given, supplies the world and map; config and catalog
/// files override whatever the snapshot carried.
///
/// # Errors
///
/// Returns an error if any referenced file cannot be loaded.
pub fn build_simulation(config: &ServerConfig) -> Result<Simulation> {
    let mut sim = match &config.snapshot {
        Some(path) => load_snapshot(path)?,
        None => Simulation::new(MapInfo::new(
            config.map_width.max(1),
            config.map_height.max(1),
        )),
    };
    if let Some(path) = &config.sim_config {
        sim = sim.with_config(load_sim_config(path)?);
    }
    if let Some(path) = &config.catalog {
        sim = sim.with_catalog(load_catalog(path)?);
    }
    Ok(sim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwar_core::error::GameError;

    fn temp_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_catalog(Path::new("/nonexistent/gridwar/units.ron"));
        assert!(matches!(result, Err(ServerError::Io { .. })));
    }

    #[test]
    fn test_bad_catalog_names_the_file() {
        let path = temp_file("gridwar_bad_units.ron", b"[ not ron");
        match load_catalog(&path) {
            Err(ServerError::Game(GameError::DataParseError { path: reported, .. })) => {
                assert!(reported.ends_with("gridwar_bad_units.ron"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_build_simulation_applies_overrides() {
        let config_path = temp_file(
            "gridwar_sim_config.ron",
            b"(identify_requires_ownership: true)",
        );
        let config = ServerConfig {
            map_width: 5,
            map_height: 4,
            sim_config: Some(config_path.clone()),
            ..ServerConfig::default()
        };

        let sim = build_simulation(&config).unwrap();
        assert_eq!((sim.map().width(), sim.map().height()), (5, 4));
        assert!(sim.config().identify_requires_ownership);

        let _ = std::fs::remove_file(config_path);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut original = Simulation::new(MapInfo::new(3, 3));
        original.tick(&[]);
        let path = temp_file("gridwar_snapshot.bin", &original.serialize().unwrap());

        let config = ServerConfig {
            snapshot: Some(path.clone()),
            ..ServerConfig::default()
        };
        let sim = build_simulation(&config).unwrap();
        assert_eq!(sim.state_hash(), original.state_hash());

        let _ = std::fs::remove_file(path);
    }
}
