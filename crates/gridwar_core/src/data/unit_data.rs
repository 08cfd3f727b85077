//! Unit type catalog.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Data-driven unit type definition.
///
/// # Example RON
///
/// ```ron
/// UnitTypeData(
///     id: "worker",
///     name: "Worker",
///     cost: 100,
///     create_time: 5,
///     tags: ["harvester"],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitTypeData {
    /// Type tag used by CREATE commands.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Resource cost to build.
    pub cost: u32,

    /// Build duration in ticks.
    pub create_time: u32,

    /// Tags for categorization (e.g., "harvester", "combat").
    #[serde(default)]
    pub tags: Vec<String>,
}

impl UnitTypeData {
    fn builtin(id: &str, name: &str, cost: u32, create_time: u32, tags: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            cost,
            create_time,
            tags: tags.iter().map(ToString::to_string).collect(),
        }
    }

    /// Check if this unit type has the specified tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Unit types a CREATE command may name, keyed by tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitCatalog {
    types: BTreeMap<String, UnitTypeData>,
}

impl Default for UnitCatalog {
    fn default() -> Self {
        Self::from_types(vec![
            UnitTypeData::builtin("worker", "Worker", 100, 5, &["harvester"]),
            UnitTypeData::builtin("scout", "Scout", 130, 10, &["combat"]),
            UnitTypeData::builtin("tank", "Tank", 150, 15, &["combat"]),
        ])
    }
}

impl UnitCatalog {
    /// Build a catalog from a list of types. Later duplicates win.
    #[must_use]
    pub fn from_types(types: Vec<UnitTypeData>) -> Self {
        Self {
            types: types.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    /// Parse a RON list of [`UnitTypeData`].
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] if the text is malformed or
    /// names the same type twice.
    pub fn from_ron(source: &str, text: &str) -> Result<Self> {
        let types: Vec<UnitTypeData> = ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: source.to_string(),
            message: e.to_string(),
        })?;

        let mut catalog = Self {
            types: BTreeMap::new(),
        };
        for unit_type in types {
            if catalog.types.contains_key(&unit_type.id) {
                return Err(GameError::DataParseError {
                    path: source.to_string(),
                    message: format!("duplicate unit type '{}'", unit_type.id),
                });
            }
            catalog.types.insert(unit_type.id.clone(), unit_type);
        }
        Ok(catalog)
    }

    /// Look up a unit type by tag.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&UnitTypeData> {
        self.types.get(id)
    }

    /// Check if a tag names a known unit type.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// Number of unit types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Unit types in tag order.
    pub fn iter(&self) -> impl Iterator<Item = &UnitTypeData> {
        self.types.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = UnitCatalog::default();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("worker").unwrap().create_time, 5);
        assert_eq!(catalog.get("tank").unwrap().create_time, 15);
        assert!(catalog.get("dragon").is_none());
    }

    #[test]
    fn test_has_tag() {
        let catalog = UnitCatalog::default();
        assert!(catalog.get("worker").unwrap().has_tag("harvester"));
        assert!(!catalog.get("scout").unwrap().has_tag("harvester"));
    }

    #[test]
    fn test_from_ron() {
        let catalog = UnitCatalog::from_ron(
            "units.ron",
            r#"[
                UnitTypeData(id: "archer", name: "Archer", cost: 80, create_time: 7),
                UnitTypeData(id: "knight", name: "Knight", cost: 200, create_time: 20, tags: ["combat"]),
            ]"#,
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("archer"));
        assert!(catalog.get("archer").unwrap().tags.is_empty());
        let ids: Vec<_> = catalog.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["archer", "knight"]);
    }

    #[test]
    fn test_from_ron_rejects_duplicates() {
        let result = UnitCatalog::from_ron(
            "units.ron",
            r#"[
                UnitTypeData(id: "archer", name: "A", cost: 1, create_time: 1),
                UnitTypeData(id: "archer", name: "B", cost: 2, create_time: 2),
            ]"#,
        );
        assert!(matches!(result, Err(GameError::DataParseError { .. })));
    }
}
