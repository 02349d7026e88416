//! The transformation manifest: ordered layers of named SQL units.
//!
//! On disk a manifest is JSON naming one SQL file per unit, paths
//! relative to the manifest file. The built-in manifest is the
//! `models/` directory embedded at compile time.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const MANIFEST_VERSION: u32 = 1;

const BUILTIN_MANIFEST: &str = include_str!("../../../models/manifest.json");

/// Every SQL file the built-in manifest may reference.
const BUILTIN_SQL: &[(&str, &str)] = &[
    ("staging/stg_customers.sql", include_str!("../../../models/staging/stg_customers.sql")),
    ("staging/stg_products.sql", include_str!("../../../models/staging/stg_products.sql")),
    ("staging/stg_orders.sql", include_str!("../../../models/staging/stg_orders.sql")),
    ("staging/stg_order_items.sql", include_str!("../../../models/staging/stg_order_items.sql")),
    ("staging/stg_events.sql", include_str!("../../../models/staging/stg_events.sql")),
    ("staging/stg_ab_assignments.sql", include_str!("../../../models/staging/stg_ab_assignments.sql")),
    ("marts/dim_customers.sql", include_str!("../../../models/marts/dim_customers.sql")),
    ("marts/dim_products.sql", include_str!("../../../models/marts/dim_products.sql")),
    ("marts/fact_orders.sql", include_str!("../../../models/marts/fact_orders.sql")),
    ("marts/fact_sessions.sql", include_str!("../../../models/marts/fact_sessions.sql")),
    ("analytics/analytics_attribution.sql", include_str!("../../../models/analytics/analytics_attribution.sql")),
    ("analytics/analytics_funnel.sql", include_str!("../../../models/analytics/analytics_funnel.sql")),
    ("analytics/analytics_cohort_retention.sql", include_str!("../../../models/analytics/analytics_cohort_retention.sql")),
    ("analytics/analytics_rfm.sql", include_str!("../../../models/analytics/analytics_rfm.sql")),
    ("analytics/analytics_customer_ltv.sql", include_str!("../../../models/analytics/analytics_customer_ltv.sql")),
    ("analytics/analytics_revenue_trends.sql", include_str!("../../../models/analytics/analytics_revenue_trends.sql")),
    ("analytics/analytics_channel_device.sql", include_str!("../../../models/analytics/analytics_channel_device.sql")),
    ("analytics/analytics_ab_results.sql", include_str!("../../../models/analytics/analytics_ab_results.sql")),
];

/// One transformation: fully replaces the derived table it is named after.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub name: String,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub version: u32,
    pub layers: Vec<Layer>,
}

// ── On-disk shape ───────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    version: u32,
    layers: Vec<LayerFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerFile {
    name: String,
    units: Vec<UnitFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UnitFile {
    name: String,
    sql: String,
}

impl Unit {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self { name: name.into(), sql: sql.into() }
    }
}

impl Layer {
    pub fn new(name: impl Into<String>, units: Vec<Unit>) -> Self {
        Self { name: name.into(), units }
    }
}

impl Manifest {
    /// Build a manifest in memory. Validated like a loaded one.
    pub fn new(layers: Vec<Layer>) -> SimResult<Self> {
        let manifest = Self { version: MANIFEST_VERSION, layers };
        manifest.validate()?;
        Ok(manifest)
    }

    /// The staging → marts → analytics pipeline shipped with the crate.
    pub fn builtin() -> SimResult<Self> {
        Self::from_json(BUILTIN_MANIFEST, |path| {
            BUILTIN_SQL
                .iter()
                .find(|(p, _)| *p == path)
                .map(|(_, sql)| (*sql).to_string())
                .ok_or_else(|| SimError::InvalidArgument(format!("built-in manifest names unknown file {path}")))
        })
    }

    /// Read a manifest JSON file and the SQL files it names.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SimError::InvalidArgument(format!("cannot read manifest {}: {e}", path.display())))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&content, |sql_path| {
            let full = base.join(sql_path);
            std::fs::read_to_string(&full)
                .map_err(|e| SimError::InvalidArgument(format!("cannot read unit SQL {}: {e}", full.display())))
        })
    }

    fn from_json(content: &str, mut read_sql: impl FnMut(&str) -> SimResult<String>) -> SimResult<Self> {
        let file: ManifestFile = serde_json::from_str(content)
            .map_err(|e| SimError::InvalidArgument(format!("malformed manifest: {e}")))?;
        let mut layers = Vec::with_capacity(file.layers.len());
        for layer in file.layers {
            let mut units = Vec::with_capacity(layer.units.len());
            for unit in layer.units {
                units.push(Unit { sql: read_sql(&unit.sql)?, name: unit.name });
            }
            layers.push(Layer { name: layer.name, units });
        }
        let manifest = Self { version: file.version, layers };
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> SimResult<()> {
        let invalid = |msg: String| Err(SimError::InvalidArgument(msg));
        if self.version != MANIFEST_VERSION {
            return invalid(format!(
                "manifest version {} is not supported (expected {MANIFEST_VERSION})",
                self.version
            ));
        }
        if self.layers.is_empty() {
            return invalid("manifest has no layers".into());
        }
        let mut layer_names = HashSet::new();
        let mut unit_names = HashSet::new();
        for layer in &self.layers {
            if layer.name.trim().is_empty() {
                return invalid("layer with an empty name".into());
            }
            if !layer_names.insert(layer.name.as_str()) {
                return invalid(format!("layer '{}' declared twice", layer.name));
            }
            for unit in &layer.units {
                if unit.name.trim().is_empty() {
                    return invalid(format!("unit with an empty name in layer '{}'", layer.name));
                }
                if !unit_names.insert(unit.name.as_str()) {
                    return invalid(format!("unit '{}' declared twice", unit.name));
                }
                if unit.sql.trim().is_empty() {
                    return invalid(format!("unit '{}' has no SQL", unit.name));
                }
            }
        }
        Ok(())
    }

    pub fn unit_count(&self) -> usize {
        self.layers.iter().map(|l| l.units.len()).sum()
    }

    /// Unit names in execution order.
    pub fn unit_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().flat_map(|l| l.units.iter().map(|u| u.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_three_layers_in_order() {
        let m = Manifest::builtin().unwrap();
        let names: Vec<_> = m.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["staging", "marts", "analytics"]);
        assert_eq!(m.unit_count(), 18);
        assert!(m.unit_names().any(|n| n == "analytics_ab_results"));
        for unit in m.layers.iter().flat_map(|l| &l.units) {
            assert!(unit.sql.contains(&format!("CREATE TABLE {}", unit.name)), "{}", unit.name);
        }
    }

    #[test]
    fn every_builtin_sql_file_is_referenced() {
        let m = Manifest::builtin().unwrap();
        assert_eq!(m.unit_count(), BUILTIN_SQL.len());
    }

    #[test]
    fn duplicate_units_are_rejected() {
        let err = Manifest::new(vec![
            Layer::new("staging", vec![Unit::new("stg_a", "SELECT 1;")]),
            Layer::new("marts", vec![Unit::new("stg_a", "SELECT 1;")]),
        ]);
        assert!(matches!(err, Err(SimError::InvalidArgument(_))));
    }

    #[test]
    fn wrong_version_and_garbage_are_rejected() {
        let v2 = r#"{"version": 2, "layers": [{"name": "a", "units": []}]}"#;
        assert!(Manifest::from_json(v2, |_| Ok(String::new())).is_err());
        assert!(Manifest::from_json("not json", |_| Ok(String::new())).is_err());
        assert!(Manifest::new(Vec::new()).is_err());
    }

    #[test]
    fn load_reads_sql_relative_to_manifest() {
        let dir = std::env::temp_dir().join(format!("shopsim-manifest-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("staging")).unwrap();
        std::fs::write(dir.join("staging/stg_one.sql"), "CREATE TABLE stg_one AS SELECT 1 AS v;").unwrap();
        std::fs::write(
            dir.join("manifest.json"),
            r#"{"version": 1, "layers": [{"name": "staging", "units": [{"name": "stg_one", "sql": "staging/stg_one.sql"}]}]}"#,
        )
        .unwrap();

        let m = Manifest::load(dir.join("manifest.json")).unwrap();
        assert_eq!(m.layers[0].units[0].sql, "CREATE TABLE stg_one AS SELECT 1 AS v;");

        std::fs::remove_file(dir.join("staging/stg_one.sql")).unwrap();
        assert!(matches!(
            Manifest::load(dir.join("manifest.json")),
            Err(SimError::InvalidArgument(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
