//! Position-sector tables for the relative-position filter.
//!
//! A sector table is an explicit ordered list of named angular sectors.
//! Classification walks the table in order and returns the first sector
//! containing the angle, so overlapping sectors resolve deterministically.
//! The standard table is a constant; callers override it per invocation
//! rather than mutating shared state.

use crate::error::{GeoplanError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One closed angular range of offsets from the reference direction,
/// in degrees within [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngularRange {
    pub min_offset: f64,
    pub max_offset: f64,
}

impl AngularRange {
    pub fn new(min_offset: f64, max_offset: f64) -> Self {
        Self {
            min_offset,
            max_offset,
        }
    }

    /// Both ends inclusive.
    pub fn contains(&self, angle: f64) -> bool {
        self.min_offset <= angle && angle <= self.max_offset
    }
}

/// An ordered table of named sectors.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorTable {
    sectors: Vec<(String, Vec<AngularRange>)>,
}

impl SectorTable {
    pub fn new(sectors: Vec<(String, Vec<AngularRange>)>) -> Self {
        Self { sectors }
    }

    /// The standard sector table. Narrow sectors precede the broad ones
    /// they overlap, so e.g. an angle of 10 classifies as `most_forward`,
    /// not `forward`.
    pub fn standard() -> Self {
        Self::new(vec![
            (
                "most_forward".to_string(),
                vec![AngularRange::new(-20.0, 20.0)],
            ),
            ("forward".to_string(), vec![AngularRange::new(-45.0, 45.0)]),
            (
                "near_flanks".to_string(),
                vec![
                    AngularRange::new(-75.0, -45.0),
                    AngularRange::new(45.0, 75.0),
                ],
            ),
            (
                "flanks".to_string(),
                vec![
                    AngularRange::new(-135.0, -45.0),
                    AngularRange::new(45.0, 135.0),
                ],
            ),
            (
                "slightly_behind".to_string(),
                vec![
                    AngularRange::new(-180.0, -120.0),
                    AngularRange::new(120.0, 180.0),
                ],
            ),
            (
                "rear".to_string(),
                vec![
                    AngularRange::new(-180.0, -135.0),
                    AngularRange::new(135.0, 180.0),
                ],
            ),
        ])
    }

    /// Parse a caller-supplied table from the `custom_position_config`
    /// parameter: a JSON object mapping sector names to range arrays.
    /// Object key order is not preserved, so entries match in name order;
    /// custom tables are expected to use disjoint sectors.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            GeoplanError::validation("custom_position_config must be an object of sector ranges")
        })?;
        if map.is_empty() {
            return Err(GeoplanError::validation(
                "custom_position_config must define at least one sector",
            ));
        }

        let mut sectors = Vec::with_capacity(map.len());
        for (name, ranges_value) in map {
            let ranges: Vec<AngularRange> =
                serde_json::from_value(ranges_value.clone()).map_err(|e| {
                    GeoplanError::validation(format!(
                        "sector '{}' ranges are malformed: {}",
                        name, e
                    ))
                })?;
            if ranges.is_empty() {
                return Err(GeoplanError::validation(format!(
                    "sector '{}' must define at least one range",
                    name
                )));
            }
            for range in &ranges {
                if range.min_offset > range.max_offset {
                    return Err(GeoplanError::validation(format!(
                        "sector '{}' has an inverted range [{}, {}]",
                        name, range.min_offset, range.max_offset
                    )));
                }
            }
            sectors.push((name.clone(), ranges));
        }
        Ok(Self::new(sectors))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.sectors.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sectors.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// First sector in table order whose ranges contain the angle.
    pub fn classify(&self, angle_diff: f64) -> Option<&str> {
        self.sectors
            .iter()
            .find(|(_, ranges)| ranges.iter().any(|r| r.contains(angle_diff)))
            .map(|(name, _)| name.as_str())
    }

    /// The table restricted to the named sectors, preserving table order.
    /// Callers must have checked the names against `contains_name` first;
    /// unknown names are simply absent from the result.
    pub fn restrict(&self, names: &[String]) -> SectorTable {
        SectorTable::new(
            self.sectors
                .iter()
                .filter(|(n, _)| names.iter().any(|wanted| wanted == n))
                .cloned()
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_boundary_angle_classifies_into_exactly_one_sector() {
        let table = SectorTable::standard();
        // 45 is on the forward/near_flanks/flanks boundary; first match wins.
        assert_eq!(table.classify(45.0), Some("forward"));
        assert_eq!(table.classify(-45.0), Some("forward"));
        assert_eq!(table.classify(20.0), Some("most_forward"));
        assert_eq!(table.classify(75.0), Some("near_flanks"));
        assert_eq!(table.classify(135.0), Some("flanks"));
        assert_eq!(table.classify(180.0), Some("slightly_behind"));
    }

    #[test]
    fn test_sector_ordering() {
        let table = SectorTable::standard();
        assert_eq!(table.classify(0.0), Some("most_forward"));
        assert_eq!(table.classify(30.0), Some("forward"));
        assert_eq!(table.classify(-60.0), Some("near_flanks"));
        assert_eq!(table.classify(100.0), Some("flanks"));
        assert_eq!(table.classify(-150.0), Some("slightly_behind"));
        assert_eq!(table.classify(170.0), Some("slightly_behind"));
    }

    #[test]
    fn test_restrict_preserves_table_order() {
        let table = SectorTable::standard();
        let restricted =
            table.restrict(&["rear".to_string(), "flanks".to_string()]);
        assert_eq!(restricted.names(), vec!["flanks", "rear"]);
        // With the broad early sectors removed, rear becomes matchable.
        assert_eq!(restricted.classify(170.0), Some("rear"));
        assert_eq!(restricted.classify(50.0), Some("flanks"));
        assert_eq!(restricted.classify(0.0), None);
    }

    #[test]
    fn test_custom_table_from_value() {
        let table = SectorTable::from_value(&json!({
            "ahead": [{"min_offset": -30.0, "max_offset": 30.0}],
            "behind": [
                {"min_offset": -180.0, "max_offset": -150.0},
                {"min_offset": 150.0, "max_offset": 180.0}
            ]
        }))
        .unwrap();

        assert!(table.contains_name("ahead"));
        assert!(table.contains_name("behind"));
        assert_eq!(table.classify(160.0), Some("behind"));
        assert_eq!(table.classify(90.0), None);
    }

    #[test]
    fn test_custom_table_rejects_inverted_range() {
        let err = SectorTable::from_value(&json!({
            "bad": [{"min_offset": 30.0, "max_offset": -30.0}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("inverted"));
    }

    #[test]
    fn test_custom_table_rejects_non_object() {
        assert!(SectorTable::from_value(&json!([1, 2, 3])).is_err());
        assert!(SectorTable::from_value(&json!({})).is_err());
    }

    proptest! {
        /// The standard table has no gaps: every angle difference in
        /// [-180, 180] lands in some sector.
        #[test]
        fn prop_standard_table_covers_every_angle(angle in -180.0f64..=180.0) {
            let table = SectorTable::standard();
            prop_assert!(table.classify(angle).is_some());
        }
    }
}
