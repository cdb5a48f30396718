//! Land-cover classification codes.
//!
//! The codes mirror the fixed enumeration of the land-cover raster the
//! vegetation filter samples. The set is closed; unknown codes in a plan
//! are validation errors.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandCover {
    TreeCover,
    Shrubland,
    Grassland,
    Cropland,
    BuiltUp,
    BareSparse,
    SnowIce,
    Water,
    Wetland,
    Tundra,
    PermanentWater,
}

impl LandCover {
    pub const ALL: [LandCover; 11] = [
        LandCover::TreeCover,
        LandCover::Shrubland,
        LandCover::Grassland,
        LandCover::Cropland,
        LandCover::BuiltUp,
        LandCover::BareSparse,
        LandCover::SnowIce,
        LandCover::Water,
        LandCover::Wetland,
        LandCover::Tundra,
        LandCover::PermanentWater,
    ];

    /// The raster cell code for this class.
    pub fn code(self) -> u8 {
        match self {
            LandCover::TreeCover => 10,
            LandCover::Shrubland => 20,
            LandCover::Grassland => 30,
            LandCover::Cropland => 40,
            LandCover::BuiltUp => 50,
            LandCover::BareSparse => 60,
            LandCover::SnowIce => 70,
            LandCover::Water => 80,
            LandCover::Wetland => 90,
            LandCover::Tundra => 95,
            LandCover::PermanentWater => 100,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        LandCover::ALL.iter().copied().find(|c| c.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            LandCover::TreeCover => "tree_cover",
            LandCover::Shrubland => "shrubland",
            LandCover::Grassland => "grassland",
            LandCover::Cropland => "cropland",
            LandCover::BuiltUp => "built_up",
            LandCover::BareSparse => "bare_sparse",
            LandCover::SnowIce => "snow_ice",
            LandCover::Water => "water",
            LandCover::Wetland => "wetland",
            LandCover::Tundra => "tundra",
            LandCover::PermanentWater => "permanent_water",
        }
    }
}
