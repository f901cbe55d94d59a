//! Typed generation parameters.
//!
//! A [`ParameterRecord`] has a closed set of optional fields. Unknown keys are
//! rejected when a record is parsed, and absent, `false` and empty values are
//! all treated as "not set" so that they fingerprint identically.

use std::collections::BTreeSet;

use fontasset_common::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::hasher::{fingerprint, ParamValue};

/// Distance-field algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceField {
    /// Parabola envelope transform.
    Parabola,
    /// Dead-reckoning transform.
    DeadRec,
}

impl DistanceField {
    /// Returns the generator's name for this algorithm.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parabola => "parabola",
            Self::DeadRec => "deadrec",
        }
    }
}

/// Rectangle packing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Packing {
    /// Shelf packing.
    Shelf,
    /// Max-rects packing.
    MaxRects,
}

impl Packing {
    /// Returns the generator's name for this strategy.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shelf => "shelf",
            Self::MaxRects => "maxrects",
        }
    }
}

/// Downsampling filter applied after distance-field computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Downsampling {
    /// Center sample.
    Center,
    /// Box average.
    Average,
    /// Minimum of the block.
    Min,
    /// Maximum of the block.
    Max,
}

impl Downsampling {
    /// Returns the generator's name for this filter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::Average => "average",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// Options for one atlas generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterRecord {
    /// Explicit glyphs to include.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glyph: Option<String>,

    /// Include the printable ASCII range.
    #[serde(default, skip_serializing_if = "is_false")]
    pub ascii: bool,

    /// Explicit code points to include.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub charcode: BTreeSet<u32>,

    /// Rasterization size in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fontsize: Option<u32>,

    /// Distance-field algorithm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distfield: Option<DistanceField>,

    /// Packing strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packing: Option<Packing>,

    /// Padding around each glyph in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<u32>,

    /// Downsampling filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downsampling: Option<Downsampling>,

    /// Downsampling factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsfactor: Option<u32>,

    /// Distance range mapped onto the output value range, as `[min, max]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dynamicrange: Vec<i32>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ParameterRecord {
    /// Parses and validates a record from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        let record: Self =
            serde_json::from_str(json).map_err(|e| CacheError::InvalidParameters {
                reason: e.to_string(),
            })?;
        record.validate()?;
        Ok(record)
    }

    /// Checks value ranges that the type system does not express.
    pub fn validate(&self) -> Result<(), CacheError> {
        let invalid = |reason: &str| -> Result<(), CacheError> {
            Err(CacheError::InvalidParameters {
                reason: reason.to_string(),
            })
        };
        if self.fontsize == Some(0) {
            return invalid("fontsize must be greater than zero");
        }
        if self.dsfactor == Some(0) {
            return invalid("dsfactor must be greater than zero");
        }
        if self.dynamicrange.len() > 2 {
            return invalid("dynamicrange takes at most two bounds");
        }
        Ok(())
    }

    /// Returns the normalized value tree used for fingerprinting.
    ///
    /// Unset fields are left out of the mapping entirely.
    pub fn to_param_value(&self) -> ParamValue {
        let mut entries: Vec<(String, ParamValue)> = Vec::new();
        let mut put = |key: &str, value: ParamValue| entries.push((key.to_string(), value));

        if let Some(glyph) = self.glyph.as_deref().filter(|g| !g.is_empty()) {
            put("glyph", ParamValue::Str(glyph.to_string()));
        }
        if self.ascii {
            put("ascii", ParamValue::Bool(true));
        }
        if !self.charcode.is_empty() {
            let codes = self
                .charcode
                .iter()
                .map(|&c| ParamValue::Int(i64::from(c)))
                .collect();
            put("charcode", ParamValue::Set(codes));
        }
        if let Some(size) = self.fontsize {
            put("fontsize", ParamValue::Int(i64::from(size)));
        }
        if let Some(df) = self.distfield {
            put("distfield", ParamValue::Str(df.as_str().to_string()));
        }
        if let Some(packing) = self.packing {
            put("packing", ParamValue::Str(packing.as_str().to_string()));
        }
        if let Some(padding) = self.padding {
            put("padding", ParamValue::Int(i64::from(padding)));
        }
        if let Some(ds) = self.downsampling {
            put("downsampling", ParamValue::Str(ds.as_str().to_string()));
        }
        if let Some(factor) = self.dsfactor {
            put("dsfactor", ParamValue::Int(i64::from(factor)));
        }
        if !self.dynamicrange.is_empty() {
            let bounds = self
                .dynamicrange
                .iter()
                .map(|&b| ParamValue::Int(i64::from(b)))
                .collect();
            put("dynamicrange", ParamValue::List(bounds));
        }

        ParamValue::Map(entries)
    }

    /// Computes this record's fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.to_param_value())
    }
}
