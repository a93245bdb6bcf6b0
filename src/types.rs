use std::fmt;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Element type of a storage buffer or scalar variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarKind {
    F32,
    I32,
    U32,
}

impl ScalarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarKind::F32 => "f32",
            ScalarKind::I32 => "i32",
            ScalarKind::U32 => "u32",
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "f32" => Ok(ScalarKind::F32),
            "i32" => Ok(ScalarKind::I32),
            "u32" => Ok(ScalarKind::U32),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A variable's type as the translator tracks it.
///
/// Array lengths come from the comma-count heuristic applied to the textual
/// form of a literal or argument, not from any runtime length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WgslType {
    Scalar(ScalarKind),
    Array { elem: ScalarKind, len: u32 },
}

impl WgslType {
    pub const F32: WgslType = WgslType::Scalar(ScalarKind::F32);
    pub const I32: WgslType = WgslType::Scalar(ScalarKind::I32);
    pub const U32: WgslType = WgslType::Scalar(ScalarKind::U32);

    /// Parse the textual form used across the correction boundary:
    /// `f32`, `i32`, `u32`, or `array<elem,len>`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Ok(kind) = ScalarKind::parse(text) {
            return Ok(WgslType::Scalar(kind));
        }
        if let Some(inner) = text
            .strip_prefix("array<")
            .and_then(|t| t.strip_suffix('>'))
        {
            if let Some((elem, len)) = inner.split_once(',') {
                let elem = ScalarKind::parse(elem.trim())?;
                let len = len
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| Error::UnsupportedType(text.to_string()))?;
                return Ok(WgslType::Array { elem, len });
            }
        }
        Err(Error::UnsupportedType(text.to_string()))
    }
}

impl fmt::Display for WgslType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WgslType::Scalar(kind) => write!(f, "{kind}"),
            WgslType::Array { elem, len } => write!(f, "array<{elem},{len}>"),
        }
    }
}

// Serialized as the display string: the correction UI speaks WGSL type text.
impl Serialize for WgslType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Name → type map for one function, in declaration order. Iteration order
/// is part of the contract: parameters are recorded before any body line
/// is generated, locals as their declarations are first sighted.
pub type TypeTable = IndexMap<String, WgslType>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(WgslType::parse("f32").unwrap(), WgslType::F32);
        assert_eq!(WgslType::parse("i32").unwrap(), WgslType::I32);
        assert_eq!(WgslType::parse(" u32 ").unwrap(), WgslType::U32);
    }

    #[test]
    fn test_parse_array() {
        assert_eq!(
            WgslType::parse("array<f32,3>").unwrap(),
            WgslType::Array {
                elem: ScalarKind::F32,
                len: 3
            }
        );
        assert_eq!(
            WgslType::parse("array<i32, 2>").unwrap(),
            WgslType::Array {
                elem: ScalarKind::I32,
                len: 2
            }
        );
    }

    #[test]
    fn test_parse_rejects_unsupported() {
        assert!(matches!(
            WgslType::parse("f64"),
            Err(Error::UnsupportedType(_))
        ));
        assert!(matches!(
            WgslType::parse("array<f32>"),
            Err(Error::UnsupportedType(_))
        ));
        assert!(matches!(
            WgslType::parse("vec3<f32>"),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["f32", "i32", "u32", "array<f32,4>", "array<u32,1>"] {
            assert_eq!(WgslType::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_table_serializes_in_insertion_order() {
        let mut table = TypeTable::new();
        table.insert("b".to_string(), WgslType::F32);
        table.insert("a".to_string(), WgslType::I32);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"b":"f32","a":"i32"}"#);
    }
}
