//! Identifiers, types and debug locations shared by the IR model

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn new(index: usize) -> Self {
                Self(index as u32)
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Index of a value in the module value table
    ValueId,
    "%"
);
id_type!(
    /// Index of a function in the module function table
    FuncId,
    "@f"
);
id_type!(
    /// Index of a basic block inside its function
    BlockId,
    "bb"
);

/// First-class value types. Only pointer-ness matters to the analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Void,
    Int,
    Float,
    Ptr,
    Aggregate,
}

impl Type {
    #[inline]
    pub fn is_pointer(self) -> bool {
        matches!(self, Type::Ptr)
    }

    #[inline]
    pub fn is_void(self) -> bool {
        matches!(self, Type::Void)
    }
}

/// Source position attached to a value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DebugLoc {
    pub file: String,
    pub line: u32,
}

impl DebugLoc {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for DebugLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.line, self.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(ValueId(7).to_string(), "%7");
        assert_eq!(BlockId(2).to_string(), "bb2");
        assert_eq!(FuncId::new(3).index(), 3);
    }

    #[test]
    fn test_debug_loc_display() {
        let loc = DebugLoc::new("ring.c", 12);
        assert_eq!(loc.to_string(), "12 (ring.c)");
    }

    #[test]
    fn test_type_serde() {
        let json = serde_json::to_string(&Type::Ptr).unwrap();
        assert_eq!(json, "\"ptr\"");
        assert!(serde_json::from_str::<Type>("\"ptr\"").unwrap().is_pointer());
    }
}
