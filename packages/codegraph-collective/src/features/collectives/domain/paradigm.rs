//! Parallel programming paradigms understood by the detector

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Paradigm {
    /// Message passing; participants are ranks
    Mpi,
    /// Shared-memory threads
    #[serde(rename = "openmp")]
    OpenMp,
    /// Unified Parallel C threads
    Upc,
    /// GPU threads of a block
    Cuda,
}

impl Paradigm {
    pub const ALL: [Paradigm; 4] = [Paradigm::Mpi, Paradigm::OpenMp, Paradigm::Upc, Paradigm::Cuda];

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "mpi" => Ok(Self::Mpi),
            "openmp" | "omp" => Ok(Self::OpenMp),
            "upc" => Ok(Self::Upc),
            "cuda" => Ok(Self::Cuda),
            _ => Err(format!(
                "Unknown paradigm '{}'. Valid paradigms: mpi, openmp, upc, cuda",
                s
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mpi => "mpi",
            Self::OpenMp => "openmp",
            Self::Upc => "upc",
            Self::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Paradigm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paradigm_parsing() {
        assert_eq!(Paradigm::from_str("MPI").unwrap(), Paradigm::Mpi);
        assert_eq!(Paradigm::from_str("omp").unwrap(), Paradigm::OpenMp);
        assert!(Paradigm::from_str("pthreads").is_err());
    }

    #[test]
    fn test_paradigm_serde_names_match_display() {
        for p in Paradigm::ALL {
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{}\"", p));
        }
    }
}
