//! Topology selection and TOML loading.

use raymond_types::{NodeId, TopologySpec};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors while loading or writing a topology description.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid topology file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to encode topology: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Where the tree comes from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TopologySource {
    /// The built-in 5-node tree.
    #[default]
    Fixture,

    /// A TOML file in `TopologySpec` format.
    File(PathBuf),

    /// Heap-layout tree with ids `1..=n`.
    CompleteBinary(u32),

    /// Left-leaning chain with ids `1..=n`.
    Chain(u32),
}

impl TopologySource {
    /// Produce the described spec.
    pub fn load(&self) -> Result<TopologySpec, ConfigError> {
        match self {
            TopologySource::Fixture => Ok(TopologySpec::default_fixture()),
            TopologySource::File(path) => load_topology(path),
            TopologySource::CompleteBinary(n) => Ok(TopologySpec::complete_binary(*n)),
            TopologySource::Chain(n) => Ok(TopologySpec::chain(*n)),
        }
    }

    /// Produce the described spec, optionally moving the initial token.
    pub fn load_with_holder(&self, holder: Option<u32>) -> Result<TopologySpec, ConfigError> {
        let spec = self.load()?;
        Ok(match holder {
            Some(id) => spec.with_initial_holder(NodeId(id)),
            None => spec,
        })
    }
}

/// Read a topology from a TOML file.
pub fn load_topology(path: &Path) -> Result<TopologySpec, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_topology(&text)
}

/// Parse a topology from TOML text.
pub fn parse_topology(text: &str) -> Result<TopologySpec, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Render a topology as TOML, suitable for [`load_topology`].
pub fn topology_to_toml(spec: &TopologySpec) -> Result<String, ConfigError> {
    Ok(toml::to_string(spec)?)
}
