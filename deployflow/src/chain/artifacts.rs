//! Compiled contract artifacts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::errors::ChainError;

/// ABI and creation bytecode of a compiled contract.
///
/// Deserializes from hardhat-style artifact files; unknown fields are
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    /// The contract name.
    pub contract_name: String,
    /// The JSON ABI.
    #[serde(default)]
    pub abi: Value,
    /// Hex-encoded creation bytecode, `0x` prefixed.
    pub bytecode: String,
}

impl ContractArtifact {
    /// Returns the constructor parameter types, in order.
    ///
    /// A contract without an explicit constructor takes no arguments.
    #[must_use]
    pub fn constructor_inputs(&self) -> Vec<String> {
        self.abi
            .as_array()
            .into_iter()
            .flatten()
            .find(|item| item.get("type").and_then(Value::as_str) == Some("constructor"))
            .and_then(|ctor| ctor.get("inputs"))
            .and_then(Value::as_array)
            .map(|inputs| {
                inputs
                    .iter()
                    .filter_map(|input| input.get("type").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns true if there is code to deploy.
    #[must_use]
    pub fn is_deployable(&self) -> bool {
        let code = self.bytecode.trim_start_matches("0x");
        !code.is_empty()
    }
}

/// Loads compiled artifacts by contract name.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Loads the artifact for `contract`.
    async fn load(&self, contract: &str) -> Result<ContractArtifact, ChainError>;
}

/// Reads artifacts from a build output directory.
///
/// Looks for `<Contract>.json`, `<Contract>.sol/<Contract>.json` and
/// `contracts/<Contract>.sol/<Contract>.json`, in that order.
#[derive(Debug, Clone)]
pub struct ArtifactDirectory {
    dir: PathBuf,
}

impl ArtifactDirectory {
    /// Creates a source over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn candidates(&self, contract: &str) -> [PathBuf; 3] {
        let file = format!("{contract}.json");
        let source = format!("{contract}.sol");
        [
            self.dir.join(&file),
            self.dir.join(&source).join(&file),
            self.dir.join("contracts").join(&source).join(&file),
        ]
    }
}

#[async_trait]
impl ArtifactSource for ArtifactDirectory {
    async fn load(&self, contract: &str) -> Result<ContractArtifact, ChainError> {
        let unavailable = |reason: String| ChainError::Artifact {
            contract: contract.to_string(),
            reason,
        };

        for path in self.candidates(contract) {
            let content = match fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(unavailable(format!("{}: {e}", path.display()))),
            };

            let artifact: ContractArtifact = serde_json::from_str(&content)
                .map_err(|e| unavailable(format!("{}: {e}", path.display())))?;
            if !artifact.is_deployable() {
                return Err(unavailable(format!(
                    "{} has no bytecode (abstract contract or interface?)",
                    path.display()
                )));
            }

            debug!(contract = %contract, path = %path.display(), "Loaded artifact");
            return Ok(artifact);
        }

        Err(unavailable(format!("not found under {}", self.dir.display())))
    }
}
