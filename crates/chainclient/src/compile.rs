//! Solidity compilation through a local `solc` binary.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::error::ClientError;
use crate::types::CompileResult;

/// Node-side compiler method.
pub const REMOTE_COMPILE_METHOD: &str = "contract_compileContract";

#[derive(Debug, Deserialize)]
struct CombinedJson {
    contracts: BTreeMap<String, CombinedContract>,
}

#[derive(Debug, Deserialize)]
struct CombinedContract {
    /// A JSON string on old compilers, an array on newer ones.
    abi: Value,
    #[serde(default)]
    bin: String,
}

/// Run `solc --combined-json abi,bin` over a comma-separated list of source
/// files.
pub async fn compile_local(solc: &Path, sources: &str) -> Result<CompileResult, ClientError> {
    let paths: Vec<&str> = sources
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if paths.is_empty() {
        return Err(ClientError::Compile("no source files given".into()));
    }

    tracing::debug!(solc = %solc.display(), files = ?paths, "compiling");
    let output = Command::new(solc)
        .arg("--combined-json")
        .arg("abi,bin")
        .args(&paths)
        .output()
        .await
        .map_err(|e| ClientError::Compile(format!("run {}: {e}", solc.display())))?;

    if !output.status.success() {
        return Err(ClientError::Compile(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    parse_combined_json(&output.stdout)
}

/// Contracts are ordered by their `path:Name` key.
pub fn parse_combined_json(raw: &[u8]) -> Result<CompileResult, ClientError> {
    let parsed: CombinedJson = serde_json::from_slice(raw)
        .map_err(|e| ClientError::Compile(format!("unreadable compiler output: {e}")))?;

    let mut result = CompileResult::default();
    for (name, contract) in parsed.contracts {
        let abi = match contract.abi {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let bin = if contract.bin.is_empty() || contract.bin.starts_with("0x") {
            contract.bin
        } else {
            format!("0x{}", contract.bin)
        };
        result.abi.push(abi);
        result.bin.push(bin);
        result.names.push(name);
    }
    Ok(result)
}

/// `contracts/Token.sol:Token` → `Token`.
pub fn contract_name(qualified: &str) -> &str {
    let tail = qualified.rsplit(':').next().unwrap_or(qualified);
    let file = tail.rsplit('/').next().unwrap_or(tail);
    file.strip_suffix(".sol").unwrap_or(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_json_both_abi_shapes() {
        let raw = br#"{
            "contracts": {
                "b.sol:Beta": {"abi": "[]", "bin": "6080"},
                "a.sol:Alpha": {"abi": [{"type":"function","name":"x","inputs":[],"outputs":[],"stateMutability":"view"}], "bin": ""}
            },
            "version": "0.8.20"
        }"#;
        let result = parse_combined_json(raw).unwrap();
        assert_eq!(result.names, vec!["a.sol:Alpha", "b.sol:Beta"]);
        assert!(result.abi[0].contains("\"name\":\"x\""));
        assert_eq!(result.abi[1], "[]");
        assert_eq!(result.bin, vec!["".to_string(), "0x6080".to_string()]);
    }

    #[test]
    fn garbage_output_is_compile_error() {
        assert!(matches!(
            parse_combined_json(b"Error: no such file"),
            Err(ClientError::Compile(_))
        ));
    }

    #[test]
    fn names() {
        assert_eq!(contract_name("contracts/Token.sol:Token"), "Token");
        assert_eq!(contract_name("Token"), "Token");
        assert_eq!(contract_name("dir/Token.sol"), "Token");
    }

    #[tokio::test]
    async fn missing_compiler() {
        let err = compile_local(Path::new("/nonexistent/solc"), "a.sol").await.unwrap_err();
        assert!(matches!(err, ClientError::Compile(_)));
        let err = compile_local(Path::new("solc"), " , ").await.unwrap_err();
        assert!(matches!(err, ClientError::Compile(_)));
    }
}
