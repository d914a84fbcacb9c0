//! Solidity ABI encoding of constructor arguments.
//!
//! Types come from the artifact's constructor inputs and are parsed with
//! `alloy-dyn-abi`. Arguments are coerced from their configured form:
//! integers from `Int` or decimal/hex text, addresses and bytes from hex,
//! arrays from `[a, b]` text.

use alloy_dyn_abi::{DynSolType, DynSolValue};

use super::ContractArtifact;
use crate::core::ArgValue;
use crate::errors::ChainError;

/// Builds the creation payload: bytecode followed by the encoded arguments.
pub fn deploy_data(artifact: &ContractArtifact, args: &[ArgValue]) -> Result<String, ChainError> {
    let encoded = encode_constructor_args(&artifact.constructor_inputs(), args)?;
    let code = artifact.bytecode.trim_start_matches("0x");
    Ok(format!("0x{code}{}", hex::encode(encoded)))
}

/// Encodes `args` against the constructor parameter `types`.
pub fn encode_constructor_args(types: &[String], args: &[ArgValue]) -> Result<Vec<u8>, ChainError> {
    if types.len() != args.len() {
        return Err(encoding(format!(
            "constructor takes {} arguments, got {}",
            types.len(),
            args.len()
        )));
    }

    let values = types
        .iter()
        .zip(args)
        .map(|(ty, arg)| coerce(ty, arg))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

fn coerce(ty: &str, arg: &ArgValue) -> Result<DynSolValue, ChainError> {
    let sol_type = DynSolType::parse(ty)
        .map_err(|e| encoding(format!("unsupported constructor type '{ty}': {e}")))?;

    match (&sol_type, arg) {
        (DynSolType::String, ArgValue::Text(text)) => Ok(DynSolValue::String(text.clone())),
        (DynSolType::Bool, ArgValue::Bool(b)) => Ok(DynSolValue::Bool(*b)),
        (DynSolType::Bool, ArgValue::Int(_)) | (DynSolType::Uint(_) | DynSolType::Int(_), ArgValue::Bool(_)) => {
            Err(encoding(format!("'{ty}' cannot take {arg}")))
        }
        (_, ArgValue::Text(text)) => sol_type
            .coerce_str(text.trim())
            .map_err(|e| encoding(format!("'{ty}' value {arg}: {e}"))),
        (_, other) => sol_type
            .coerce_str(&other.to_string())
            .map_err(|e| encoding(format!("'{ty}' value {arg}: {e}"))),
    }
}

fn encoding(message: impl Into<String>) -> ChainError {
    ChainError::Encoding(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn types(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn encode_hex(tys: &[&str], args: &[ArgValue]) -> String {
        hex::encode(encode_constructor_args(&types(tys), args).unwrap())
    }

    fn word_hex(tail: &str) -> String {
        format!("{tail:0>64}")
    }

    #[test]
    fn test_static_types() {
        assert_eq!(encode_hex(&["uint256"], &[1_i64.into()]), word_hex("1"));
        assert_eq!(encode_hex(&["bool"], &[true.into()]), word_hex("1"));
        assert_eq!(
            encode_hex(&["address"], &["0xe84680C37f320c56d9F26E549155D33Bd412e7E3".into()]),
            word_hex("e84680c37f320c56d9f26e549155d33bd412e7e3")
        );
        assert_eq!(encode_hex(&["int256"], &[(-1_i64).into()]), "f".repeat(64));
        assert_eq!(
            encode_hex(&["bytes4"], &["0xdeadbeef".into()]),
            format!("deadbeef{}", "0".repeat(56))
        );
    }

    #[test]
    fn test_big_integers_from_text() {
        let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        assert_eq!(encode_hex(&["uint256"], &[max.into()]), "f".repeat(64));
        assert_eq!(encode_hex(&["uint"], &["0xff".into()]), word_hex("ff"));
        assert_eq!(
            encode_hex(&["uint256"], &["1000000000000000000".into()]),
            word_hex("de0b6b3a7640000")
        );

        let too_big = "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert!(encode_constructor_args(&types(&["uint256"]), &[too_big.into()]).is_err());
    }

    #[test]
    fn test_integer_bounds() {
        assert!(encode_constructor_args(&types(&["uint8"]), &[255_i64.into()]).is_ok());
        assert!(encode_constructor_args(&types(&["uint8"]), &[256_i64.into()]).is_err());
        assert!(encode_constructor_args(&types(&["uint8"]), &[(-1_i64).into()]).is_err());

        assert_eq!(encode_hex(&["int8"], &[(-128_i64).into()]), format!("{}80", "f".repeat(62)));
        assert!(encode_constructor_args(&types(&["int8"]), &[127_i64.into()]).is_ok());
        assert!(encode_constructor_args(&types(&["int8"]), &[128_i64.into()]).is_err());
        assert!(encode_constructor_args(&types(&["int8"]), &[(-129_i64).into()]).is_err());
    }

    #[test]
    fn test_dynamic_types_use_offsets() {
        let encoded = encode_hex(
            &["address", "string", "uint256"],
            &[
                "0x9455dea772f304f4e1117B9E472611Ec626ad2fD".into(),
                "abc".into(),
                7_i64.into(),
            ],
        );

        let expected = [
            word_hex("9455dea772f304f4e1117b9e472611ec626ad2fd"),
            word_hex("60"),
            word_hex("7"),
            word_hex("3"),
            format!("616263{}", "0".repeat(58)),
        ]
        .concat();
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_array_from_text() {
        let encoded = encode_hex(&["uint8[]"], &["[1, 2]".into()]);
        let expected = [word_hex("20"), word_hex("2"), word_hex("1"), word_hex("2")].concat();
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_rejections() {
        let err = encode_constructor_args(&types(&["address"]), &[]).unwrap_err();
        assert!(matches!(err, ChainError::Encoding(_)));

        assert!(encode_constructor_args(&types(&["uint256[]"]), &[1_i64.into()]).is_err());
        assert!(encode_constructor_args(&types(&["uint7"]), &[1_i64.into()]).is_err());
        assert!(encode_constructor_args(&types(&["address"]), &["0x1234".into()]).is_err());
        assert!(encode_constructor_args(&types(&["bool"]), &[1_i64.into()]).is_err());
        assert!(encode_constructor_args(&types(&["bytes2"]), &["0xdeadbeef".into()]).is_err());
    }

    #[test]
    fn test_deploy_data_appends_arguments() {
        let artifact = ContractArtifact {
            contract_name: "Auction".to_string(),
            abi: json!([{"type": "constructor", "inputs": [{"name": "n", "type": "uint8"}]}]),
            bytecode: "0x6080".to_string(),
        };
        assert_eq!(
            deploy_data(&artifact, &[2_i64.into()]).unwrap(),
            format!("0x6080{}", word_hex("2"))
        );
    }
}
