//! Calldata encoding and output unpacking for single functions.

use alloy_core::dyn_abi::DynSolValue;
use alloy_dyn_abi::Specifier;
use alloy_json_abi::{Function, Param};

use crate::error::AbiError;
use crate::value::{AbiValue, FieldType};

/// `selector ++ abi_encode_params(args)`, after checking every argument
/// against the declared input type.
pub fn encode_call(function: &Function, args: Vec<DynSolValue>) -> Result<Vec<u8>, AbiError> {
    check_args(&function.name, &function.inputs, &args)?;
    let mut out = function.selector().to_vec();
    out.extend_from_slice(&DynSolValue::Tuple(args).abi_encode_params());
    Ok(out)
}

/// Creation code: `bytecode ++ abi_encode_params(args)`.
pub fn encode_deploy(
    bytecode: &[u8],
    inputs: &[Param],
    args: Vec<DynSolValue>,
) -> Result<Vec<u8>, AbiError> {
    check_args("constructor", inputs, &args)?;
    let mut out = bytecode.to_vec();
    if !args.is_empty() {
        out.extend_from_slice(&DynSolValue::Tuple(args).abi_encode_params());
    }
    Ok(out)
}

fn check_args(label: &str, params: &[Param], args: &[DynSolValue]) -> Result<(), AbiError> {
    if params.len() != args.len() {
        return Err(AbiError::ArgCount {
            method: label.to_string(),
            expected: params.len(),
            got: args.len(),
        });
    }
    for (param, arg) in params.iter().zip(args) {
        let ty = param
            .resolve()
            .map_err(|e| AbiError::InvalidAbi(format!("{}: {e}", param.ty)))?;
        if !ty.matches(arg) {
            return Err(AbiError::TypeMismatch {
                field: param.name.clone(),
                expected: ty.sol_type_name().into_owned(),
            });
        }
    }
    Ok(())
}

/// Decode the return data of `function` into one value per output.
///
/// A function without outputs yields an empty list whatever the data.
pub fn unpack_output(function: &Function, data: &[u8]) -> Result<Vec<AbiValue>, AbiError> {
    unpack_params(&function.outputs, data)
}

pub(crate) fn unpack_params(params: &[Param], data: &[u8]) -> Result<Vec<AbiValue>, AbiError> {
    if params.is_empty() {
        return Ok(Vec::new());
    }
    let types = params
        .iter()
        .map(FieldType::from_param)
        .collect::<Result<Vec<_>, _>>()?;
    let tuple = alloy_core::dyn_abi::DynSolType::Tuple(types.iter().map(FieldType::to_dyn).collect());
    let decoded = tuple
        .abi_decode_params(data)
        .map_err(|e| AbiError::Decode(e.to_string()))?;
    let values = match decoded {
        DynSolValue::Tuple(values) => values,
        other => vec![other],
    };
    values
        .into_iter()
        .zip(&types)
        .map(|(value, ty)| AbiValue::from_dyn(value, ty))
        .collect()
}
