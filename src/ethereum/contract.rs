use alloy::{
    dyn_abi::{DynSolType, DynSolValue, EventExt, FunctionExt, JsonAbiExt, Specifier},
    json_abi::{Function, JsonAbi, Param},
    primitives::{Address, Bytes, U256},
};
use serde_json::Value;
use std::sync::Arc;

use super::{utils, DecodedEvent, LogEntry};
use crate::error::{ClientError, ClientResult};

/// A deployed contract: where it lives and how to talk to it
#[derive(Debug, Clone)]
pub struct ContractBinding {
    label: String,
    address: Address,
    abi: Arc<JsonAbi>,
}

impl ContractBinding {
    pub fn new(label: impl Into<String>, address: Address, abi: Arc<JsonAbi>) -> Self {
        Self {
            label: label.into(),
            address,
            abi,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn address(&self) -> Address {
        self.address
    }

    #[cfg(test)]
    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Same ABI, different deployment
    pub fn at(&self, address: Address) -> Self {
        Self {
            label: self.label.clone(),
            address,
            abi: self.abi.clone(),
        }
    }

    /// Find the overload of `name` taking `arity` arguments
    pub fn function(&self, name: &str, arity: usize) -> ClientResult<&Function> {
        utils::validate_function_name(name)?;
        let overloads = self.abi.function(name).ok_or_else(|| {
            let mut available: Vec<&str> = self.abi.functions().map(|f| f.name.as_str()).collect();
            available.dedup();

            if available.is_empty() {
                ClientError::Argument(format!(
                    "Function '{}' not found. The {} ABI contains no functions.",
                    name, self.label
                ))
            } else {
                ClientError::Argument(format!(
                    "Function '{}' not found in {} ABI. Available functions: {}",
                    name,
                    self.label,
                    available.join(", ")
                ))
            }
        })?;

        overloads
            .iter()
            .find(|function| function.inputs.len() == arity)
            .ok_or_else(|| {
                let expected: Vec<String> = overloads
                    .iter()
                    .map(|function| format!("[{}]", describe_params(&function.inputs)))
                    .collect();

                ClientError::Argument(format!(
                    "Parameter count mismatch for function '{}': got {} parameters.\nExpected parameters: {}",
                    name,
                    arity,
                    expected.join(" or ")
                ))
            })
    }

    /// Encode a call from JSON arguments, matched to the overload by arity
    pub fn encode_call(&self, name: &str, args: &[Value]) -> ClientResult<Bytes> {
        let function = self.function(name, args.len())?;
        encode_function(function, args)
    }

    /// Decode the return data of `name`
    pub fn decode_output(
        &self,
        name: &str,
        arity: usize,
        data: &Bytes,
    ) -> ClientResult<Vec<DynSolValue>> {
        let function = self.function(name, arity)?;

        if data.is_empty() {
            return Err(ClientError::Unknown(format!(
                "Empty response from {}.{}; is the contract deployed at {}?",
                self.label, name, self.address
            )));
        }

        function.abi_decode_output(data, false).map_err(|e| {
            ClientError::Unknown(format!(
                "Failed to decode output of {}.{}: {}",
                self.label, name, e
            ))
        })
    }

    /// First log emitted by this contract matching `event_name`, decoded with field names
    pub fn decode_event(&self, logs: &[LogEntry], event_name: &str) -> Option<DecodedEvent> {
        let events = self.abi.event(event_name)?;

        logs.iter()
            .filter(|log| log.address == self.address)
            .find_map(|log| {
                let event = events
                    .iter()
                    .find(|event| log.topics.first() == Some(&event.selector()))?;

                let decoded = match event.decode_log_parts(log.topics.iter().copied(), &log.data, false)
                {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        tracing::debug!("Failed to decode {} log: {}", event_name, e);
                        return None;
                    }
                };

                let mut indexed = decoded.indexed.iter();
                let mut body = decoded.body.iter();
                let fields = event
                    .inputs
                    .iter()
                    .enumerate()
                    .filter_map(|(i, input)| {
                        let value = if input.indexed {
                            indexed.next()?
                        } else {
                            body.next()?
                        };
                        let name = if input.name.is_empty() {
                            format!("arg{}", i)
                        } else {
                            input.name.clone()
                        };
                        Some((name, dyn_sol_value_to_json(value)))
                    })
                    .collect();

                Some(DecodedEvent {
                    name: event.name.clone(),
                    fields,
                })
            })
    }
}

fn describe_params(params: &[Param]) -> String {
    params
        .iter()
        .map(|param| {
            if param.name.is_empty() {
                param.selector_type().to_string()
            } else {
                format!("{} {}", param.selector_type(), param.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Encode function parameters for a contract call
pub fn encode_function(function: &Function, args: &[Value]) -> ClientResult<Bytes> {
    if args.len() != function.inputs.len() {
        return Err(ClientError::Argument(format!(
            "Parameter count mismatch for function '{}': expected {} parameters, got {}.\nExpected parameters: [{}]",
            function.name,
            function.inputs.len(),
            args.len(),
            describe_params(&function.inputs)
        )));
    }

    let mut values = Vec::with_capacity(args.len());
    for (i, (param, arg)) in function.inputs.iter().zip(args).enumerate() {
        let ty = param.resolve().map_err(|e| {
            ClientError::Argument(format!(
                "Unsupported parameter type '{}' in '{}': {}",
                param.ty, function.name, e
            ))
        })?;

        let value = json_to_dyn_sol_value(arg, &ty).map_err(|e| {
            ClientError::Argument(format!(
                "Invalid parameter #{} ('{}' of type '{}'): {}",
                i + 1,
                param.name,
                ty,
                e
            ))
        })?;
        values.push(value);
    }

    let encoded = function.abi_encode_input(&values).map_err(|e| {
        ClientError::Argument(format!("Failed to encode function inputs: {}", e))
    })?;

    Ok(encoded.into())
}

/// Convert a JSON value to a `DynSolValue` of the expected Solidity type
pub fn json_to_dyn_sol_value(value: &Value, ty: &DynSolType) -> Result<DynSolValue, String> {
    match (ty, value) {
        (DynSolType::Array(inner), Value::Array(items)) => items
            .iter()
            .map(|item| json_to_dyn_sol_value(item, inner))
            .collect::<Result<Vec<_>, _>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(format!("expected {} elements, got {}", len, items.len()));
            }
            items
                .iter()
                .map(|item| json_to_dyn_sol_value(item, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), Value::Array(items)) => {
            if items.len() != types.len() {
                return Err(format!(
                    "expected a tuple of {} elements, got {}",
                    types.len(),
                    items.len()
                ));
            }
            items
                .iter()
                .zip(types)
                .map(|(item, ty)| json_to_dyn_sol_value(item, ty))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::Tuple)
        }
        (DynSolType::Bool, Value::Bool(b)) => Ok(DynSolValue::Bool(*b)),
        (_, Value::Number(n)) => ty.coerce_str(&n.to_string()).map_err(|e| e.to_string()),
        (_, Value::String(s)) => ty.coerce_str(s).map_err(|e| e.to_string()),
        _ => Err(format!("cannot convert {} to {}", value, ty)),
    }
}

/// Convert single DynSolValue to JSON
pub fn dyn_sol_value_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Address(addr) => Value::String(addr.to_string()),
        DynSolValue::Uint(num, _) => Value::String(num.to_string()),
        DynSolValue::Int(num, _) => Value::String(num.to_string()),
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word[..*size])))
        }
        DynSolValue::Array(items)
        | DynSolValue::FixedArray(items)
        | DynSolValue::Tuple(items) => Value::Array(items.iter().map(dyn_sol_value_to_json).collect()),
        other => Value::String(format!("{:?}", other)),
    }
}

fn unexpected(expected: &str, value: &DynSolValue) -> ClientError {
    ClientError::Unknown(format!("Expected {} in contract output, got {:?}", expected, value))
}

pub fn as_u256(value: &DynSolValue) -> ClientResult<U256> {
    value
        .as_uint()
        .map(|(num, _)| num)
        .ok_or_else(|| unexpected("an unsigned integer", value))
}

pub fn as_address(value: &DynSolValue) -> ClientResult<Address> {
    value
        .as_address()
        .ok_or_else(|| unexpected("an address", value))
}

pub fn as_string(value: &DynSolValue) -> ClientResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| unexpected("a string", value))
}

pub fn as_tuple(value: &DynSolValue) -> ClientResult<&[DynSolValue]> {
    value.as_tuple().ok_or_else(|| unexpected("a tuple", value))
}

pub fn as_array(value: &DynSolValue) -> ClientResult<&[DynSolValue]> {
    value
        .as_array()
        .or_else(|| value.as_fixed_array())
        .ok_or_else(|| unexpected("an array", value))
}

/// Exactly one return value, as declared by a single-output function
pub fn single(mut values: Vec<DynSolValue>) -> ClientResult<DynSolValue> {
    if values.len() != 1 {
        return Err(ClientError::Unknown(format!(
            "Expected one return value, got {}",
            values.len()
        )));
    }
    Ok(values.remove(0))
}
