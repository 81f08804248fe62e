//! Per-contract descriptor set built from an ABI JSON document.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_json_abi::{Event, Function, JsonAbi, Param};
use alloy_primitives::B256;
use serde_json::Value;

use crate::builder::{field_name, StructBuilder, StructDescriptor, StructInstance};
use crate::codec;
use crate::convert::{typed_params, ArgInput};
use crate::error::AbiError;
use crate::value::{AbiValue, FieldType};

/// Descriptors for every constructor, method and event of one contract.
///
/// Built once per contract, immutable afterwards. Overloaded methods are
/// keyed `name`, `name0`, `name1`, ... in declaration order; an ABI where
/// such a key is also a real method name is rejected. Anonymous events
/// have no selector topic and are not decoded.
#[derive(Debug, Clone)]
pub struct AbiEvent {
    abi: JsonAbi,
    constructor: Arc<StructDescriptor>,
    inputs: HashMap<String, Arc<StructDescriptor>>,
    outputs: HashMap<String, Arc<StructDescriptor>>,
    events: HashMap<B256, Arc<StructDescriptor>>,
    aliases: HashMap<B256, String>,
    methods: HashMap<String, Function>,
    event_defs: HashMap<B256, Event>,
}

impl AbiEvent {
    /// Parse an ABI JSON array.
    pub fn from_json(abi_json: &str) -> Result<Self, AbiError> {
        let abi: JsonAbi =
            serde_json::from_str(abi_json).map_err(|e| AbiError::InvalidAbi(e.to_string()))?;
        Self::from_abi(abi)
    }

    /// Read and parse an ABI file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AbiError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_abi(abi: JsonAbi) -> Result<Self, AbiError> {
        let constructor = match &abi.constructor {
            Some(c) => Arc::new(StructDescriptor::from_params(&c.inputs)?),
            None => Arc::new(StructBuilder::new().build()),
        };

        let mut methods = HashMap::new();
        for (name, overloads) in &abi.functions {
            for (i, function) in overloads.iter().enumerate() {
                let key = if i == 0 {
                    name.clone()
                } else {
                    format!("{name}{}", i - 1)
                };
                if methods.insert(key.clone(), function.clone()).is_some() {
                    return Err(AbiError::InvalidAbi(format!(
                        "overload key `{key}` collides with another method"
                    )));
                }
            }
        }

        let mut inputs = HashMap::with_capacity(methods.len());
        let mut outputs = HashMap::with_capacity(methods.len());
        for (key, function) in &methods {
            inputs.insert(key.clone(), method_descriptor(&function.inputs)?);
            outputs.insert(key.clone(), method_descriptor(&function.outputs)?);
        }

        let mut events = HashMap::new();
        let mut aliases = HashMap::new();
        let mut event_defs = HashMap::new();
        for event in abi.events() {
            if event.anonymous {
                tracing::debug!(event = %event.name, "anonymous event skipped");
                continue;
            }
            let topic = event.selector();
            events.insert(topic, Arc::new(event_descriptor(event)?));
            aliases.insert(topic, event.name.clone());
            event_defs.insert(topic, event.clone());
        }

        tracing::debug!(
            methods = methods.len(),
            events = events.len(),
            "ABI descriptors built"
        );

        Ok(Self {
            abi,
            constructor,
            inputs,
            outputs,
            events,
            aliases,
            methods,
            event_defs,
        })
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    pub fn constructor(&self) -> &Arc<StructDescriptor> {
        &self.constructor
    }

    pub fn input(&self, method: &str) -> Option<&Arc<StructDescriptor>> {
        self.inputs.get(method)
    }

    pub fn output(&self, method: &str) -> Option<&Arc<StructDescriptor>> {
        self.outputs.get(method)
    }

    pub fn event(&self, topic: &B256) -> Option<&Arc<StructDescriptor>> {
        self.events.get(topic)
    }

    /// Human-readable event name for a topic hash.
    pub fn alias(&self, topic: &B256) -> Option<&str> {
        self.aliases.get(topic).map(String::as_str)
    }

    pub fn function(&self, method: &str) -> Result<&Function, AbiError> {
        self.methods
            .get(method)
            .ok_or_else(|| AbiError::MethodNotFound(method.to_string()))
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// `view`, `pure` (and legacy `constant`) methods are read with
    /// `eth_call`; everything else needs a transaction.
    pub fn is_read_only(&self, method: &str) -> Result<bool, AbiError> {
        use alloy_json_abi::StateMutability::{Pure, View};
        let function = self.function(method)?;
        Ok(matches!(function.state_mutability, View | Pure))
    }

    /// Convert textual arguments for `method`; an empty name selects the constructor.
    pub fn typed_args(&self, method: &str, args: &[ArgInput]) -> Result<Vec<DynSolValue>, AbiError> {
        if method.is_empty() {
            let params = self
                .abi
                .constructor
                .as_ref()
                .map(|c| c.inputs.as_slice())
                .unwrap_or_default();
            return typed_params("constructor", params, args);
        }
        typed_params(method, &self.function(method)?.inputs, args)
    }

    pub fn encode_call(&self, method: &str, args: Vec<DynSolValue>) -> Result<Vec<u8>, AbiError> {
        codec::encode_call(self.function(method)?, args)
    }

    pub fn encode_deploy(&self, bytecode: &[u8], args: Vec<DynSolValue>) -> Result<Vec<u8>, AbiError> {
        let params = self
            .abi
            .constructor
            .as_ref()
            .map(|c| c.inputs.as_slice())
            .unwrap_or_default();
        codec::encode_deploy(bytecode, params, args)
    }

    /// Fill the input struct of `method` from a JSON object and return the
    /// positional call arguments.
    pub fn decode_input_json(&self, method: &str, json: &Value) -> Result<Vec<DynSolValue>, AbiError> {
        let function = self.function(method)?;
        let descriptor = self
            .input(method)
            .ok_or_else(|| AbiError::MethodNotFound(method.to_string()))?;
        let mut instance = descriptor.new_instance();
        instance.from_json(json)?;

        if is_single_tuple(&function.inputs) {
            return Ok(vec![instance.into_dyn_value()]);
        }
        Ok(instance.into_values().into_iter().map(AbiValue::into_dyn).collect())
    }

    /// Decode return data of `method` into its output struct.
    pub fn decode_output(&self, method: &str, data: &[u8]) -> Result<StructInstance, AbiError> {
        let function = self.function(method)?;
        let descriptor = self
            .output(method)
            .ok_or_else(|| AbiError::MethodNotFound(method.to_string()))?;

        if is_single_tuple(&function.outputs) {
            let decoded = DynSolType::Tuple(vec![descriptor.tuple_type()])
                .abi_decode_params(data)
                .map_err(|e| AbiError::Decode(e.to_string()))?;
            return match decoded {
                DynSolValue::Tuple(mut outer) if outer.len() == 1 => match outer.remove(0) {
                    DynSolValue::Tuple(values) => StructInstance::from_values(descriptor, values),
                    _ => Err(AbiError::Decode("expected a tuple".into())),
                },
                _ => Err(AbiError::Decode("expected a single tuple".into())),
            };
        }
        descriptor.decode(data)
    }

    /// Positional output values of `method`.
    pub fn unpack_output(&self, method: &str, data: &[u8]) -> Result<Vec<AbiValue>, AbiError> {
        codec::unpack_output(self.function(method)?, data)
    }

    /// Decode a log into its event struct. Indexed fields come from
    /// `topics[1..]`, the others from `data`.
    pub fn decode_log(&self, topics: &[B256], data: &[u8]) -> Result<StructInstance, AbiError> {
        let topic0 = topics
            .first()
            .ok_or_else(|| AbiError::Decode("log has no topics".into()))?;
        let (event, descriptor) = match (self.event_defs.get(topic0), self.events.get(topic0)) {
            (Some(e), Some(d)) => (e, d),
            _ => return Err(AbiError::EventNotFound(format!("{topic0}"))),
        };

        let mut instance = descriptor.new_instance();
        let mut indexed_topics = topics[1..].iter();
        let mut body = Vec::new();

        for (param, field) in event.inputs.iter().zip(descriptor.fields()) {
            if param.indexed {
                let topic = indexed_topics
                    .next()
                    .ok_or_else(|| AbiError::Decode(format!("missing topic for `{}`", field.name)))?;
                let value = field
                    .ty
                    .to_dyn()
                    .abi_decode(topic.as_slice())
                    .map_err(|e| AbiError::Decode(e.to_string()))?;
                instance.set_field(&field.name, AbiValue::from_dyn(value, &field.ty)?);
            } else {
                body.push(field);
            }
        }

        if !body.is_empty() {
            let tuple = DynSolType::Tuple(body.iter().map(|f| f.ty.to_dyn()).collect());
            let decoded = tuple
                .abi_decode_params(data)
                .map_err(|e| AbiError::Decode(e.to_string()))?;
            let values = match decoded {
                DynSolValue::Tuple(values) => values,
                other => vec![other],
            };
            for (field, value) in body.iter().zip(values) {
                instance.set_field(&field.name, AbiValue::from_dyn(value, &field.ty)?);
            }
        }
        Ok(instance)
    }
}

/// A method whose only parameter is a plain tuple uses the tuple's own
/// descriptor.
fn is_single_tuple(params: &[Param]) -> bool {
    params.len() == 1 && params[0].ty == "tuple"
}

fn method_descriptor(params: &[Param]) -> Result<Arc<StructDescriptor>, AbiError> {
    if is_single_tuple(params) {
        return Ok(Arc::new(StructDescriptor::from_params(&params[0].components)?));
    }
    Ok(Arc::new(StructDescriptor::from_params(params)?))
}

/// Indexed fields carry no ABI tag. Indexed reference types (strings,
/// bytes, arrays, tuples) only survive as their keccak hash, so their field
/// is a `bytes32`.
fn event_descriptor(event: &Event) -> Result<StructDescriptor, AbiError> {
    let mut builder = StructBuilder::new();
    for (i, input) in event.inputs.iter().enumerate() {
        let name = field_name(&input.name, i);
        if input.indexed {
            let ty = FieldType::from_parts(&input.ty, &input.components)?;
            let ty = if is_hashed_topic(&ty) {
                FieldType::Sol(DynSolType::FixedBytes(32))
            } else {
                ty
            };
            builder.add_field(name, ty, None);
        } else {
            let tag = (!input.name.is_empty()).then_some(input.name.as_str());
            builder.add_field(name, FieldType::from_parts(&input.ty, &input.components)?, tag);
        }
    }
    Ok(builder.build())
}

fn is_hashed_topic(ty: &FieldType) -> bool {
    match ty {
        FieldType::Sol(t) => matches!(t, DynSolType::String | DynSolType::Bytes),
        FieldType::Array(_) | FieldType::FixedArray(..) | FieldType::Struct(_) => true,
    }
}

