//! Runtime struct synthesis from ABI parameter lists.
//!
//! A [`StructBuilder`] collects [`FieldSpec`]s and produces an immutable
//! [`StructDescriptor`]. Descriptors are shared through `Arc` and hand out
//! zero-valued [`StructInstance`]s, which hold one [`AbiValue`] per field in
//! declaration order (the order ABI encoding depends on).

use std::collections::HashMap;
use std::sync::Arc;

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_json_abi::Param;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::AbiError;
use crate::value::{AbiValue, FieldType};

/// `snake_case` → `PascalCase`, the field naming used for every descriptor.
pub fn to_camel_case(name: &str) -> String {
    name.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

/// Field name for the `index`-th ABI parameter called `raw`.
pub(crate) fn field_name(raw: &str, index: usize) -> String {
    let name = to_camel_case(raw);
    if name.is_empty() {
        format!("Arg{index}")
    } else {
        name
    }
}

/// One struct field: its name, its type, and the raw ABI parameter name it
/// was derived from (`None` for fields that are not ABI-encoded, such as
/// indexed event topics).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub tag: Option<String>,
}

/// Accumulates fields for a [`StructDescriptor`].
///
/// Field names must be unique; with duplicates, lookups by name resolve to
/// the first field of that name.
#[derive(Debug, Clone, Default)]
pub struct StructBuilder {
    fields: Vec<FieldSpec>,
}

impl StructBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        ty: FieldType,
        tag: Option<&str>,
    ) -> &mut Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            ty,
            tag: tag.map(str::to_string),
        });
        self
    }

    pub fn build(&self) -> StructDescriptor {
        let mut index = HashMap::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            index.entry(field.name.clone()).or_insert(i);
        }
        StructDescriptor {
            fields: self.fields.clone(),
            index,
        }
    }
}

/// Immutable, ordered description of a synthesized struct.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDescriptor {
    fields: Vec<FieldSpec>,
    index: HashMap<String, usize>,
}

impl StructDescriptor {
    /// Flatten an ABI tuple's components into a descriptor; nested tuples
    /// become nested descriptors.
    pub fn from_params(params: &[Param]) -> Result<Self, AbiError> {
        let mut builder = StructBuilder::new();
        for (i, param) in params.iter().enumerate() {
            let tag = (!param.name.is_empty()).then_some(param.name.as_str());
            builder.add_field(field_name(&param.name, i), FieldType::from_param(param)?, tag);
        }
        Ok(builder.build())
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A fresh instance with every field at its zero value.
    pub fn new_instance(self: &Arc<Self>) -> StructInstance {
        StructInstance {
            descriptor: Arc::clone(self),
            values: self.fields.iter().map(|f| AbiValue::zero(&f.ty)).collect(),
        }
    }

    /// The tuple type with one element per field.
    pub fn tuple_type(&self) -> DynSolType {
        DynSolType::Tuple(self.fields.iter().map(|f| f.ty.to_dyn()).collect())
    }

    /// Decode ABI-encoded parameters (no selector) into a new instance.
    pub fn decode(self: &Arc<Self>, data: &[u8]) -> Result<StructInstance, AbiError> {
        let decoded = self
            .tuple_type()
            .abi_decode_params(data)
            .map_err(|e| AbiError::Decode(e.to_string()))?;
        match decoded {
            DynSolValue::Tuple(values) => StructInstance::from_values(self, values),
            other => StructInstance::from_values(self, vec![other]),
        }
    }
}

/// A value conforming to a [`StructDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub struct StructInstance {
    descriptor: Arc<StructDescriptor>,
    values: Vec<AbiValue>,
}

impl StructInstance {
    /// Pair decoded tuple elements with the descriptor's fields.
    pub fn from_values(
        descriptor: &Arc<StructDescriptor>,
        values: Vec<DynSolValue>,
    ) -> Result<Self, AbiError> {
        if values.len() != descriptor.len() {
            return Err(AbiError::Decode(format!(
                "expected {} values, got {}",
                descriptor.len(),
                values.len()
            )));
        }
        let values = values
            .into_iter()
            .zip(descriptor.fields())
            .map(|(value, field)| AbiValue::from_dyn(value, &field.ty))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            descriptor: Arc::clone(descriptor),
            values,
        })
    }

    pub fn descriptor(&self) -> &Arc<StructDescriptor> {
        &self.descriptor
    }

    /// Best-effort assignment: returns `false` (and logs) when the field
    /// does not exist or the value has the wrong type.
    pub fn set_field(&mut self, name: &str, value: AbiValue) -> bool {
        let Some(idx) = self.descriptor.index_of(name) else {
            tracing::warn!(field = name, "set_field: no such field");
            return false;
        };
        let ty = &self.descriptor.fields[idx].ty;
        if !value.conforms_to(ty) {
            tracing::warn!(field = name, expected = %ty.type_name(), "set_field: type mismatch");
            return false;
        }
        self.values[idx] = value;
        true
    }

    pub fn get_field(&self, name: &str) -> Option<&AbiValue> {
        self.descriptor.index_of(name).map(|i| &self.values[i])
    }

    /// Field values in declaration order.
    pub fn iterate(&self) -> &[AbiValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<AbiValue> {
        self.values
    }

    /// JSON object keyed by field name.
    pub fn to_json(&self) -> Value {
        let mut map = Map::with_capacity(self.values.len());
        for (field, value) in self.descriptor.fields.iter().zip(&self.values) {
            map.insert(field.name.clone(), value.to_json());
        }
        Value::Object(map)
    }

    /// Overwrite fields from a JSON object.
    ///
    /// Keys match the field name, then the raw ABI name, then the field name
    /// ignoring case. Unknown keys are ignored and absent fields keep their
    /// current value.
    pub fn from_json(&mut self, json: &Value) -> Result<(), AbiError> {
        let object = json.as_object().ok_or_else(|| AbiError::TypeMismatch {
            field: "<root>".into(),
            expected: "a JSON object".into(),
        })?;

        for (idx, field) in self.descriptor.fields.iter().enumerate() {
            let found = object
                .get(&field.name)
                .or_else(|| field.tag.as_ref().and_then(|t| object.get(t)))
                .or_else(|| {
                    object
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(&field.name))
                        .map(|(_, v)| v)
                });
            if let Some(raw) = found {
                self.values[idx] = AbiValue::from_json(raw, &field.ty)?;
            }
        }
        Ok(())
    }

    /// Copy field values from an instance of a possibly different but
    /// field-compatible descriptor, matching fields by name.
    pub fn copy_from(&mut self, other: &StructInstance) -> Result<(), AbiError> {
        self.from_json(&other.to_json())
    }

    /// The instance as an alloy tuple, ready for encoding.
    pub fn into_dyn_value(self) -> DynSolValue {
        DynSolValue::Tuple(self.values.into_iter().map(AbiValue::into_dyn).collect())
    }

    /// ABI-encode the fields as function parameters.
    pub fn encode(&self) -> Vec<u8> {
        self.clone().into_dyn_value().abi_encode_params()
    }
}

impl Serialize for StructInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{I256, U256};

    fn int256() -> FieldType {
        FieldType::Sol(DynSolType::Int(256))
    }

    fn point() -> Arc<StructDescriptor> {
        let mut b = StructBuilder::new();
        b.add_field("X", int256(), Some("x"))
            .add_field("Y", int256(), Some("y"));
        Arc::new(b.build())
    }

    fn int(v: i64) -> AbiValue {
        AbiValue::Int(I256::from_dec_str(&v.to_string()).unwrap(), 256)
    }

    #[test]
    fn camel_case() {
        assert_eq!(to_camel_case("my_value"), "MyValue");
        assert_eq!(to_camel_case("amount"), "Amount");
        assert_eq!(to_camel_case("_owner"), "Owner");
        assert_eq!(field_name("", 3), "Arg3");
    }

    #[test]
    fn descriptor_preserves_order() {
        let desc = point();
        assert_eq!(desc.len(), 2);
        assert_eq!(desc.index_of("Y"), Some(1));
        assert_eq!(desc.field("X").unwrap().tag.as_deref(), Some("x"));
        assert!(desc.field("Z").is_none());
        assert_eq!(desc.tuple_type().sol_type_name(), "(int256,int256)");
    }

    #[test]
    fn new_instance_is_zeroed() {
        let inst = point().new_instance();
        assert_eq!(inst.iterate(), &[int(0), int(0)]);
    }

    #[test]
    fn set_field_is_best_effort() {
        let mut inst = point().new_instance();
        assert!(inst.set_field("X", int(5)));
        assert!(!inst.set_field("Missing", int(1)));
        assert!(!inst.set_field("Y", AbiValue::Bool(true)));
        assert!(!inst.set_field("Y", AbiValue::Uint(U256::from(1u64), 256)));
        assert_eq!(inst.get_field("X"), Some(&int(5)));
        assert_eq!(inst.get_field("Y"), Some(&int(0)));
    }

    #[test]
    fn json_lookup_by_name_tag_or_case() {
        let mut inst = point().new_instance();
        inst.from_json(&serde_json::json!({"x": 3, "Y": "4", "extra": true}))
            .unwrap();
        assert_eq!(inst.iterate(), &[int(3), int(4)]);

        inst.from_json(&serde_json::json!({"X": "-9"})).unwrap();
        assert_eq!(inst.iterate(), &[int(-9), int(4)]);
        assert!(inst.from_json(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn copy_between_compatible_descriptors() {
        let mut src = point().new_instance();
        src.set_field("X", int(1));
        src.set_field("Y", int(2));

        let mut b = StructBuilder::new();
        b.add_field("Y", int256(), None)
            .add_field("Z", FieldType::Sol(DynSolType::Bool), None);
        let mut dst = Arc::new(b.build()).new_instance();
        dst.copy_from(&src).unwrap();
        assert_eq!(dst.iterate(), &[int(2), AbiValue::Bool(false)]);
    }

    #[test]
    fn nested_struct_field() {
        let mut outer = StructBuilder::new();
        outer
            .add_field("P", FieldType::Struct(point()), Some("p"))
            .add_field("Ok", FieldType::Sol(DynSolType::Bool), Some("ok"));
        let desc = Arc::new(outer.build());
        assert_eq!(desc.tuple_type().sol_type_name(), "((int256,int256),bool)");

        let mut inst = desc.new_instance();
        inst.from_json(&serde_json::json!({"P": {"X": 7, "Y": 8}, "ok": true}))
            .unwrap();
        let encoded = inst.encode();
        let decoded = desc.decode(&encoded).unwrap();
        assert_eq!(decoded, inst);
        assert_eq!(
            decoded.to_json(),
            serde_json::json!({"P": {"X": 7, "Y": 8}, "Ok": true})
        );
    }
}
