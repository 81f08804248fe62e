//! Output decoding through synthesized structs.

use alloy_primitives::U256;
use chainclient_abi::{AbiEvent, AbiValue, FieldType, StructBuilder, DynSolType};
use serde_json::json;

fn words(values: &[u64]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|v| U256::from(*v).to_be_bytes::<32>())
        .collect()
}

const SIMPLE_TUPLE: &str = r#"[{"name":"testTuple","type":"function","inputs":[],"stateMutability":"view",
    "outputs":[{"type":"tuple","name":"ret","components":[{"type":"int256","name":"a"},{"type":"int256","name":"b"}]}]}]"#;

const NESTED_TUPLE: &str = r#"[{"name":"testTuple","type":"function","inputs":[],"stateMutability":"view","outputs":[
    {"type":"tuple","name":"s","components":[{"type":"uint256","name":"a"},{"type":"uint256[]","name":"b"},
        {"type":"tuple[]","name":"c","components":[{"name":"x","type":"uint256"},{"name":"y","type":"uint256"}]}]},
    {"type":"tuple","name":"t","components":[{"name":"x","type":"uint256"},{"name":"y","type":"uint256"}]},
    {"type":"uint256","name":"a"}
]}]"#;

#[test]
fn single_tuple_output_is_flattened() {
    let abi = AbiEvent::from_json(SIMPLE_TUPLE).unwrap();
    let desc = abi.output("testTuple").unwrap();
    let names: Vec<&str> = desc.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["A", "B"]);

    let instance = abi.decode_output("testTuple", &words(&[1, 0x11])).unwrap();
    let as_json = instance.to_json();
    assert_eq!(as_json, json!({"A": 1, "B": 17}));

    // Round-trip through the intermediate JSON form.
    let mut again = desc.new_instance();
    again.from_json(&as_json).unwrap();
    assert_eq!(again, instance);

    // Same values read back into an independently built struct.
    let mut plain = StructBuilder::new();
    plain
        .add_field("A", FieldType::Sol(DynSolType::Int(256)), None)
        .add_field("B", FieldType::Sol(DynSolType::Int(256)), None);
    let mut copy = std::sync::Arc::new(plain.build()).new_instance();
    copy.copy_from(&instance).unwrap();
    assert_eq!(copy.to_json(), json!({"A": 1, "B": 17}));
}

#[test]
fn nested_tuple_decodes_into_nested_structs() {
    let abi = AbiEvent::from_json(NESTED_TUPLE).unwrap();
    let data = words(&[
        0x80, // s offset
        0, 1, // t
        1,    // a
        1, 0x60, 0xc0, // s.a, s.b offset, s.c offset
        2, 1, 2, // s.b
        2, 1, 2, 2, 1, // s.c
    ]);

    let ret = abi.decode_output("testTuple", &data).unwrap();
    assert_eq!(
        ret.to_json(),
        json!({
            "S": {"A": 1, "B": [1, 2], "C": [{"X": 1, "Y": 2}, {"X": 2, "Y": 1}]},
            "T": {"X": 0, "Y": 1},
            "A": 1
        })
    );

    let s = match ret.get_field("S") {
        Some(AbiValue::Struct(s)) => s,
        other => panic!("unexpected S: {other:?}"),
    };
    assert_eq!(
        s.get_field("B"),
        Some(&AbiValue::Array(vec![
            AbiValue::Uint(U256::from(1u64), 256),
            AbiValue::Uint(U256::from(2u64), 256)
        ]))
    );

    // Re-encoding the decoded struct gives back the original bytes.
    assert_eq!(ret.encode(), data);

    let positional = abi.unpack_output("testTuple", &data).unwrap();
    assert_eq!(positional.len(), 3);
    assert_eq!(positional[2], AbiValue::Uint(U256::from(1u64), 256));
}
