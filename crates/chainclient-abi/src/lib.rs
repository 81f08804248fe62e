//! chainclient-abi: runtime ABI structs and string-to-ABI conversion.
//!
//! # Overview
//!
//! - [`StructBuilder`] / [`StructDescriptor`] / [`StructInstance`]: struct
//!   synthesis from ABI parameter lists, with nested tuples as nested structs
//! - [`AbiEvent`]: all descriptors of one contract (constructor, method
//!   inputs and outputs, events keyed by topic hash)
//! - [`convert`]: textual arguments (`"123"`, `"[1,2,3]"`) to typed values
//! - [`unpack_output`]: positional decoding of call results
//!
//! Built on alloy's `dyn-abi` and `json-abi`.

pub mod abi_event;
pub mod builder;
pub mod codec;
pub mod convert;
pub mod error;
pub mod value;

pub use abi_event::AbiEvent;
pub use builder::{to_camel_case, FieldSpec, StructBuilder, StructDescriptor, StructInstance};
pub use codec::{encode_call, encode_deploy, unpack_output};
pub use convert::{convert, convert_str, parse_args, typed_params, ArgInput};
pub use error::AbiError;
pub use value::{AbiValue, FieldType};

pub use alloy_core::dyn_abi::{DynSolType, DynSolValue};
pub use alloy_json_abi::JsonAbi;
