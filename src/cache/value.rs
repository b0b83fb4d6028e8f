//! Cache Value Module
//!
//! The portable value model every cached entry must fit into: null,
//! booleans, numbers, strings, sequences and string-keyed mappings.
//! Conversion from arbitrary `Serialize` types goes through a strict
//! serializer that rejects anything outside that model, so nothing but
//! plain structured data is ever written to or read from the store.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{self, Impossible};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Number;

use crate::error::{CacheError, Result};

/// Deepest container nesting accepted for storage. The JSON decoder gives up
/// at 128 levels, so anything deeper could be written but never read back.
pub const MAX_DEPTH: usize = 64;

/// Std time types serialize as plain structs; they are refused by name.
const TIME_STRUCTS: &[&str] = &["SystemTime", "Duration"];

// == Cache Value ==
/// A value that may be stored in the cache.
///
/// Mappings use a `BTreeMap` so that two logically equal mappings always
/// encode to the same bytes regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<CacheValue>),
    Mapping(BTreeMap<String, CacheValue>),
}

impl CacheValue {
    /// Converts any serializable value into the cache value model.
    ///
    /// Fails with `UnsupportedType` for raw byte buffers, non-finite floats,
    /// 128-bit integers, std time values, maps whose keys are not strings
    /// and anything nested deeper than [`MAX_DEPTH`].
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let value = value.serialize(ValueSerializer)?;
        check_depth(&value)?;
        Ok(value)
    }

    /// Converts this value into a caller type.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.into()).map_err(|e| CacheError::CorruptData(e.to_string()))
    }

    /// Short name of the variant, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheValue::Null => "null",
            CacheValue::Bool(_) => "bool",
            CacheValue::Number(_) => "number",
            CacheValue::String(_) => "string",
            CacheValue::Sequence(_) => "sequence",
            CacheValue::Mapping(_) => "mapping",
        }
    }

    // Only descends `limit + 1` levels, whatever the actual depth.
    fn deeper_than(&self, limit: usize) -> bool {
        match self {
            CacheValue::Sequence(items) => {
                limit == 0 || items.iter().any(|item| item.deeper_than(limit - 1))
            }
            CacheValue::Mapping(map) => {
                limit == 0 || map.values().any(|item| item.deeper_than(limit - 1))
            }
            _ => false,
        }
    }
}

fn check_depth(value: &CacheValue) -> Result<()> {
    if value.deeper_than(MAX_DEPTH) {
        return Err(CacheError::UnsupportedType(format!(
            "nesting deeper than {} levels",
            MAX_DEPTH
        )));
    }
    Ok(())
}

impl fmt::Display for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}

// == Conversions ==
impl From<serde_json::Value> for CacheValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CacheValue::Null,
            serde_json::Value::Bool(b) => CacheValue::Bool(b),
            serde_json::Value::Number(n) => CacheValue::Number(n),
            serde_json::Value::String(s) => CacheValue::String(s),
            serde_json::Value::Array(items) => {
                CacheValue::Sequence(items.into_iter().map(CacheValue::from).collect())
            }
            serde_json::Value::Object(map) => CacheValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, CacheValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<CacheValue> for serde_json::Value {
    fn from(value: CacheValue) -> Self {
        match value {
            CacheValue::Null => serde_json::Value::Null,
            CacheValue::Bool(b) => serde_json::Value::Bool(b),
            CacheValue::Number(n) => serde_json::Value::Number(n),
            CacheValue::String(s) => serde_json::Value::String(s),
            CacheValue::Sequence(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            CacheValue::Mapping(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<bool> for CacheValue {
    fn from(b: bool) -> Self {
        CacheValue::Bool(b)
    }
}

impl From<i64> for CacheValue {
    fn from(n: i64) -> Self {
        CacheValue::Number(n.into())
    }
}

impl From<&str> for CacheValue {
    fn from(s: &str) -> Self {
        CacheValue::String(s.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(s: String) -> Self {
        CacheValue::String(s)
    }
}

impl From<Vec<CacheValue>> for CacheValue {
    fn from(items: Vec<CacheValue>) -> Self {
        CacheValue::Sequence(items)
    }
}

impl From<BTreeMap<String, CacheValue>> for CacheValue {
    fn from(map: BTreeMap<String, CacheValue>) -> Self {
        CacheValue::Mapping(map)
    }
}

// == Encode / Decode ==
/// Encodes a value into the bytes written to the store.
pub fn serialize(value: &CacheValue) -> Result<Vec<u8>> {
    check_depth(value)?;
    serde_json::to_vec(value).map_err(|e| CacheError::UnsupportedType(e.to_string()))
}

/// Decodes stored bytes back into a value.
///
/// Only JSON is accepted, so decoding can never build anything but a
/// `CacheValue` tree.
pub fn deserialize(bytes: &[u8]) -> Result<CacheValue> {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .map(CacheValue::from)
        .map_err(|e| CacheError::CorruptData(e.to_string()))
}

// == Strict Serializer ==
fn unsupported(what: &str) -> CacheError {
    CacheError::UnsupportedType(what.to_string())
}

impl ser::Error for CacheError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CacheError::UnsupportedType(msg.to_string())
    }
}

fn float(v: f64) -> Result<CacheValue> {
    Number::from_f64(v)
        .map(CacheValue::Number)
        .ok_or_else(|| unsupported("non-finite float"))
}

fn tagged(variant: &'static str, inner: CacheValue) -> CacheValue {
    let mut map = BTreeMap::new();
    map.insert(variant.to_string(), inner);
    CacheValue::Mapping(map)
}

struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = CacheValue;
    type Error = CacheError;

    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = SeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = MapBuilder;

    fn serialize_bool(self, v: bool) -> Result<CacheValue> {
        Ok(CacheValue::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<CacheValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_i16(self, v: i16) -> Result<CacheValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_i32(self, v: i32) -> Result<CacheValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_i64(self, v: i64) -> Result<CacheValue> {
        Ok(CacheValue::Number(v.into()))
    }

    fn serialize_u8(self, v: u8) -> Result<CacheValue> {
        self.serialize_u64(v.into())
    }

    fn serialize_u16(self, v: u16) -> Result<CacheValue> {
        self.serialize_u64(v.into())
    }

    fn serialize_u32(self, v: u32) -> Result<CacheValue> {
        self.serialize_u64(v.into())
    }

    fn serialize_u64(self, v: u64) -> Result<CacheValue> {
        Ok(CacheValue::Number(v.into()))
    }

    fn serialize_i128(self, _v: i128) -> Result<CacheValue> {
        Err(unsupported("128-bit integer"))
    }

    fn serialize_u128(self, _v: u128) -> Result<CacheValue> {
        Err(unsupported("128-bit integer"))
    }

    fn serialize_f32(self, v: f32) -> Result<CacheValue> {
        float(v.into())
    }

    fn serialize_f64(self, v: f64) -> Result<CacheValue> {
        float(v)
    }

    fn serialize_char(self, v: char) -> Result<CacheValue> {
        Ok(CacheValue::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<CacheValue> {
        Ok(CacheValue::String(v.to_string()))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<CacheValue> {
        Err(unsupported("raw byte buffer"))
    }

    fn serialize_none(self) -> Result<CacheValue> {
        Ok(CacheValue::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<CacheValue> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<CacheValue> {
        Ok(CacheValue::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<CacheValue> {
        Ok(CacheValue::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<CacheValue> {
        Ok(CacheValue::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<CacheValue> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<CacheValue> {
        Ok(tagged(variant, value.serialize(ValueSerializer)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder> {
        Ok(SeqBuilder {
            variant: None,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqBuilder> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqBuilder> {
        Ok(SeqBuilder {
            variant: Some(variant),
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder> {
        Ok(MapBuilder::default())
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<MapBuilder> {
        if TIME_STRUCTS.contains(&name) {
            return Err(CacheError::UnsupportedType(format!("time value {}", name)));
        }
        Ok(MapBuilder::default())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<MapBuilder> {
        Ok(MapBuilder {
            variant: Some(variant),
            ..MapBuilder::default()
        })
    }
}

struct SeqBuilder {
    variant: Option<&'static str>,
    items: Vec<CacheValue>,
}

impl SeqBuilder {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn finish(self) -> CacheValue {
        let seq = CacheValue::Sequence(self.items);
        match self.variant {
            Some(variant) => tagged(variant, seq),
            None => seq,
        }
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = CacheValue;
    type Error = CacheError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<CacheValue> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = CacheValue;
    type Error = CacheError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<CacheValue> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = CacheValue;
    type Error = CacheError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<CacheValue> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SeqBuilder {
    type Ok = CacheValue;
    type Error = CacheError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<CacheValue> {
        Ok(self.finish())
    }
}

#[derive(Default)]
struct MapBuilder {
    variant: Option<&'static str>,
    entries: BTreeMap<String, CacheValue>,
    pending_key: Option<String>,
}

impl MapBuilder {
    fn finish(self) -> CacheValue {
        let map = CacheValue::Mapping(self.entries);
        match self.variant {
            Some(variant) => tagged(variant, map),
            None => map,
        }
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = CacheValue;
    type Error = CacheError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        self.pending_key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| CacheError::Internal("map value without key".to_string()))?;
        self.entries.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<CacheValue> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = CacheValue;
    type Error = CacheError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.entries
            .insert(key.to_string(), value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<CacheValue> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for MapBuilder {
    type Ok = CacheValue;
    type Error = CacheError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.entries
            .insert(key.to_string(), value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<CacheValue> {
        Ok(self.finish())
    }
}

// Map keys must already be strings; no silent number-to-string coercion.
struct KeySerializer;

fn non_string_key() -> CacheError {
    unsupported("non-string map key")
}

impl ser::Serializer for KeySerializer {
    type Ok = String;
    type Error = CacheError;

    type SerializeSeq = Impossible<String, CacheError>;
    type SerializeTuple = Impossible<String, CacheError>;
    type SerializeTupleStruct = Impossible<String, CacheError>;
    type SerializeTupleVariant = Impossible<String, CacheError>;
    type SerializeMap = Impossible<String, CacheError>;
    type SerializeStruct = Impossible<String, CacheError>;
    type SerializeStructVariant = Impossible<String, CacheError>;

    fn serialize_str(self, v: &str) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_char(self, v: char) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<String> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String> {
        value.serialize(self)
    }

    fn serialize_bool(self, _v: bool) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_i8(self, _v: i8) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_i16(self, _v: i16) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_i32(self, _v: i32) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_i64(self, _v: i64) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_u8(self, _v: u8) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_u16(self, _v: u16) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_u32(self, _v: u32) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_u64(self, _v: u64) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_f32(self, _v: f32) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_f64(self, _v: f64) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_none(self) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, _value: &T) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_unit(self) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String> {
        Err(non_string_key())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(non_string_key())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(non_string_key())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(non_string_key())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(non_string_key())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(non_string_key())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(non_string_key())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(non_string_key())
    }
}
