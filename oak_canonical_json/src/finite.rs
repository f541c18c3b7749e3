//
// Copyright 2026 The Project Oak Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Rejection of non-finite floats before they reach `serde_json`, which would
//! silently encode them as `null`.

use core::fmt;

use serde::{ser, Serialize};

#[derive(Debug)]
pub(crate) enum FiniteCheckError {
    NonFinite(f64),
    Custom(String),
}

impl fmt::Display for FiniteCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiniteCheckError::NonFinite(value) => write!(f, "non-finite number {}", value),
            FiniteCheckError::Custom(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for FiniteCheckError {}

impl ser::Error for FiniteCheckError {
    fn custom<T: fmt::Display>(message: T) -> Self {
        FiniteCheckError::Custom(message.to_string())
    }
}

type CheckResult = core::result::Result<(), FiniteCheckError>;

/// Walks the serialized form of `value` and fails on the first NaN or infinity.
pub(crate) fn check_finite<T: Serialize + ?Sized>(value: &T) -> CheckResult {
    value.serialize(FiniteChecker)
}

struct FiniteChecker;

impl ser::Serializer for FiniteChecker {
    type Ok = ();
    type Error = FiniteCheckError;

    type SerializeSeq = FiniteChecker;
    type SerializeTuple = FiniteChecker;
    type SerializeTupleStruct = FiniteChecker;
    type SerializeTupleVariant = FiniteChecker;
    type SerializeMap = FiniteChecker;
    type SerializeStruct = FiniteChecker;
    type SerializeStructVariant = FiniteChecker;

    fn serialize_bool(self, _value: bool) -> CheckResult {
        Ok(())
    }

    fn serialize_i8(self, _value: i8) -> CheckResult {
        Ok(())
    }

    fn serialize_i16(self, _value: i16) -> CheckResult {
        Ok(())
    }

    fn serialize_i32(self, _value: i32) -> CheckResult {
        Ok(())
    }

    fn serialize_i64(self, _value: i64) -> CheckResult {
        Ok(())
    }

    fn serialize_u8(self, _value: u8) -> CheckResult {
        Ok(())
    }

    fn serialize_u16(self, _value: u16) -> CheckResult {
        Ok(())
    }

    fn serialize_u32(self, _value: u32) -> CheckResult {
        Ok(())
    }

    fn serialize_u64(self, _value: u64) -> CheckResult {
        Ok(())
    }

    fn serialize_f32(self, value: f32) -> CheckResult {
        ser::Serializer::serialize_f64(self, f64::from(value))
    }

    fn serialize_f64(self, value: f64) -> CheckResult {
        if value.is_finite() {
            Ok(())
        } else {
            Err(FiniteCheckError::NonFinite(value))
        }
    }

    fn serialize_char(self, _value: char) -> CheckResult {
        Ok(())
    }

    fn serialize_str(self, _value: &str) -> CheckResult {
        Ok(())
    }

    fn serialize_bytes(self, _value: &[u8]) -> CheckResult {
        Ok(())
    }

    fn serialize_none(self) -> CheckResult {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> CheckResult {
        value.serialize(self)
    }

    fn serialize_unit(self) -> CheckResult {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> CheckResult {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> CheckResult {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> CheckResult {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> CheckResult {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self, FiniteCheckError> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self, FiniteCheckError> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self, FiniteCheckError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, FiniteCheckError> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self, FiniteCheckError> {
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, FiniteCheckError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, FiniteCheckError> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteChecker {
    type Ok = ();
    type Error = FiniteCheckError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> CheckResult {
        value.serialize(FiniteChecker)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteChecker {
    type Ok = ();
    type Error = FiniteCheckError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> CheckResult {
        value.serialize(FiniteChecker)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteChecker {
    type Ok = ();
    type Error = FiniteCheckError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> CheckResult {
        value.serialize(FiniteChecker)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteChecker {
    type Ok = ();
    type Error = FiniteCheckError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> CheckResult {
        value.serialize(FiniteChecker)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteChecker {
    type Ok = ();
    type Error = FiniteCheckError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> CheckResult {
        key.serialize(FiniteChecker)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> CheckResult {
        value.serialize(FiniteChecker)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteChecker {
    type Ok = ();
    type Error = FiniteCheckError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> CheckResult {
        value.serialize(FiniteChecker)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteChecker {
    type Ok = ();
    type Error = FiniteCheckError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> CheckResult {
        value.serialize(FiniteChecker)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}
