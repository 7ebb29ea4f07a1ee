//! Channel values and their raw byte encoding.
//!
//! A [`Value`] is one of three shapes: a numeric [`Scalar`], a fixed-shape
//! numeric [`Array`] or a string. Encoding casts numeric elements to the
//! declared [`DataType`] and writes them in the declared [`ByteOrder`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Element type of a channel as named in the data header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    #[default]
    Float64,
    String,
}

impl DataType {
    pub const ALL: [DataType; 12] = [
        DataType::Bool,
        DataType::Int8,
        DataType::Uint8,
        DataType::Int16,
        DataType::Uint16,
        DataType::Int32,
        DataType::Uint32,
        DataType::Int64,
        DataType::Uint64,
        DataType::Float32,
        DataType::Float64,
        DataType::String,
    ];

    /// Size of one element in bytes; `None` for variable-length strings.
    pub fn element_size(self) -> Option<usize> {
        match self {
            DataType::Bool | DataType::Int8 | DataType::Uint8 => Some(1),
            DataType::Int16 | DataType::Uint16 => Some(2),
            DataType::Int32 | DataType::Uint32 | DataType::Float32 => Some(4),
            DataType::Int64 | DataType::Uint64 | DataType::Float64 => Some(8),
            DataType::String => None,
        }
    }

    /// Wire name, e.g. `"uint16"`.
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int8 => "int8",
            DataType::Uint8 => "uint8",
            DataType::Int16 => "int16",
            DataType::Uint16 => "uint16",
            DataType::Int32 => "int32",
            DataType::Uint32 => "uint32",
            DataType::Int64 => "int64",
            DataType::Uint64 => "uint64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::String => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|data_type| data_type.as_str() == s)
            .ok_or_else(|| format!("unknown channel type: {s}"))
    }
}

/// Byte order of a channel's value and timestamp frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the running machine.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ByteOrder::Little => "little",
            ByteOrder::Big => "big",
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single numeric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Bool(_) => DataType::Bool,
            Scalar::I8(_) => DataType::Int8,
            Scalar::U8(_) => DataType::Uint8,
            Scalar::I16(_) => DataType::Int16,
            Scalar::U16(_) => DataType::Uint16,
            Scalar::I32(_) => DataType::Int32,
            Scalar::U32(_) => DataType::Uint32,
            Scalar::I64(_) => DataType::Int64,
            Scalar::U64(_) => DataType::Uint64,
            Scalar::F32(_) => DataType::Float32,
            Scalar::F64(_) => DataType::Float64,
        }
    }

    /// Lossy conversion for display and statistics.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Bool(v) => v.as_f64(),
            Scalar::I8(v) => v.as_f64(),
            Scalar::U8(v) => v.as_f64(),
            Scalar::I16(v) => v.as_f64(),
            Scalar::U16(v) => v.as_f64(),
            Scalar::I32(v) => v.as_f64(),
            Scalar::U32(v) => v.as_f64(),
            Scalar::I64(v) => v.as_f64(),
            Scalar::U64(v) => v.as_f64(),
            Scalar::F32(v) => v.as_f64(),
            Scalar::F64(v) => v,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::I8(v) => write!(f, "{v}"),
            Scalar::U8(v) => write!(f, "{v}"),
            Scalar::I16(v) => write!(f, "{v}"),
            Scalar::U16(v) => write!(f, "{v}"),
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::U32(v) => write!(f, "{v}"),
            Scalar::I64(v) => write!(f, "{v}"),
            Scalar::U64(v) => write!(f, "{v}"),
            Scalar::F32(v) => write!(f, "{v}"),
            Scalar::F64(v) => write!(f, "{v}"),
        }
    }
}

/// Flat element storage of an [`Array`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! with_elements {
    ($data:expr, $elements:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($elements) => $body,
            ArrayData::I8($elements) => $body,
            ArrayData::U8($elements) => $body,
            ArrayData::I16($elements) => $body,
            ArrayData::U16($elements) => $body,
            ArrayData::I32($elements) => $body,
            ArrayData::U32($elements) => $body,
            ArrayData::I64($elements) => $body,
            ArrayData::U64($elements) => $body,
            ArrayData::F32($elements) => $body,
            ArrayData::F64($elements) => $body,
        }
    };
}

impl ArrayData {
    pub fn len(&self) -> usize {
        with_elements!(self, elements => elements.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ArrayData::Bool(_) => DataType::Bool,
            ArrayData::I8(_) => DataType::Int8,
            ArrayData::U8(_) => DataType::Uint8,
            ArrayData::I16(_) => DataType::Int16,
            ArrayData::U16(_) => DataType::Uint16,
            ArrayData::I32(_) => DataType::Int32,
            ArrayData::U32(_) => DataType::Uint32,
            ArrayData::I64(_) => DataType::Int64,
            ArrayData::U64(_) => DataType::Uint64,
            ArrayData::F32(_) => DataType::Float32,
            ArrayData::F64(_) => DataType::Float64,
        }
    }

    /// Element at `index` as a [`Scalar`].
    pub fn get(&self, index: usize) -> Option<Scalar> {
        match self {
            ArrayData::Bool(v) => v.get(index).copied().map(Scalar::Bool),
            ArrayData::I8(v) => v.get(index).copied().map(Scalar::I8),
            ArrayData::U8(v) => v.get(index).copied().map(Scalar::U8),
            ArrayData::I16(v) => v.get(index).copied().map(Scalar::I16),
            ArrayData::U16(v) => v.get(index).copied().map(Scalar::U16),
            ArrayData::I32(v) => v.get(index).copied().map(Scalar::I32),
            ArrayData::U32(v) => v.get(index).copied().map(Scalar::U32),
            ArrayData::I64(v) => v.get(index).copied().map(Scalar::I64),
            ArrayData::U64(v) => v.get(index).copied().map(Scalar::U64),
            ArrayData::F32(v) => v.get(index).copied().map(Scalar::F32),
            ArrayData::F64(v) => v.get(index).copied().map(Scalar::F64),
        }
    }
}

/// Numeric elements with a fixed shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    data: ArrayData,
    shape: Vec<u32>,
}

impl Array {
    /// Build an array, checking that `shape` covers exactly the elements.
    pub fn new(data: ArrayData, shape: Vec<u32>) -> Result<Self, CodecError> {
        let expected = checked_count(&shape)?;
        if expected != data.len() {
            return Err(CodecError::ShapeMismatch {
                expected,
                found: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn shape(&self) -> &[u32] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }
}

/// A channel value for one pulse.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Array(Array),
    String(String),
}

impl Value {
    /// Element type a channel carrying this value would declare.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Scalar(scalar) => scalar.data_type(),
            Value::Array(array) => array.data.data_type(),
            Value::String(_) => DataType::String,
        }
    }

    /// Shape a channel carrying this value would declare.
    pub fn shape(&self) -> Vec<u32> {
        match self {
            Value::Array(array) => array.shape.clone(),
            Value::Scalar(_) | Value::String(_) => vec![1],
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(scalar) => write!(f, "{scalar}"),
            Value::String(s) => f.write_str(s),
            Value::Array(array) => {
                const PREVIEW: usize = 4;
                f.write_str("[")?;
                for index in 0..array.len().min(PREVIEW) {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    if let Some(element) = array.data.get(index) {
                        write!(f, "{element}")?;
                    }
                }
                if array.len() > PREVIEW {
                    write!(f, ", ... ({} elements)", array.len())?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! impl_from_numeric {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Scalar {
                fn from(v: $t) -> Self {
                    Scalar::$variant(v)
                }
            }

            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Scalar(Scalar::$variant(v))
                }
            }

            impl From<Vec<$t>> for ArrayData {
                fn from(v: Vec<$t>) -> Self {
                    ArrayData::$variant(v)
                }
            }

            impl From<Vec<$t>> for Array {
                fn from(v: Vec<$t>) -> Self {
                    let shape = vec![v.len() as u32];
                    Array { data: ArrayData::$variant(v), shape }
                }
            }

            impl From<Vec<$t>> for Value {
                fn from(v: Vec<$t>) -> Self {
                    Value::Array(Array::from(v))
                }
            }
        )*
    };
}

impl_from_numeric!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        Value::Scalar(v)
    }
}

impl From<Array> for Value {
    fn from(v: Array) -> Self {
        Value::Array(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// Number of elements described by a shape. An empty shape is one element.
///
/// `None` if the product overflows `usize`.
pub fn element_count(shape: &[u32]) -> Option<usize> {
    shape
        .iter()
        .try_fold(1usize, |count, dim| count.checked_mul(*dim as usize))
}

fn checked_count(shape: &[u32]) -> Result<usize, CodecError> {
    element_count(shape).ok_or_else(|| CodecError::ShapeOverflow(shape.to_vec()))
}

/// Numeric `as` casts used when a value is written as another element type.
trait Element: Copy {
    fn as_bool(self) -> bool;
    fn as_i64(self) -> i64;
    fn as_u64(self) -> u64;
    fn as_f32(self) -> f32;
    fn as_f64(self) -> f64;
}

macro_rules! impl_element {
    ($($t:ty),*) => {
        $(
            impl Element for $t {
                fn as_bool(self) -> bool {
                    self != 0 as $t
                }
                fn as_i64(self) -> i64 {
                    self as i64
                }
                fn as_u64(self) -> u64 {
                    self as u64
                }
                fn as_f32(self) -> f32 {
                    self as f32
                }
                fn as_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_element!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl Element for bool {
    fn as_bool(self) -> bool {
        self
    }
    fn as_i64(self) -> i64 {
        i64::from(self)
    }
    fn as_u64(self) -> u64 {
        u64::from(self)
    }
    fn as_f32(self) -> f32 {
        f32::from(u8::from(self))
    }
    fn as_f64(self) -> f64 {
        f64::from(u8::from(self))
    }
}

macro_rules! put {
    ($out:expr, $order:expr, $value:expr) => {
        match $order {
            ByteOrder::Little => $out.extend_from_slice(&$value.to_le_bytes()),
            ByteOrder::Big => $out.extend_from_slice(&$value.to_be_bytes()),
        }
    };
}

fn write_elements<T: Element>(
    elements: &[T],
    data_type: DataType,
    order: ByteOrder,
    out: &mut Vec<u8>,
) {
    for element in elements.iter().copied() {
        match data_type {
            DataType::Bool => out.push(u8::from(element.as_bool())),
            DataType::Int8 => out.push(element.as_i64() as i8 as u8),
            DataType::Uint8 => out.push(element.as_u64() as u8),
            DataType::Int16 => put!(out, order, element.as_i64() as i16),
            DataType::Uint16 => put!(out, order, element.as_u64() as u16),
            DataType::Int32 => put!(out, order, element.as_i64() as i32),
            DataType::Uint32 => put!(out, order, element.as_u64() as u32),
            DataType::Int64 => put!(out, order, element.as_i64()),
            DataType::Uint64 => put!(out, order, element.as_u64()),
            DataType::Float32 => put!(out, order, element.as_f32()),
            DataType::Float64 => put!(out, order, element.as_f64()),
            // Strings never reach here; `encode` rejects numeric values for them.
            DataType::String => {}
        }
    }
}

/// Encode `value` as raw bytes of the declared type, shape and byte order.
pub fn encode(
    value: &Value,
    data_type: DataType,
    shape: &[u32],
    order: ByteOrder,
) -> Result<Vec<u8>, CodecError> {
    match (value, data_type) {
        (Value::String(s), DataType::String) => return Ok(s.as_bytes().to_vec()),
        (Value::String(_), _) | (_, DataType::String) => {
            return Err(CodecError::TypeMismatch {
                expected: data_type,
                found: value.data_type(),
            })
        }
        _ => {}
    }

    let count = match value {
        Value::Array(array) => array.len(),
        _ => 1,
    };
    let expected = checked_count(shape)?;
    if count != expected {
        return Err(CodecError::ShapeMismatch {
            expected,
            found: count,
        });
    }

    let size = data_type.element_size().unwrap_or(1);
    let mut out = Vec::with_capacity(size * count);
    match value {
        Value::Scalar(scalar) => match *scalar {
            Scalar::Bool(v) => write_elements(&[v], data_type, order, &mut out),
            Scalar::I8(v) => write_elements(&[v], data_type, order, &mut out),
            Scalar::U8(v) => write_elements(&[v], data_type, order, &mut out),
            Scalar::I16(v) => write_elements(&[v], data_type, order, &mut out),
            Scalar::U16(v) => write_elements(&[v], data_type, order, &mut out),
            Scalar::I32(v) => write_elements(&[v], data_type, order, &mut out),
            Scalar::U32(v) => write_elements(&[v], data_type, order, &mut out),
            Scalar::I64(v) => write_elements(&[v], data_type, order, &mut out),
            Scalar::U64(v) => write_elements(&[v], data_type, order, &mut out),
            Scalar::F32(v) => write_elements(&[v], data_type, order, &mut out),
            Scalar::F64(v) => write_elements(&[v], data_type, order, &mut out),
        },
        Value::Array(array) => {
            with_elements!(&array.data, elements => write_elements(elements, data_type, order, &mut out))
        }
        Value::String(_) => {}
    }
    Ok(out)
}

fn to_array<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(chunk);
    buf
}

macro_rules! read_elements {
    ($bytes:expr, $order:expr, $t:ty) => {{
        const N: usize = std::mem::size_of::<$t>();
        $bytes
            .chunks_exact(N)
            .map(|chunk| match $order {
                ByteOrder::Little => <$t>::from_le_bytes(to_array::<N>(chunk)),
                ByteOrder::Big => <$t>::from_be_bytes(to_array::<N>(chunk)),
            })
            .collect::<Vec<$t>>()
    }};
}

/// Decode raw bytes declared as `data_type`/`shape`/`order`.
///
/// A shape of `[1]` yields a [`Value::Scalar`]; any other numeric shape an
/// [`Value::Array`].
pub fn decode(
    bytes: &[u8],
    data_type: DataType,
    shape: &[u32],
    order: ByteOrder,
) -> Result<Value, CodecError> {
    let Some(size) = data_type.element_size() else {
        return Ok(Value::String(String::from_utf8(bytes.to_vec())?));
    };

    let expected = checked_count(shape)?
        .checked_mul(size)
        .ok_or_else(|| CodecError::ShapeOverflow(shape.to_vec()))?;
    if bytes.len() != expected {
        return Err(CodecError::Length {
            expected,
            found: bytes.len(),
        });
    }

    let data = match data_type {
        DataType::Bool => ArrayData::Bool(bytes.iter().map(|b| *b != 0).collect()),
        DataType::Int8 => ArrayData::I8(bytes.iter().map(|b| *b as i8).collect()),
        DataType::Uint8 => ArrayData::U8(bytes.to_vec()),
        DataType::Int16 => ArrayData::I16(read_elements!(bytes, order, i16)),
        DataType::Uint16 => ArrayData::U16(read_elements!(bytes, order, u16)),
        DataType::Int32 => ArrayData::I32(read_elements!(bytes, order, i32)),
        DataType::Uint32 => ArrayData::U32(read_elements!(bytes, order, u32)),
        DataType::Int64 => ArrayData::I64(read_elements!(bytes, order, i64)),
        DataType::Uint64 => ArrayData::U64(read_elements!(bytes, order, u64)),
        DataType::Float32 => ArrayData::F32(read_elements!(bytes, order, f32)),
        DataType::Float64 => ArrayData::F64(read_elements!(bytes, order, f64)),
        DataType::String => return Ok(Value::String(String::from_utf8(bytes.to_vec())?)),
    };

    if shape == [1] {
        if let Some(scalar) = data.get(0) {
            return Ok(Value::Scalar(scalar));
        }
    }
    Ok(Value::Array(Array {
        data,
        shape: shape.to_vec(),
    }))
}
