//! Read-only typed field tree.
//!
//! The engine consumes animation and skinning data from an already-parsed
//! asset, exposed as a tree of named, typed fields. This module is that
//! boundary: a [`Record`] is one object from the asset (a controller, a key
//! block, a skin partition), holding scalar fields, typed arrays, nested
//! records and record arrays, all looked up by name. The engine never
//! writes back into this tree; records are shared via `Arc` so controllers
//! can re-derive baseline state from them at any time.
//!
//! Typed getters return `Option` and tolerate both absence and type
//! mismatch; callers decide (per their own error policy) whether a missing
//! field is fatal, a default, or a skip.

use glam::{Quat, Vec2, Vec3, Vec4};

/// A single typed field value.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    UInt(u32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Quat(Quat),
    Color4(Vec4),
    Text(String),
    Texts(Vec<String>),
    Bytes(Vec<u8>),
    Shorts(Vec<i16>),
    UShorts(Vec<u16>),
    UInts(Vec<u32>),
    Floats(Vec<f32>),
    Vec3s(Vec<Vec3>),
    Quats(Vec<Quat>),
    Color4s(Vec<Vec4>),
    Record(Record),
    Records(Vec<Record>),
}

/// One object from the parsed asset: a kind tag plus named fields.
#[derive(Debug, Clone, Default)]
pub struct Record {
    kind: String,
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Starts building a record of the given kind.
    #[must_use]
    pub fn build(kind: &str) -> RecordBuilder {
        RecordBuilder {
            record: Record {
                kind: kind.to_string(),
                fields: Vec::new(),
            },
        }
    }

    /// The record's kind tag (what the asset declares this object to be).
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Raw field lookup.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn boolean(&self, field: &str) -> Option<bool> {
        match self.get(field)? {
            Value::Bool(v) => Some(*v),
            Value::UInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    #[must_use]
    pub fn uint(&self, field: &str) -> Option<u32> {
        match self.get(field)? {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn float(&self, field: &str) -> Option<f32> {
        match self.get(field)? {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn vec2(&self, field: &str) -> Option<Vec2> {
        match self.get(field)? {
            Value::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn vec3(&self, field: &str) -> Option<Vec3> {
        match self.get(field)? {
            Value::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn quat(&self, field: &str) -> Option<Quat> {
        match self.get(field)? {
            Value::Quat(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn color4(&self, field: &str) -> Option<Vec4> {
        match self.get(field)? {
            Value::Color4(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        match self.get(field)? {
            Value::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// String-array field; empty slice when absent or mistyped.
    #[must_use]
    pub fn texts(&self, field: &str) -> &[String] {
        match self.get(field) {
            Some(Value::Texts(v)) => v,
            _ => &[],
        }
    }

    #[must_use]
    pub fn bytes(&self, field: &str) -> Option<&[u8]> {
        match self.get(field)? {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn shorts(&self, field: &str) -> Option<&[i16]> {
        match self.get(field)? {
            Value::Shorts(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn ushorts(&self, field: &str) -> Option<&[u16]> {
        match self.get(field)? {
            Value::UShorts(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn uints(&self, field: &str) -> Option<&[u32]> {
        match self.get(field)? {
            Value::UInts(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn floats(&self, field: &str) -> Option<&[f32]> {
        match self.get(field)? {
            Value::Floats(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn vec3s(&self, field: &str) -> Option<&[Vec3]> {
        match self.get(field)? {
            Value::Vec3s(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn quats(&self, field: &str) -> Option<&[Quat]> {
        match self.get(field)? {
            Value::Quats(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn color4s(&self, field: &str) -> Option<&[Vec4]> {
        match self.get(field)? {
            Value::Color4s(v) => Some(v),
            _ => None,
        }
    }

    /// Nested child record.
    #[must_use]
    pub fn child(&self, field: &str) -> Option<&Record> {
        match self.get(field)? {
            Value::Record(v) => Some(v),
            _ => None,
        }
    }

    /// Child record array; empty slice when absent.
    #[must_use]
    pub fn children(&self, field: &str) -> &[Record] {
        match self.get(field) {
            Some(Value::Records(v)) => v,
            _ => &[],
        }
    }
}

/// Builder for assembling records (hosts adapting a parser, and tests).
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Adds a field. Later fields with the same name are shadowed by the
    /// first, matching read-order semantics of the source format.
    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.record.fields.push((field.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn finish(self) -> Record {
        self.record
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })+
    };
}

impl_value_from! {
    bool => Bool,
    u32 => UInt,
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Quat => Quat,
    Vec4 => Color4,
    String => Text,
    Vec<String> => Texts,
    Vec<u8> => Bytes,
    Vec<i16> => Shorts,
    Vec<u16> => UShorts,
    Vec<u32> => UInts,
    Vec<f32> => Floats,
    Vec<Vec3> => Vec3s,
    Vec<Quat> => Quats,
    Vec<Vec4> => Color4s,
    Record => Record,
    Vec<Record> => Records,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::Texts(v.into_iter().map(str::to_string).collect())
    }
}
