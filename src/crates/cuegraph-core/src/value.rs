//! The opaque value box carried across ports.
//!
//! The original system conveys port values as dynamically-typed JS values;
//! a faithful statically-typed port still needs *some* representation for
//! "a number, or a color, or an array of effects, or nothing". [`Value`] is
//! that tagged union (see spec §9, "Dynamic port types").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An RGB color, `0..=255` per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn lerp(a: Rgb, b: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let ch = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
        Rgb { r: ch(a.r, b.r), g: ch(a.g, b.g), b: ch(a.b, b.b) }
    }
}

/// A single control command, as produced by processor nodes (spec §3, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cmd {
    pub action: String,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execute_at: Option<i64>,
}

/// One entry in a visual effect chain (spec §4.6 "Effects").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Effect {
    Ascii { cell_size: f64 },
    Convolution {
        #[serde(skip_serializing_if = "Option::is_none")]
        preset: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        kernel: Option<[f64; 9]>,
        mix: f64,
        bias: f64,
        normalize: bool,
        scale: f64,
    },
}

/// Opaque value box carried between node ports.
///
/// `process` coerces at its own boundary (spec §9); the runtime never
/// type-checks a `Value` against a port's declared [`crate::port::PortType`] —
/// mismatches simply surface as [`Value::Null`]/zero to the receiving node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
    Color(Rgb),
    Array(Vec<Value>),
    Effects(Vec<Effect>),
    Client(String),
    Command(Cmd),
    Commands(Vec<Cmd>),
    Object(HashMap<String, Value>),
    #[default]
    Null,
}

impl Value {
    /// Best-effort number-ification, per spec §9 "value-box semantics".
    ///
    /// Booleans become `0.0`/`1.0`, numeric strings parse, everything else
    /// (arrays, colors, commands, null) is `0.0`.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(b) => if *b { 1.0 } else { 0.0 },
            Value::Str(s) => s.parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty() && s != "false" && s != "0",
            Value::Null => false,
            _ => true,
        }
    }

    pub fn as_str_lossy(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_commands(&self) -> Vec<Cmd> {
        match self {
            Value::Command(c) => vec![c.clone()],
            Value::Commands(cs) => cs.clone(),
            Value::Array(items) => items.iter().flat_map(Value::as_commands).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical JSON used for command diffing and oscillation signatures
    /// (spec §4.5, §9 "Command diffing") — stable key order via `serde_json`'s
    /// `preserve_order`-free default map, which is already BTree-backed when
    /// the `preserve_order` feature is off.
    pub fn canonical_json(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| serde_json::to_string(&v).ok())
            .unwrap_or_default()
    }
}
