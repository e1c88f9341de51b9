//! Boolean gates, `if`, `math`, `array-filter`, and the chainable
//! bump/twiddle nodes (spec §4.6 "Logic/Gate").

use cuegraph_core::node::{ConfigField, InputMap, NodeDefinition, NodeHooks};
use cuegraph_core::port::{Port, PortType};
use cuegraph_core::value::Value;
use cuegraph_core::{NodeRegistry, Result};
use std::sync::Arc;

fn unary_bool_def(node_type: &str, label: &str, f: fn(bool) -> bool) -> NodeDefinition {
    NodeDefinition {
        node_type: node_type.into(),
        label: label.into(),
        category: "logic".into(),
        inputs: vec![Port::data("a", "A", PortType::Boolean)],
        outputs: vec![Port::data("value", "Value", PortType::Boolean)],
        config_schema: vec![],
        hooks: NodeHooks {
            process: Some(Arc::new(move |inputs, _config, _ctx| {
                let a = inputs.get("a").map(Value::as_bool).unwrap_or(false);
                let mut out = InputMap::new();
                out.insert("value".into(), Value::Bool(f(a)));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn binary_bool_def(node_type: &str, label: &str, f: fn(bool, bool) -> bool) -> NodeDefinition {
    NodeDefinition {
        node_type: node_type.into(),
        label: label.into(),
        category: "logic".into(),
        inputs: vec![Port::data("a", "A", PortType::Boolean), Port::data("b", "B", PortType::Boolean)],
        outputs: vec![Port::data("value", "Value", PortType::Boolean)],
        config_schema: vec![],
        hooks: NodeHooks {
            process: Some(Arc::new(move |inputs, _config, _ctx| {
                let a = inputs.get("a").map(Value::as_bool).unwrap_or(false);
                let b = inputs.get("b").map(Value::as_bool).unwrap_or(false);
                let mut out = InputMap::new();
                out.insert("value".into(), Value::Bool(f(a, b)));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn if_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "if".into(),
        label: "If".into(),
        category: "logic".into(),
        inputs: vec![Port::data("cond", "Cond", PortType::Boolean), Port::data("value", "Value", PortType::Any)],
        outputs: vec![Port::data("then", "Then", PortType::Any), Port::data("else", "Else", PortType::Any)],
        config_schema: vec![],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, _config, _ctx| {
                let cond = inputs.get("cond").map(Value::as_bool).unwrap_or(false);
                let value = inputs.get("value").cloned().unwrap_or(Value::Null);
                let mut out = InputMap::new();
                out.insert("then".into(), if cond { value.clone() } else { Value::Null });
                out.insert("else".into(), if cond { Value::Null } else { value });
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn apply_math_op(op: &str, a: f64, b: f64) -> f64 {
    match op {
        "+" => a + b,
        "-" => a - b,
        "*" | "×" => a * b,
        "/" | "÷" => if b == 0.0 { 0.0 } else { a / b },
        "min" => a.min(b),
        "max" => a.max(b),
        "mod" => if b == 0.0 { 0.0 } else { a.rem_euclid(b) },
        "pow" => a.powf(b),
        _ => 0.0,
    }
}

fn math_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "math".into(),
        label: "Math".into(),
        category: "logic".into(),
        inputs: vec![Port::data("a", "A", PortType::Number), Port::data("b", "B", PortType::Number)],
        outputs: vec![Port::data("result", "Result", PortType::Number)],
        config_schema: vec![ConfigField::new("op", PortType::String, Value::Str("+".into()))],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, config, _ctx| {
                let a = inputs.get("a").map(Value::as_number).unwrap_or(0.0);
                let b = inputs.get("b").map(Value::as_number).unwrap_or(0.0);
                let op = config.get("op").map(Value::as_str_lossy).unwrap_or_else(|| "+".into());
                let mut out = InputMap::new();
                out.insert("result".into(), Value::Number(apply_math_op(&op, a, b)));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn array_filter_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "array-filter".into(),
        label: "Array Filter".into(),
        category: "logic".into(),
        inputs: vec![Port::data("a", "A", PortType::Array), Port::data("b", "B", PortType::Array)],
        outputs: vec![Port::data("result", "Result", PortType::Array)],
        config_schema: vec![],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, _config, _ctx| {
                let a = inputs.get("a").and_then(Value::as_array).map(|s| s.to_vec()).unwrap_or_default();
                let b = inputs.get("b").and_then(Value::as_array).map(|s| s.to_vec()).unwrap_or_default();
                let result: Vec<Value> = a.into_iter().filter(|v| !b.contains(v)).collect();
                let mut out = InputMap::new();
                out.insert("result".into(), Value::Array(result));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

/// A chainable bump/twiddle node: `value op amount`, `amount` overridable
/// both as config and as a wired input (spec §4.6 calls these "chainable").
fn bump_def(node_type: &str, label: &str, op: &'static str) -> NodeDefinition {
    NodeDefinition {
        node_type: node_type.into(),
        label: label.into(),
        category: "logic".into(),
        inputs: vec![Port::data("value", "Value", PortType::Number), Port::data("amount", "Amount", PortType::Number)],
        outputs: vec![Port::data("value", "Value", PortType::Number)],
        config_schema: vec![ConfigField::new("amount", PortType::Number, Value::Number(1.0))],
        hooks: NodeHooks {
            process: Some(Arc::new(move |inputs, config, _ctx| {
                let value = inputs.get("value").map(Value::as_number).unwrap_or(0.0);
                let amount_in = inputs.get("amount").cloned().unwrap_or(Value::Null);
                let amount = if amount_in.is_null() { config.get("amount").map(Value::as_number).unwrap_or(1.0) } else { amount_in.as_number() };
                let mut out = InputMap::new();
                out.insert("value".into(), Value::Number(apply_math_op(op, value, amount)));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

pub fn register(registry: &NodeRegistry) -> Result<()> {
    registry.register(unary_bool_def("not", "NOT", |a| !a))?;
    registry.register(binary_bool_def("and", "AND", |a, b| a && b))?;
    registry.register(binary_bool_def("or", "OR", |a, b| a || b))?;
    registry.register(binary_bool_def("xor", "XOR", |a, b| a != b))?;
    registry.register(binary_bool_def("nand", "NAND", |a, b| !(a && b)))?;
    registry.register(binary_bool_def("nor", "NOR", |a, b| !(a || b)))?;
    registry.register(if_def())?;
    registry.register(math_def())?;
    registry.register(array_filter_def())?;
    registry.register(bump_def("add", "Add", "+"))?;
    registry.register(bump_def("subtract", "Subtract", "-"))?;
    registry.register(bump_def("multiply", "Multiply", "*"))?;
    registry.register(bump_def("divide", "Divide", "/"))?;
    Ok(())
}
