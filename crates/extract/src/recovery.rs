//! Recovery of a [`Graph`] from model output that is only loosely JSON.
//!
//! The stages run in order and each one is usable on its own:
//!
//! 1. [`strip_fences`] drops markdown code fence markers
//! 2. [`locate_candidate`] narrows the text to the object that should hold the graph,
//!    synthesizing outer braces when the model left them off
//! 3. [`parse_strict`] tries standard JSON
//! 4. [`parse_lenient`] falls back to the Python-literal reader
//! 5. [`graph_from_value`] maps the parsed value onto nodes and edges
//!
//! [`recover_graph`] chains them.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ExtractError;
use crate::literal::{self, LiteralError};
use crate::schema::{Edge, Graph, Node};

pub const UNKNOWN_NODE_TYPE: &str = "Unknown";

static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```(?:json)?").unwrap());

/// Remove every ```` ```json ```` and ```` ``` ```` marker, keeping the fenced content and any
/// prose around it.
pub fn strip_fences(raw: &str) -> Cow<'_, str> {
    if raw.contains("```") {
        FENCE.replace_all(raw, "")
    } else {
        Cow::Borrowed(raw)
    }
}

/// Narrow `text` to the substring most likely to hold the graph object.
///
/// When the `nodes` key comes before any `{`, the model dropped the enclosing braces: the
/// candidate runs from the key through the last `}` or `]` and is wrapped in a new pair of
/// braces. Otherwise it runs from the first `{` through the last `}`. Both spans are greedy, so
/// unrelated braces after the graph are captured too.
pub fn locate_candidate(text: &str) -> Result<Cow<'_, str>, ExtractError> {
    let open = text.find('{');
    let key = nodes_key_position(text);

    match (key, open) {
        (Some(key), open) if open.is_none_or(|open| key < open) => {
            let close = text.rfind('}').max(text.rfind(']'));
            match close {
                Some(close) if close > key => {
                    Ok(Cow::Owned(format!("{{{}}}", &text[key..=close])))
                }
                _ => Err(ExtractError::UnrecoverableStructure),
            }
        }
        (_, Some(open)) => match text.rfind('}') {
            Some(close) if close > open => Ok(Cow::Borrowed(&text[open..=close])),
            _ => Err(ExtractError::UnrecoverableStructure),
        },
        _ => Err(ExtractError::UnrecoverableStructure),
    }
}

/// Earliest `"nodes"` or `'nodes'` key literal.
fn nodes_key_position(text: &str) -> Option<usize> {
    let double = text.find("\"nodes\"");
    let single = text.find("'nodes'");
    match (double, single) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

pub fn parse_strict(candidate: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(candidate)
}

pub fn parse_lenient(candidate: &str) -> Result<Value, LiteralError> {
    literal::parse_literal(candidate)
}

/// Map a parsed value onto a graph.
///
/// The top level must be an object. Missing `nodes` or `edges` keys read as empty lists.
/// Entries that cannot form a node (no usable `id`) or an edge (no `source` / `target`) are
/// dropped; other missing fields fall back to defaults. Numbers and booleans in string fields
/// are stringified.
pub fn graph_from_value(value: Value) -> Result<Graph, ExtractError> {
    let mut root = match value {
        Value::Object(root) => root,
        other => {
            return Err(ExtractError::InvalidShape(format!(
                "expected an object, found {}",
                type_name(&other)
            )));
        }
    };

    let nodes = take_list(&mut root, "nodes")?;
    let edges = take_list(&mut root, "edges")?;

    let nodes_in = nodes.len();
    let edges_in = edges.len();
    let graph = Graph {
        nodes: nodes.into_iter().filter_map(node_from_value).collect(),
        edges: edges.into_iter().filter_map(edge_from_value).collect(),
    };

    if graph.nodes.len() < nodes_in || graph.edges.len() < edges_in {
        tracing::debug!(
            dropped_nodes = nodes_in - graph.nodes.len(),
            dropped_edges = edges_in - graph.edges.len(),
            "Dropped malformed graph entries"
        );
    }

    Ok(graph)
}

/// Run every stage on raw model output.
pub fn recover_graph(raw: &str) -> Result<Graph, ExtractError> {
    let text = strip_fences(raw);
    let candidate = locate_candidate(&text)?;

    let value = match parse_strict(&candidate) {
        Ok(value) => value,
        Err(strict) => {
            tracing::debug!(error = %strict, "Strict JSON parse failed, trying lenient parse");
            parse_lenient(&candidate).map_err(|lenient| ExtractError::ParseFailure {
                strict: strict.to_string(),
                lenient: lenient.to_string(),
            })?
        }
    };

    graph_from_value(value)
}

fn take_list(root: &mut Map<String, Value>, key: &str) -> Result<Vec<Value>, ExtractError> {
    match root.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(ExtractError::InvalidShape(format!(
            "\"{}\" is {}, expected an array",
            key,
            type_name(&other)
        ))),
    }
}

fn node_from_value(value: Value) -> Option<Node> {
    let Value::Object(obj) = value else {
        return None;
    };
    let id = text_field(&obj, "id").filter(|id| !id.is_empty())?;
    let label = text_field(&obj, "label")
        .or_else(|| text_field(&obj, "name"))
        .unwrap_or_else(|| id.clone());

    Some(Node {
        node_type: text_field(&obj, "type").unwrap_or_else(|| UNKNOWN_NODE_TYPE.to_string()),
        details: text_field(&obj, "details").unwrap_or_default(),
        id,
        label,
    })
}

fn edge_from_value(value: Value) -> Option<Edge> {
    let Value::Object(obj) = value else {
        return None;
    };

    Some(Edge {
        source: text_field(&obj, "source")?,
        target: text_field(&obj, "target")?,
        label: text_field(&obj, "label").unwrap_or_default(),
        details: text_field(&obj, "details").unwrap_or_default(),
    })
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
