//! # Cypher Export
//!
//! Renders the graph as a Cypher script for bulk import into a property
//! graph store: one `CREATE` per node, then one `MATCH ... CREATE` per
//! relationship, each statement terminated by `;` on its own line. Nodes and
//! relationships appear in id order, so the same graph always renders the
//! same script.

use serde_json::Value;

use crate::mapper::GraphMapper;

/// Quote a string as a single-quoted Cypher literal.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Backtick an identifier unless it is a plain word.
fn ident(s: &str) -> String {
    let plain = s
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        s.to_string()
    } else {
        format!("`{}`", s.replace('`', "``"))
    }
}

fn literal(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(quote(s)),
        Value::Array(items) if items.iter().all(|i| i.is_string() || i.is_number() || i.is_boolean()) => {
            let parts: Vec<String> = items.iter().filter_map(literal).collect();
            Some(format!("[{}]", parts.join(", ")))
        }
        // Nested structures have no Cypher property equivalent.
        other => Some(quote(&other.to_string())),
    }
}

fn property_map<'a>(id: &str, props: impl Iterator<Item = (&'a String, &'a Value)>) -> String {
    let mut parts = vec![format!("id: {}", quote(id))];
    for (k, v) in props {
        if k == "id" {
            continue;
        }
        if let Some(lit) = literal(v) {
            parts.push(format!("{}: {lit}", ident(k)));
        }
    }
    format!("{{{}}}", parts.join(", "))
}

impl GraphMapper {
    /// Cypher statements recreating the current graph.
    pub fn export_to_cypher(&self) -> String {
        let mut out = String::new();
        for node in self.nodes() {
            let labels: String = node.labels.iter().map(|l| format!(":{}", ident(l))).collect();
            out.push_str(&format!(
                "CREATE (n{labels} {});\n",
                property_map(&node.id, node.properties.iter())
            ));
        }
        for rel in self.relationships() {
            out.push_str(&format!(
                "MATCH (a {{id: {}}}), (b {{id: {}}}) CREATE (a)-[:{} {}]->(b);\n",
                quote(&rel.from),
                quote(&rel.to),
                rel.rel_type.as_str(),
                property_map(&rel.id, rel.properties.iter()),
            ));
        }
        out
    }
}
