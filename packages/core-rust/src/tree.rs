//! Flat list -> nested forest conversion for adjacency-list records.

use std::collections::{HashMap, HashSet};

use crate::types::{Fields, Value};

/// Column names used when nesting rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeShape {
    pub id: String,
    pub pid: String,
    pub children: String,
}

impl Default for TreeShape {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            pid: "pid".to_string(),
            children: "children".to_string(),
        }
    }
}

/// Nests `rows` into a forest.
///
/// A row whose parent id is absent from `rows` becomes a root. Input order is
/// preserved among siblings. `transform` runs on every row before nesting.
/// Rows that only reach each other through a parent cycle are dropped.
#[must_use]
pub fn list_to_tree(
    rows: Vec<Fields>,
    shape: &TreeShape,
    transform: Option<&dyn Fn(Fields) -> Fields>,
) -> Vec<Value> {
    let ids: Vec<String> = rows
        .iter()
        .map(|row| row.get(&shape.id).map(Value::to_text).unwrap_or_default())
        .collect();
    let known: HashSet<&str> = ids.iter().map(String::as_str).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        let parent = row.get(&shape.pid).map(Value::to_text);
        match parent {
            Some(pid) if known.contains(pid.as_str()) && pid != ids[index] => {
                children.entry(pid).or_default().push(index);
            }
            _ => roots.push(index),
        }
    }

    let mut nodes: Vec<Option<Fields>> = rows
        .into_iter()
        .map(|row| match transform {
            Some(t) => Some(t(row)),
            None => Some(row),
        })
        .collect();

    roots
        .into_iter()
        .filter_map(|index| build(index, &ids, &children, &mut nodes, shape))
        .collect()
}

fn build(
    index: usize,
    ids: &[String],
    children: &HashMap<String, Vec<usize>>,
    nodes: &mut [Option<Fields>],
    shape: &TreeShape,
) -> Option<Value> {
    let mut node = nodes[index].take()?;
    if let Some(child_indexes) = children.get(&ids[index]) {
        let nested: Vec<Value> = child_indexes
            .iter()
            .filter_map(|&child| build(child, ids, children, nodes, shape))
            .collect();
        if !nested.is_empty() {
            node.insert(shape.children.clone(), Value::Array(nested));
        }
    }
    Some(Value::Map(node))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, pid: i64, name: &str) -> Fields {
        Fields::from([
            ("id".to_string(), Value::Int(id)),
            ("pid".to_string(), Value::Int(pid)),
            ("name".to_string(), Value::from(name)),
        ])
    }

    #[test]
    fn nests_children_under_parents() {
        let rows = vec![row(1, 0, "root"), row(2, 1, "child"), row(3, 2, "leaf"), row(4, 0, "other")];
        let forest = list_to_tree(rows, &TreeShape::default(), None);
        let json = serde_json::Value::from(Value::Array(forest));
        assert_eq!(json[0]["name"], "root");
        assert_eq!(json[0]["children"][0]["name"], "child");
        assert_eq!(json[0]["children"][0]["children"][0]["name"], "leaf");
        assert_eq!(json[1]["name"], "other");
        assert!(json[1].get("children").is_none());
    }

    #[test]
    fn orphan_becomes_root_and_transform_applies() {
        let rows = vec![row(5, 99, "orphan")];
        let upper = |mut fields: Fields| {
            let name = fields["name"].to_text().to_uppercase();
            fields.insert("name".to_string(), Value::from(name));
            fields
        };
        let forest = list_to_tree(rows, &TreeShape::default(), Some(&upper));
        let json = serde_json::Value::from(Value::Array(forest));
        assert_eq!(json[0]["name"], "ORPHAN");
    }

    #[test]
    fn cycles_are_dropped() {
        let rows = vec![row(1, 2, "a"), row(2, 1, "b"), row(3, 0, "c")];
        let forest = list_to_tree(rows, &TreeShape::default(), None);
        assert_eq!(forest.len(), 1);
    }
}
