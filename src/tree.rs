//! The config tree and decoder (§4.5): builds an arena of classes from
//! parsed nodes, resolving inheritance references at class-definition
//! time and coercing scalar values.

use indexmap::IndexMap;

use crate::error::{Error, Position};
use crate::parser::Node;
use crate::value::{self, Value};

/// A non-owning index into `Tree`'s class arena (§9 — avoids
/// `Rc`/`Weak` cycle bookkeeping for `inherits`/`parent` back-links).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassId(usize);

#[derive(Debug, Clone)]
struct ClassData {
    name: String,
    inherits: Option<ClassId>,
    parent: Option<ClassId>,
    entries: IndexMap<String, Child>,
}

#[derive(Debug, Clone)]
enum Child {
    Class(ClassId),
    Value(String, Value),
}

/// A resolved child, borrowed out of a `Class`'s entries.
#[derive(Debug, Clone, Copy)]
pub enum ChildRef<'a> {
    Class(ClassId),
    Value(&'a Value),
}

/// The decoded config tree.
#[derive(Debug, Clone)]
pub struct Tree {
    classes: Vec<ClassData>,
    root: ClassId,
}

impl Tree {
    pub(crate) fn decode(unit_name: &str, nodes: Vec<Node>) -> Result<Tree, Error> {
        let mut tree = Tree {
            classes: vec![ClassData {
                name: unit_name.to_string(),
                inherits: None,
                parent: None,
                entries: IndexMap::new(),
            }],
            root: ClassId(0),
        };
        decode_body(&mut tree, tree.root, nodes)?;
        Ok(tree)
    }

    /// Builds a tree from a plain nested mapping (§6 `from_dict`), the
    /// inverse of `to_value` for pure-data (non-inheriting) mappings.
    pub fn from_mapping(name: &str, value: &Value) -> Result<Tree, Error> {
        let Value::Map(map) = value else {
            return Err(Error::NotAMapping(describe_kind(value)));
        };
        let mut tree = Tree {
            classes: vec![ClassData {
                name: name.to_string(),
                inherits: None,
                parent: None,
                entries: IndexMap::new(),
            }],
            root: ClassId(0),
        };
        fill_from_mapping(&mut tree, tree.root, map)?;
        Ok(tree)
    }

    pub fn root(&self) -> Class<'_> {
        self.class(self.root)
    }

    pub fn root_id(&self) -> ClassId {
        self.root
    }

    pub fn class(&self, id: ClassId) -> Class<'_> {
        Class { tree: self, id }
    }

    /// Flattens the tree into a plain nested `Value::Map` (§6 `to_dict`):
    /// each class becomes a map, walked inherited-then-own like `iter()`.
    pub fn to_value(&self) -> Value {
        class_to_value(self, self.root)
    }

    fn data(&self, id: ClassId) -> &ClassData {
        &self.classes[id.0]
    }
}

/// A borrowed view of one class in a `Tree`.
#[derive(Clone, Copy)]
pub struct Class<'a> {
    tree: &'a Tree,
    id: ClassId,
}

impl<'a> Class<'a> {
    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn name(&self) -> &'a str {
        &self.tree.data(self.id).name
    }

    pub fn inherits_name(&self) -> Option<&'a str> {
        self.tree
            .data(self.id)
            .inherits
            .map(|id| self.tree.data(id).name.as_str())
    }

    pub(crate) fn tree(&self) -> &'a Tree {
        self.tree
    }

    /// Case-insensitive lookup: own entries, then the `inherits` chain,
    /// then the `parent` chain (§3 invariant).
    pub fn get(&self, key: &str) -> Option<ChildRef<'a>> {
        get_rec(self.tree, self.id, &key.to_lowercase())
    }

    /// This class's own entries only, in insertion order — what the
    /// encoder walks (§4.6).
    pub fn own_entries(&self) -> impl Iterator<Item = (&'a str, ChildRef<'a>)> {
        let tree = self.tree;
        tree.data(self.id).entries.values().map(move |child| match child {
            Child::Class(cid) => (tree.data(*cid).name.as_str(), ChildRef::Class(*cid)),
            Child::Value(name, v) => (name.as_str(), ChildRef::Value(v)),
        })
    }

    /// Inherited keys (recursively, via `inherits`) before own keys, in
    /// insertion order (§3 invariant, §8 scenario 6).
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, ChildRef<'a>)> {
        let mut out = Vec::new();
        if let Some(inh) = self.tree.data(self.id).inherits {
            out.extend(self.tree.class(inh).iter());
        }
        out.extend(self.own_entries());
        out.into_iter()
    }

    pub fn to_value(&self) -> Value {
        class_to_value(self.tree, self.id)
    }
}

fn get_rec<'a>(tree: &'a Tree, id: ClassId, key: &str) -> Option<ChildRef<'a>> {
    let data = tree.data(id);
    if let Some(child) = data.entries.get(key) {
        return Some(match child {
            Child::Class(cid) => ChildRef::Class(*cid),
            Child::Value(_, v) => ChildRef::Value(v),
        });
    }
    if let Some(inh) = data.inherits {
        if let Some(found) = get_rec(tree, inh, key) {
            return Some(found);
        }
    }
    data.parent.and_then(|parent| get_rec(tree, parent, key))
}

fn push_class(tree: &mut Tree, data: ClassData) -> ClassId {
    tree.classes.push(data);
    ClassId(tree.classes.len() - 1)
}

fn decode_body(tree: &mut Tree, top: ClassId, nodes: Vec<Node>) -> Result<(), Error> {
    for node in nodes {
        match node {
            Node::Class {
                name,
                pos,
                inherits,
                body,
            } => {
                let inherits_id = match &inherits {
                    Some(base) => Some(resolve_inherits(tree, top, base, &pos)?),
                    None => None,
                };
                let new_id = push_class(
                    tree,
                    ClassData {
                        name: name.clone(),
                        inherits: inherits_id,
                        parent: Some(top),
                        entries: IndexMap::new(),
                    },
                );
                insert_entry(tree, top, &name, Child::Class(new_id), &pos)?;
                decode_body(tree, new_id, body)?;
            }
            Node::Property { name, pos, value } => {
                let coerced = value::coerce(&value);
                insert_entry(tree, top, &name, Child::Value(name.clone(), coerced), &pos)?;
            }
        }
    }
    Ok(())
}

/// Walks ancestor classes from `start` upward (§4.5: "from `top`
/// upward"), searching each class's own entries — not its inherited
/// ones — for a class named `base_name`.
fn resolve_inherits(
    tree: &Tree,
    start: ClassId,
    base_name: &str,
    pos: &Position,
) -> Result<ClassId, Error> {
    let key = base_name.to_lowercase();
    let mut cur = Some(start);
    while let Some(id) = cur {
        let data = tree.data(id);
        if let Some(Child::Class(cid)) = data.entries.get(&key) {
            return Ok(*cid);
        }
        cur = data.parent;
    }
    Err(Error::UnresolvedInheritance(pos.clone(), base_name.to_string()))
}

fn insert_entry(
    tree: &mut Tree,
    id: ClassId,
    name: &str,
    child: Child,
    pos: &Position,
) -> Result<(), Error> {
    let key = name.to_lowercase();
    let data = &mut tree.classes[id.0];
    if data.entries.contains_key(&key) {
        return Err(Error::DuplicateKey(pos.clone(), name.to_string()));
    }
    data.entries.insert(key, child);
    Ok(())
}

fn class_to_value(tree: &Tree, id: ClassId) -> Value {
    let mut map = IndexMap::new();
    for (name, child) in tree.class(id).iter() {
        let v = match child {
            ChildRef::Class(cid) => class_to_value(tree, cid),
            ChildRef::Value(v) => v.clone(),
        };
        map.insert(name.to_string(), v);
    }
    Value::Map(map)
}

fn fill_from_mapping(tree: &mut Tree, id: ClassId, map: &IndexMap<String, Value>) -> Result<(), Error> {
    for (name, value) in map {
        match value {
            Value::Map(nested) => {
                let new_id = push_class(
                    tree,
                    ClassData {
                        name: name.clone(),
                        inherits: None,
                        parent: Some(id),
                        entries: IndexMap::new(),
                    },
                );
                tree.classes[id.0]
                    .entries
                    .insert(name.to_lowercase(), Child::Class(new_id));
                fill_from_mapping(tree, new_id, nested)?;
            }
            other => {
                tree.classes[id.0]
                    .entries
                    .insert(name.to_lowercase(), Child::Value(name.clone(), other.clone()));
            }
        }
    }
    Ok(())
}

fn describe_kind(v: &Value) -> String {
    match v {
        Value::String(_) => "string".to_string(),
        Value::Int(_) => "integer".to_string(),
        Value::Float(_) => "float".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::List(_) => "list".to_string(),
        Value::Map(_) => "map".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::preprocessor::preprocess_str;
    use crate::scanner::Scanner;
    use crate::source::ANONYMOUS;

    fn decode_text(text: &str) -> Result<Tree, Error> {
        let mut pp = preprocess_str(ANONYMOUS, text, false);
        let mut scanner = Scanner::new(&mut pp);
        let nodes = crate::parser::parse(&mut scanner)?;
        Tree::decode(ANONYMOUS, nodes)
    }

    #[test]
    fn duplicate_key_in_same_body_is_an_error() {
        let err = decode_text("a = 1; a = 2;").unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_, _)));
    }

    #[test]
    fn unresolved_inheritance_is_an_error() {
        let err = decode_text("class inherited : missing {};").unwrap_err();
        assert!(matches!(err, Error::UnresolvedInheritance(_, _)));
    }

    #[test]
    fn inheritance_resolves_and_iterates_inherited_before_own() {
        let tree = decode_text(
            "class _class { base_property[] = {\"an array\",\"with two elements\"}; }; \
             class inherited : _class { new_property = \"this is a new property\"; };",
        )
        .unwrap();

        let root = tree.root();
        let ChildRef::Class(inherited_id) = root.get("inherited").unwrap() else {
            panic!("expected class");
        };
        let inherited = tree.class(inherited_id);

        let ChildRef::Value(base) = inherited.get("base_property").unwrap() else {
            panic!("expected value");
        };
        assert_eq!(
            *base,
            Value::List(vec![
                Value::String("an array".to_string()),
                Value::String("with two elements".to_string()),
            ])
        );

        let keys: Vec<&str> = inherited.iter().map(|(name, _)| name).collect();
        assert_eq!(keys, vec!["base_property", "new_property"]);
    }

    #[test]
    fn to_value_flattens_into_a_nested_map() {
        let tree = decode_text("class c { x = 1; }; y = 2;").unwrap();
        let Value::Map(map) = tree.to_value() else {
            panic!("expected map");
        };
        assert_eq!(map.get("y"), Some(&Value::Int(2)));
        let Some(Value::Map(inner)) = map.get("c") else {
            panic!("expected nested map");
        };
        assert_eq!(inner.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn from_mapping_rejects_a_non_mapping_value() {
        let err = Tree::from_mapping("root", &Value::Int(1)).unwrap_err();
        assert!(matches!(err, Error::NotAMapping(_)));
    }

    #[test]
    fn from_mapping_builds_nested_classes() {
        let mut inner = IndexMap::new();
        inner.insert("x".to_string(), Value::Int(1));
        let mut outer = IndexMap::new();
        outer.insert("c".to_string(), Value::Map(inner));
        outer.insert("y".to_string(), Value::Bool(true));

        let tree = Tree::from_mapping("root", &Value::Map(outer)).unwrap();
        let root = tree.root();

        let ChildRef::Value(y) = root.get("y").unwrap() else {
            panic!("expected value");
        };
        assert_eq!(*y, Value::Bool(true));

        let ChildRef::Class(c_id) = root.get("c").unwrap() else {
            panic!("expected class");
        };
        let ChildRef::Value(x) = tree.class(c_id).get("x").unwrap() else {
            panic!("expected value");
        };
        assert_eq!(*x, Value::Int(1));
    }
}
