//! Element values and live references.
//!
//! Elements are shared by reference across every change that describes them.
//! A [`ReferenceExpression`] keeps a back-link to the element it points into,
//! so resolving it always reads the element's current value, including
//! updates patched in after an earlier group was deployed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::elem_id::ElemId;

/// A configuration element shared between changes and plan items.
pub type SharedElement = Arc<RwLock<Element>>;

/// A value held by an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(serde_json::Number),
    /// String value.
    String(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Reference to a value of another element.
    Reference(ReferenceExpression),
    /// Keyed values.
    Map(BTreeMap<String, Value>),
}

/// A reference into another element's value.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceExpression {
    #[serde(rename = "$ref")]
    elem_id: ElemId,
    #[serde(skip)]
    target: Option<SharedElement>,
}

/// An addressable unit of target-system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Identifier of the element.
    pub elem_id: ElemId,
    /// Value of the element, usually a map of fields.
    pub value: Value,
}

impl Value {
    /// Creates an empty map value.
    #[must_use]
    pub const fn map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Returns the value stored at a nested path.
    #[must_use]
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Self> {
        path.iter().try_fold(self, |current, key| current.child(key.as_ref()))
    }

    fn child(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(map) => map.get(key),
            Self::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    fn child_mut(&mut self, key: &str) -> Option<&mut Self> {
        match self {
            Self::Map(map) => map.get_mut(key),
            Self::List(items) => key.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        }
    }

    /// Sets the value at a nested path, creating intermediate maps as needed.
    ///
    /// Returns false if the path crosses a scalar or an out-of-range list index.
    pub fn set_path<S: AsRef<str>>(&mut self, path: &[S], value: Self) -> bool {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return true;
        };

        let mut current = self;
        for key in parents {
            let key = key.as_ref();
            if let Self::Map(map) = current {
                current = map.entry(key.to_string()).or_insert_with(Self::map);
            } else {
                match current.child_mut(key) {
                    Some(next) => current = next,
                    None => return false,
                }
            }
        }

        let last = last.as_ref();
        match current {
            Self::Map(map) => {
                map.insert(last.to_string(), value);
                true
            }
            Self::List(items) => match last.parse::<usize>() {
                Ok(i) if i < items.len() => {
                    items[i] = value;
                    true
                }
                Ok(i) if i == items.len() => {
                    items.push(value);
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Removes the value at a nested path, returning it.
    pub fn remove_path<S: AsRef<str>>(&mut self, path: &[S]) -> Option<Self> {
        let (last, parents) = path.split_last()?;
        let mut current = self;
        for key in parents {
            current = current.child_mut(key.as_ref())?;
        }
        match current {
            Self::Map(map) => map.remove(last.as_ref()),
            Self::List(items) => {
                let i = last.as_ref().parse::<usize>().ok()?;
                (i < items.len()).then(|| items.remove(i))
            }
            _ => None,
        }
    }

    /// Visits every reference held by this value.
    pub fn for_each_reference(&self, visit: &mut impl FnMut(&ReferenceExpression)) {
        match self {
            Self::Reference(reference) => visit(reference),
            Self::List(items) => items.iter().for_each(|v| v.for_each_reference(visit)),
            Self::Map(map) => map.values().for_each(|v| v.for_each_reference(visit)),
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => {}
        }
    }

    /// Returns a copy with every resolvable reference replaced by its current value.
    ///
    /// A reference that leads back to one already being resolved is kept as is.
    #[must_use]
    pub fn resolved(&self) -> Self {
        self.resolved_within(&mut Vec::new())
    }

    fn resolved_within(&self, resolving: &mut Vec<String>) -> Self {
        match self {
            Self::Reference(reference) => {
                let key = reference.elem_id().full_name();
                if resolving.contains(&key) {
                    return self.clone();
                }
                let Some(value) = reference.resolve() else {
                    return self.clone();
                };
                resolving.push(key);
                let resolved = value.resolved_within(resolving);
                resolving.pop();
                resolved
            }
            Self::List(items) => Self::List(
                items
                    .iter()
                    .map(|v| v.resolved_within(resolving))
                    .collect(),
            ),
            Self::Map(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.resolved_within(resolving)))
                    .collect(),
            ),
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => self.clone(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl ReferenceExpression {
    /// Creates an unlinked reference to the given id.
    #[must_use]
    pub const fn new(elem_id: ElemId) -> Self {
        Self {
            elem_id,
            target: None,
        }
    }

    /// Creates a reference linked to the top-level element it points into.
    #[must_use]
    pub const fn linked(elem_id: ElemId, target: SharedElement) -> Self {
        Self {
            elem_id,
            target: Some(target),
        }
    }

    /// Returns the referenced id.
    #[must_use]
    pub const fn elem_id(&self) -> &ElemId {
        &self.elem_id
    }

    /// Returns the linked top-level element, if any.
    #[must_use]
    pub const fn target(&self) -> Option<&SharedElement> {
        self.target.as_ref()
    }

    /// Reads the current value the reference points at.
    ///
    /// Returns `None` for unlinked references or paths missing in the target.
    #[must_use]
    pub fn resolve(&self) -> Option<Value> {
        let target = self.target.as_ref()?;
        let (_, path) = self.elem_id.top_level_parent();
        let element = read_element(target);
        element.value.get_path(&path).cloned()
    }
}

impl PartialEq for ReferenceExpression {
    fn eq(&self, other: &Self) -> bool {
        self.elem_id == other.elem_id
    }
}

impl fmt::Debug for ReferenceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceExpression")
            .field("elem_id", &self.elem_id.full_name())
            .field("linked", &self.target.is_some())
            .finish()
    }
}

impl Element {
    /// Creates a new element.
    #[must_use]
    pub const fn new(elem_id: ElemId, value: Value) -> Self {
        Self { elem_id, value }
    }

    /// Wraps the element for sharing between changes.
    #[must_use]
    pub fn shared(self) -> SharedElement {
        Arc::new(RwLock::new(self))
    }

    /// Returns the element's value with references resolved to their current values.
    #[must_use]
    pub fn resolved_value(&self) -> Value {
        self.value.resolved()
    }

    /// Returns the top-level ids of every element this one references.
    #[must_use]
    pub fn referenced_ids(&self) -> Vec<ElemId> {
        let mut ids = Vec::new();
        self.value.for_each_reference(&mut |reference| {
            let (parent, _) = reference.elem_id().top_level_parent();
            if !ids.contains(&parent) {
                ids.push(parent);
            }
        });
        ids
    }
}

/// Locks a shared element for reading, recovering from poisoning.
pub fn read_element(element: &SharedElement) -> RwLockReadGuard<'_, Element> {
    element.read().unwrap_or_else(PoisonError::into_inner)
}

/// Locks a shared element for writing, recovering from poisoning.
pub fn write_element(element: &SharedElement) -> RwLockWriteGuard<'_, Element> {
    element.write().unwrap_or_else(PoisonError::into_inner)
}
