//! Element identifiers.
//!
//! An element id is a dotted path scoped to an adapter namespace:
//! `<adapter>.<type>[.<id_type>.<name parts...>]`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ElemIdError;

/// Separator between id segments.
pub const ID_SEPARATOR: char = '.';

/// Kind of element an id points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdType {
    /// A type definition.
    Type,
    /// An instance of a type.
    Instance,
    /// An annotation on a type.
    Attr,
    /// A field of a type.
    Field,
}

/// Stable, path-like identifier of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ElemId {
    adapter: String,
    type_name: String,
    id_type: IdType,
    name_parts: Vec<String>,
}

impl ElemId {
    /// Creates the id of a type.
    #[must_use]
    pub fn type_id(adapter: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            type_name: type_name.into(),
            id_type: IdType::Type,
            name_parts: Vec::new(),
        }
    }

    /// Creates the id of an instance.
    #[must_use]
    pub fn instance_id(
        adapter: impl Into<String>,
        type_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            adapter: adapter.into(),
            type_name: type_name.into(),
            id_type: IdType::Instance,
            name_parts: vec![name.into()],
        }
    }

    /// Returns the adapter namespace.
    #[must_use]
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    /// Returns the type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the id type.
    #[must_use]
    pub const fn id_type(&self) -> IdType {
        self.id_type
    }

    /// Returns the name parts following the id type.
    #[must_use]
    pub fn name_parts(&self) -> &[String] {
        &self.name_parts
    }

    /// Returns the number of name parts that belong to the top-level element.
    const fn top_level_len(&self) -> usize {
        match self.id_type {
            IdType::Instance => 1,
            IdType::Type | IdType::Attr | IdType::Field => 0,
        }
    }

    /// Returns true if this id names a top-level element.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        match self.id_type {
            IdType::Type => true,
            IdType::Instance => self.name_parts.len() == 1,
            IdType::Attr | IdType::Field => false,
        }
    }

    /// Splits this id into its top-level element id and the nested path inside it.
    #[must_use]
    pub fn top_level_parent(&self) -> (Self, Vec<String>) {
        let split = self.top_level_len().min(self.name_parts.len());
        let (own, path) = self.name_parts.split_at(split);
        let id_type = if split == 0 { IdType::Type } else { self.id_type };
        (
            Self {
                adapter: self.adapter.clone(),
                type_name: self.type_name.clone(),
                id_type,
                name_parts: own.to_vec(),
            },
            path.to_vec(),
        )
    }

    /// Creates an id nested under this one.
    #[must_use]
    pub fn create_nested_id<S: AsRef<str>>(&self, parts: &[S]) -> Self {
        let mut nested = self.clone();
        nested
            .name_parts
            .extend(parts.iter().map(|p| p.as_ref().to_string()));
        nested
    }

    /// Returns the full dotted name.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Type => "type",
            Self::Instance => "instance",
            Self::Attr => "attr",
            Self::Field => "field",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for ElemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{ID_SEPARATOR}{}", self.adapter, self.type_name)?;
        if self.id_type != IdType::Type || !self.name_parts.is_empty() {
            write!(f, "{ID_SEPARATOR}{}", self.id_type)?;
        }
        for part in &self.name_parts {
            write!(f, "{ID_SEPARATOR}{part}")?;
        }
        Ok(())
    }
}

impl FromStr for ElemId {
    type Err = ElemIdError;

    fn from_str(full_name: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = full_name.split(ID_SEPARATOR).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ElemIdError::EmptySegment {
                full_name: full_name.to_string(),
            });
        }

        let [adapter, type_name, rest @ ..] = segments.as_slice() else {
            return Err(ElemIdError::TooShort {
                full_name: full_name.to_string(),
            });
        };

        let (id_type, name_parts) = match rest {
            [] => (IdType::Type, &[][..]),
            [id_type, parts @ ..] => {
                let id_type = match *id_type {
                    "type" => IdType::Type,
                    "instance" => IdType::Instance,
                    "attr" => IdType::Attr,
                    "field" => IdType::Field,
                    other => {
                        return Err(ElemIdError::UnknownIdType {
                            id_type: other.to_string(),
                            full_name: full_name.to_string(),
                        });
                    }
                };
                (id_type, parts)
            }
        };

        if id_type != IdType::Type && name_parts.is_empty() {
            return Err(ElemIdError::TooShort {
                full_name: full_name.to_string(),
            });
        }

        Ok(Self {
            adapter: (*adapter).to_string(),
            type_name: (*type_name).to_string(),
            id_type,
            name_parts: name_parts.iter().map(|p| (*p).to_string()).collect(),
        })
    }
}

impl TryFrom<String> for ElemId {
    type Error = ElemIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ElemId> for String {
    fn from(id: ElemId) -> Self {
        id.full_name()
    }
}
