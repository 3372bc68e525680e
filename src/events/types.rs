use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Resource fields carried by create and update requests.
///
/// Fields are optional on the wire and fall back to their zero value, so
/// `{}` and `{"name": null}` both decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cat {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub age: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub breed: String,
}

impl Cat {
    pub fn new(name: impl Into<String>, age: i64, breed: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age,
            breed: breed.into(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Non-empty identifier taken from the request path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatId(String);

impl CatId {
    /// Returns `None` for an empty identifier.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentKind {
    Create,
    Update,
    Delete,
}

impl IntentKind {
    pub const ALL: [IntentKind; 3] = [IntentKind::Create, IntentKind::Update, IntentKind::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Create => "create",
            IntentKind::Update => "update",
            IntentKind::Delete => "delete",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated client mutation, not yet serialized.
///
/// Update and delete always carry an id; create never does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Create { cat: Cat },
    Update { id: CatId, cat: Cat },
    Delete { id: CatId },
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::Create { .. } => IntentKind::Create,
            Intent::Update { .. } => IntentKind::Update,
            Intent::Delete { .. } => IntentKind::Delete,
        }
    }

    pub fn id(&self) -> Option<&CatId> {
        match self {
            Intent::Create { .. } => None,
            Intent::Update { id, .. } | Intent::Delete { id } => Some(id),
        }
    }

    pub fn resource(&self) -> Option<&Cat> {
        match self {
            Intent::Create { cat } | Intent::Update { cat, .. } => Some(cat),
            Intent::Delete { .. } => None,
        }
    }
}
