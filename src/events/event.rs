//! Canonical broker events.
//!
//! An [`Event`] is built once from an [`Intent`] and never changes. The
//! payload is compact JSON: resource fields in `name`, `age`, `breed`
//! order, followed by `id` for updates, or `{"id": ...}` alone for
//! deletes.

use super::types::{Cat, Intent, IntentKind};
use crate::kafka::KeyStrategy;
use crate::Result;
use bytes::Bytes;
use serde::Serialize;

pub const CAT_CREATED_TOPIC: &str = "cat_created";
pub const CAT_UPDATED_TOPIC: &str = "cat_updated";
pub const CAT_DELETED_TOPIC: &str = "cat_deleted";

impl IntentKind {
    pub fn topic(&self) -> &'static str {
        match self {
            IntentKind::Create => CAT_CREATED_TOPIC,
            IntentKind::Update => CAT_UPDATED_TOPIC,
            IntentKind::Delete => CAT_DELETED_TOPIC,
        }
    }
}

#[derive(Serialize)]
struct CatPayload<'a> {
    name: &'a str,
    age: i64,
    breed: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
}

impl<'a> CatPayload<'a> {
    fn new(cat: &'a Cat, id: Option<&'a str>) -> Self {
        Self {
            name: &cat.name,
            age: cat.age,
            breed: &cat.breed,
            id,
        }
    }
}

#[derive(Serialize)]
struct DeletePayload<'a> {
    id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    kind: IntentKind,
    key: Option<Bytes>,
    payload: Bytes,
}

impl Event {
    pub fn from_intent(intent: &Intent, key_strategy: &KeyStrategy) -> Result<Self> {
        let payload = match intent {
            Intent::Create { cat } => serde_json::to_vec(&CatPayload::new(cat, None))?,
            Intent::Update { id, cat } => {
                serde_json::to_vec(&CatPayload::new(cat, Some(id.as_str())))?
            }
            Intent::Delete { id } => serde_json::to_vec(&DeletePayload { id: id.as_str() })?,
        };

        Ok(Self {
            kind: intent.kind(),
            key: key_strategy.extract_key(intent).map(Bytes::from),
            payload: Bytes::from(payload),
        })
    }

    pub fn kind(&self) -> IntentKind {
        self.kind
    }

    pub fn topic(&self) -> &'static str {
        self.kind.topic()
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CatId;

    fn tom(age: i64) -> Cat {
        Cat::new("Tom", age, "Tabby")
    }

    #[test]
    fn test_create_event() {
        let intent = Intent::Create { cat: tom(3) };
        let event = Event::from_intent(&intent, &KeyStrategy::KindConstant).unwrap();

        assert_eq!(event.topic(), "cat_created");
        assert_eq!(event.key(), Some(&b"create_cat_na"[..]));
        assert_eq!(
            event.payload(),
            &br#"{"name":"Tom","age":3,"breed":"Tabby"}"#[..]
        );
    }

    #[test]
    fn test_update_event_appends_id() {
        let intent = Intent::Update {
            id: CatId::new("42").unwrap(),
            cat: tom(4),
        };
        let event = Event::from_intent(&intent, &KeyStrategy::KindConstant).unwrap();

        assert_eq!(event.topic(), "cat_updated");
        assert_eq!(event.key(), Some(&b"update_cat_na"[..]));
        assert_eq!(
            event.payload(),
            &br#"{"name":"Tom","age":4,"breed":"Tabby","id":"42"}"#[..]
        );
    }

    #[test]
    fn test_delete_event_carries_only_id() {
        let intent = Intent::Delete {
            id: CatId::new("42").unwrap(),
        };
        let event = Event::from_intent(&intent, &KeyStrategy::KindConstant).unwrap();

        assert_eq!(event.topic(), "cat_deleted");
        assert_eq!(event.key(), Some(&b"delete_cat_na"[..]));
        assert_eq!(event.payload(), &br#"{"id":"42"}"#[..]);
    }

    #[test]
    fn test_each_kind_has_its_own_topic() {
        let topics: Vec<_> = IntentKind::ALL.iter().map(|k| k.topic()).collect();
        assert_eq!(topics, vec!["cat_created", "cat_updated", "cat_deleted"]);
    }

    #[test]
    fn test_resource_id_key() {
        let intent = Intent::Delete {
            id: CatId::new("42").unwrap(),
        };
        let event = Event::from_intent(&intent, &KeyStrategy::ResourceId).unwrap();
        assert_eq!(event.key(), Some(&b"42"[..]));
    }

    #[test]
    fn test_payload_escapes_strings() {
        let intent = Intent::Create {
            cat: Cat::new("Tom \"the cat\"", 3, "Tabby\n"),
        };
        let event = Event::from_intent(&intent, &KeyStrategy::KindConstant).unwrap();
        let decoded: Cat = serde_json::from_slice(event.payload()).unwrap();
        assert_eq!(decoded.name, "Tom \"the cat\"");
        assert_eq!(decoded.breed, "Tabby\n");
    }
}
