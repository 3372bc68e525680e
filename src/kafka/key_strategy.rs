use crate::events::{Intent, IntentKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Decides the partition key attached to each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// One literal per kind; every event of a kind shares a partition.
    #[default]
    KindConstant,
    /// The cat id. Creates have no id yet and go out unkeyed.
    ResourceId,
}

impl KeyStrategy {
    pub fn extract_key(&self, intent: &Intent) -> Option<String> {
        match self {
            KeyStrategy::KindConstant => Some(kind_constant(intent.kind()).to_string()),

            KeyStrategy::ResourceId => match intent.id() {
                Some(id) => Some(id.as_str().to_string()),
                None => {
                    debug!(kind = %intent.kind(), "No resource id available, publishing unkeyed");
                    None
                }
            },
        }
    }
}

pub fn kind_constant(kind: IntentKind) -> &'static str {
    match kind {
        IntentKind::Create => "create_cat_na",
        IntentKind::Update => "update_cat_na",
        IntentKind::Delete => "delete_cat_na",
    }
}
