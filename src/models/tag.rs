use serde::Serialize;

use super::post::slugify;

/// Label collaborators attach to posts. Private tags are only shown to
/// collaborators and administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i32,
    pub name: String,
    pub slug: String,
    /// Six hex digits, no leading `#`.
    pub color: String,
    pub is_public: bool,
}

impl Tag {
    pub fn slug_for(name: &str) -> String {
        slugify(name)
    }
}
