use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of entity a recommendation list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    User,
    Item,
}

impl TargetType {
    /// Prefix used when rendering a [`TargetKey`].
    pub fn key_prefix(self) -> &'static str {
        match self {
            TargetType::User => "user_id",
            TargetType::Item => "item_id",
        }
    }

    /// Entity table holding targets of this type.
    pub fn table(self) -> &'static str {
        match self {
            TargetType::User => "users",
            TargetType::Item => "items",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TargetType::User => "User",
            TargetType::Item => "Item",
        }
    }
}

/// Identifies a recommendation target, rendered as `user_id#<id>` or `item_id#<id>`.
///
/// Users and items with the same numeric id never share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetKey {
    pub target_type: TargetType,
    pub id: i64,
}

impl TargetKey {
    pub fn user(id: i64) -> Self {
        Self {
            target_type: TargetType::User,
            id,
        }
    }

    pub fn item(id: i64) -> Self {
        Self {
            target_type: TargetType::Item,
            id,
        }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.target_type.key_prefix(), self.id)
    }
}

impl Serialize for TargetKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_prefixed_keys() {
        assert_eq!(TargetKey::user(42).to_string(), "user_id#42");
        assert_eq!(TargetKey::item(7).to_string(), "item_id#7");
    }

    #[test]
    fn same_id_distinct_types_never_collide() {
        assert_ne!(TargetKey::user(5), TargetKey::item(5));
        assert_ne!(TargetKey::user(5).to_string(), TargetKey::item(5).to_string());
    }
}
