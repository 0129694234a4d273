use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The entity families that updates are routed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Prefect,
    Event,
    Attendance,
    Offense,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Prefect,
        Category::Event,
        Category::Attendance,
        Category::Offense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Prefect => "prefect",
            Category::Event => "event",
            Category::Attendance => "attendance",
            Category::Offense => "offense",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| UnknownKind(value.to_string()))
    }
}

/// What happened. Every variant except the two system kinds is scoped to a category.
///
/// On the wire a kind travels as its `type` string, e.g. `prefect-updated`,
/// `attendance-added`, `cache-invalidate` or `heartbeat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UpdateKind {
    EntityCreated(Category),
    EntityUpdated(Category),
    EntityDeleted(Category),
    RelationAdded(Category),
    RelationRemoved(Category),
    /// Cached data should be dropped. Carries a category when the server knows which one.
    CacheInvalidate(Option<Category>),
    Heartbeat,
}

impl UpdateKind {
    /// The category handlers are looked up by, if any.
    pub fn category(&self) -> Option<Category> {
        match self {
            UpdateKind::EntityCreated(category)
            | UpdateKind::EntityUpdated(category)
            | UpdateKind::EntityDeleted(category)
            | UpdateKind::RelationAdded(category)
            | UpdateKind::RelationRemoved(category) => Some(*category),
            UpdateKind::CacheInvalidate(category) => *category,
            UpdateKind::Heartbeat => None,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, UpdateKind::Heartbeat)
    }

    /// The `type` string used on the wire and as the SSE event name.
    pub fn wire_name(&self) -> String {
        match self {
            UpdateKind::EntityCreated(category) => format!("{category}-created"),
            UpdateKind::EntityUpdated(category) => format!("{category}-updated"),
            UpdateKind::EntityDeleted(category) => format!("{category}-deleted"),
            UpdateKind::RelationAdded(category) => format!("{category}-added"),
            UpdateKind::RelationRemoved(category) => format!("{category}-removed"),
            UpdateKind::CacheInvalidate(_) => "cache-invalidate".to_string(),
            UpdateKind::Heartbeat => "heartbeat".to_string(),
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.wire_name())
    }
}

/// Returned when a `type` string names no known update kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown update type: {}", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for UpdateKind {
    type Err = UnknownKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cache-invalidate" => return Ok(UpdateKind::CacheInvalidate(None)),
            "heartbeat" => return Ok(UpdateKind::Heartbeat),
            _ => {}
        }

        let unknown = || UnknownKind(value.to_string());
        let (category, verb) = value.split_once('-').ok_or_else(unknown)?;
        let category = category.parse::<Category>().map_err(|_| unknown())?;

        match verb {
            "created" => Ok(UpdateKind::EntityCreated(category)),
            "updated" => Ok(UpdateKind::EntityUpdated(category)),
            "deleted" => Ok(UpdateKind::EntityDeleted(category)),
            "added" => Ok(UpdateKind::RelationAdded(category)),
            "removed" => Ok(UpdateKind::RelationRemoved(category)),
            _ => Err(unknown()),
        }
    }
}

impl TryFrom<String> for UpdateKind {
    type Error = UnknownKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UpdateKind> for String {
    fn from(kind: UpdateKind) -> Self {
        kind.wire_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_used_by_the_admin_pages() {
        assert_eq!(
            "prefect-updated".parse::<UpdateKind>(),
            Ok(UpdateKind::EntityUpdated(Category::Prefect))
        );
        assert_eq!(
            "attendance-removed".parse::<UpdateKind>(),
            Ok(UpdateKind::RelationRemoved(Category::Attendance))
        );
        assert_eq!(
            "offense-added".parse::<UpdateKind>(),
            Ok(UpdateKind::RelationAdded(Category::Offense))
        );
        assert_eq!(
            "cache-invalidate".parse::<UpdateKind>(),
            Ok(UpdateKind::CacheInvalidate(None))
        );
        assert_eq!("heartbeat".parse::<UpdateKind>(), Ok(UpdateKind::Heartbeat));
    }

    #[test]
    fn rejects_unknown_names() {
        assert!("force-refresh".parse::<UpdateKind>().is_err());
        assert!("prefect-renamed".parse::<UpdateKind>().is_err());
        assert!("".parse::<UpdateKind>().is_err());
    }

    #[test]
    fn category_of_system_kinds() {
        assert_eq!(UpdateKind::Heartbeat.category(), None);
        assert_eq!(UpdateKind::CacheInvalidate(None).category(), None);
        assert_eq!(
            UpdateKind::CacheInvalidate(Some(Category::Event)).category(),
            Some(Category::Event)
        );
        assert_eq!(
            UpdateKind::EntityDeleted(Category::Offense).category(),
            Some(Category::Offense)
        );
    }
}
