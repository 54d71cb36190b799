use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::StageError;

/// Change-tracking state of a staged record.
///
/// Stored in the `status` column of every staging table in its lowercase form.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Unchanged,
    Added,
    Updated,
    Deleted,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Unchanged => "unchanged",
            EntityStatus::Added => "added",
            EntityStatus::Updated => "updated",
            EntityStatus::Deleted => "deleted",
        }
    }

    /// Status a record takes after a local update.
    ///
    /// A record that only exists locally stays `added`; anything else becomes `updated`.
    pub fn after_update(self) -> Self {
        match self {
            EntityStatus::Added => EntityStatus::Added,
            _ => EntityStatus::Updated,
        }
    }

    /// Whether deleting a record in this state keeps a tombstone.
    ///
    /// Locally added records never reached the server and are purged instead.
    pub fn keeps_tombstone(self) -> bool {
        !matches!(self, EntityStatus::Added)
    }

    pub fn is_tombstone(self) -> bool {
        matches!(self, EntityStatus::Deleted)
    }

    pub fn is_pending(self) -> bool {
        !matches!(self, EntityStatus::Unchanged)
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityStatus {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unchanged" => Ok(EntityStatus::Unchanged),
            "added" => Ok(EntityStatus::Added),
            "updated" => Ok(EntityStatus::Updated),
            "deleted" => Ok(EntityStatus::Deleted),
            other => Err(StageError::InvalidStatus(other.to_string())),
        }
    }
}

/// The four levels of the staged mapping tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Service,
    Database,
    Table,
    Field,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Service => "service",
            EntityKind::Database => "database",
            EntityKind::Table => "table",
            EntityKind::Field => "field",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EntityKind::Service => "Service",
            EntityKind::Database => "Database",
            EntityKind::Table => "Table",
            EntityKind::Field => "Field",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "service" | "services" => Ok(EntityKind::Service),
            "database" | "databases" | "db" => Ok(EntityKind::Database),
            "table" | "tables" => Ok(EntityKind::Table),
            "field" | "fields" => Ok(EntityKind::Field),
            other => Err(StageError::Parse(format!("unknown entity kind '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_promotes_everything_but_added() {
        assert_eq!(EntityStatus::Unchanged.after_update(), EntityStatus::Updated);
        assert_eq!(EntityStatus::Updated.after_update(), EntityStatus::Updated);
        assert_eq!(EntityStatus::Added.after_update(), EntityStatus::Added);
    }

    #[test]
    fn only_added_records_are_purged() {
        assert!(!EntityStatus::Added.keeps_tombstone());
        assert!(EntityStatus::Unchanged.keeps_tombstone());
        assert!(EntityStatus::Updated.keeps_tombstone());
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [
            EntityStatus::Unchanged,
            EntityStatus::Added,
            EntityStatus::Updated,
            EntityStatus::Deleted,
        ] {
            assert_eq!(status.as_str().parse::<EntityStatus>().unwrap(), status);
        }
        assert!("gone".parse::<EntityStatus>().is_err());
    }

    #[test]
    fn kind_accepts_plural_names() {
        assert_eq!("Tables".parse::<EntityKind>().unwrap(), EntityKind::Table);
        assert_eq!("db".parse::<EntityKind>().unwrap(), EntityKind::Database);
        assert!("column".parse::<EntityKind>().is_err());
    }
}
