use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RosterError;
use crate::models::shift::is_valid_squad;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Chief,
    Member,
}

impl Role {
    fn from_title(title: &str) -> Self {
        if title.trim().eq_ignore_ascii_case("chief") {
            Role::Chief
        } else {
            Role::Member
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Chief => f.write_str("Chief"),
            Role::Member => f.write_str("Member"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterMember {
    pub name: String,
    pub role: Role,
    pub squad: u16,
}

#[derive(Debug, Deserialize)]
struct RosterFile {
    members: Vec<RosterEntry>,
}

#[derive(Debug, Deserialize)]
struct RosterEntry {
    name: String,
    title: String,
    squad: u16,
    #[serde(default)]
    groupme_name: Option<String>,
}

/// Chat display name -> squad membership. Loaded once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: HashMap<String, RosterMember>,
}

impl Roster {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RosterError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| RosterError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let file: RosterFile =
            serde_json::from_str(&content).map_err(|source| RosterError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let members = file
            .members
            .into_iter()
            .map(|entry| RosterMember {
                name: entry.groupme_name.unwrap_or(entry.name),
                role: Role::from_title(&entry.title),
                squad: entry.squad,
            })
            .collect();
        Self::from_members(members)
    }

    pub fn from_members(members: Vec<RosterMember>) -> Result<Self, RosterError> {
        let mut by_name = HashMap::with_capacity(members.len());
        for member in members {
            if !is_valid_squad(member.squad) {
                return Err(RosterError::InvalidSquad {
                    name: member.name,
                    squad: member.squad,
                });
            }
            if by_name.contains_key(&member.name) {
                return Err(RosterError::DuplicateMember(member.name));
            }
            by_name.insert(member.name.clone(), member);
        }
        Ok(Self { members: by_name })
    }

    /// Exact, case-sensitive match on the chat display name.
    pub fn lookup(&self, display_name: &str) -> Option<&RosterMember> {
        self.members.get(display_name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
