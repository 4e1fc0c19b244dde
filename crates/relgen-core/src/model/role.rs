//! Roles, role maps, and the insert marker.

use super::{Config, RoleId, StrctId};
use crate::msg::Pos;
use serde::Serialize;

/// A named principal in the access-control forest.
///
/// The virtual roles (`all`, `default`, `none`) have no parent; declared
/// roles descend from `all` unless nested under another role.
#[derive(Clone, Debug, Serialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub doc: Option<String>,
    pub parent: Option<RoleId>,
    pub children: Vec<RoleId>,
    pub pos: Pos,
}

impl Role {
    /// Virtual roles are fixed by the language, not declared.
    pub fn is_virtual(&self) -> bool {
        self.parent.is_none()
    }
}

/// What a role map authorizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleMapKind {
    All,
    Count,
    Delete,
    Insert,
    Iterate,
    List,
    Search,
    Update,
    Noexport,
}

/// A set of roles attached to an operation or a noexport directive.
#[derive(Clone, Debug, Serialize)]
pub struct RoleMap {
    pub kind: RoleMapKind,
    pub roles: Vec<RoleId>,
}

impl RoleMap {
    /// True iff some listed role equals `role` or an ancestor of it.
    pub fn permits(&self, cfg: &Config, role: RoleId) -> bool {
        self.roles.iter().any(|&m| cfg.role_is(role, m))
    }
}

/// An optional role map permits nothing when absent.
pub(crate) fn rolemap_permits(cfg: &Config, map: Option<&RoleMap>, role: RoleId) -> bool {
    map.is_some_and(|m| m.permits(cfg, role))
}

/// Marks a structure as insertable.
#[derive(Clone, Debug, Serialize)]
pub struct Insert {
    pub rolemap: Option<RoleMap>,
    pub parent: StrctId,
    pub pos: Pos,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forest() -> Config {
        let mut cfg = Config::new();
        for (i, (name, parent)) in [
            ("all", None),
            ("default", None),
            ("none", None),
            ("user", Some(0)),
            ("admin", Some(3)),
        ]
        .iter()
        .enumerate()
        {
            cfg.roles.push(Role {
                id: RoleId(i),
                name: (*name).into(),
                doc: None,
                parent: parent.map(RoleId),
                children: Vec::new(),
                pos: Pos::new("t.rgn", 1, 1),
            });
        }
        cfg
    }

    #[test]
    fn test_permits_through_ancestors() {
        let cfg = forest();
        let map = RoleMap {
            kind: RoleMapKind::Insert,
            roles: vec![RoleId(3)],
        };
        // "admin" descends from "user", which the map lists.
        assert!(map.permits(&cfg, RoleId(4)));
        assert!(map.permits(&cfg, RoleId(3)));
        assert!(!map.permits(&cfg, RoleId(1)));
    }

    #[test]
    fn test_permits_all() {
        let cfg = forest();
        let map = RoleMap {
            kind: RoleMapKind::Search,
            roles: vec![RoleId(0)],
        };
        assert!(map.permits(&cfg, RoleId(4)));
        // Virtual "default" does not descend from "all".
        assert!(!map.permits(&cfg, RoleId(1)));
        assert!(!rolemap_permits(&cfg, None, RoleId(4)));
    }
}
