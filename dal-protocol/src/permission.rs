//! Record access permissions (`L`ink, `W`rite, `R`ead) as used in the
//! server's `OwnGroupPerm`/`AccessGroupPerm`/`OtherPerm` fields.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    Link,
    Write,
    Read,
}

impl Permission {
    pub const ALL: [Permission; 3] = [Permission::Link, Permission::Write, Permission::Read];

    pub fn bit(&self) -> u8 {
        match self {
            Permission::Link => 1,
            Permission::Write => 2,
            Permission::Read => 4,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            Permission::Link => 'L',
            Permission::Write => 'W',
            Permission::Read => 'R',
        }
    }

    /// Collects the permissions whose letters appear in `text`
    /// (case-insensitive).
    pub fn parse_set(text: &str) -> BTreeSet<Permission> {
        let upper = text.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .filter(|p| upper.contains(p.letter()))
            .collect()
    }

    /// Combines permissions into the server's integer form.
    pub fn to_bits<I: IntoIterator<Item = Permission>>(perms: I) -> u8 {
        perms.into_iter().fold(0, |acc, p| acc | p.bit())
    }

    /// Integer form of a permission string such as `"RW"`.
    pub fn bits_from_str(text: &str) -> u8 {
        Self::to_bits(Self::parse_set(text))
    }
}
