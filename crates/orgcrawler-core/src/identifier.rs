//! Dynamic identifier resolution.
//!
//! `get_account`/`get_org_unit`/`get_policy` accept an object, an id, a name,
//! or (for accounts) an alias. Rather than reflect on the runtime type,
//! callers build an [`Identifier`] via `From`/`Into` and the query surface
//! matches on it directly.

use crate::model::{Account, OrganizationalUnit, Policy};

/// Something that can be resolved to an [`Account`].
#[derive(Debug, Clone)]
pub enum AccountIdentifier<'a> {
    /// Match by id, name, or alias (whichever matches first).
    Str(&'a str),
    /// Already resolved.
    Object(&'a Account),
}

impl<'a> From<&'a str> for AccountIdentifier<'a> {
    fn from(s: &'a str) -> Self {
        AccountIdentifier::Str(s)
    }
}

impl<'a> From<&'a String> for AccountIdentifier<'a> {
    fn from(s: &'a String) -> Self {
        AccountIdentifier::Str(s.as_str())
    }
}

impl<'a> From<&'a Account> for AccountIdentifier<'a> {
    fn from(a: &'a Account) -> Self {
        AccountIdentifier::Object(a)
    }
}

/// Something that can be resolved to an [`OrganizationalUnit`] id.
///
/// `"root"` and the organization's `root_id` both resolve to the root,
/// which is never represented as a concrete `OrganizationalUnit` object.
#[derive(Debug, Clone)]
pub enum OrgUnitIdentifier<'a> {
    Str(&'a str),
    Object(&'a OrganizationalUnit),
}

impl<'a> From<&'a str> for OrgUnitIdentifier<'a> {
    fn from(s: &'a str) -> Self {
        OrgUnitIdentifier::Str(s)
    }
}

impl<'a> From<&'a String> for OrgUnitIdentifier<'a> {
    fn from(s: &'a String) -> Self {
        OrgUnitIdentifier::Str(s.as_str())
    }
}

impl<'a> From<&'a OrganizationalUnit> for OrgUnitIdentifier<'a> {
    fn from(ou: &'a OrganizationalUnit) -> Self {
        OrgUnitIdentifier::Object(ou)
    }
}

/// Something that can be resolved to a [`Policy`].
#[derive(Debug, Clone)]
pub enum PolicyIdentifier<'a> {
    Str(&'a str),
    Object(&'a Policy),
}

impl<'a> From<&'a str> for PolicyIdentifier<'a> {
    fn from(s: &'a str) -> Self {
        PolicyIdentifier::Str(s)
    }
}

impl<'a> From<&'a String> for PolicyIdentifier<'a> {
    fn from(s: &'a String) -> Self {
        PolicyIdentifier::Str(s.as_str())
    }
}

impl<'a> From<&'a Policy> for PolicyIdentifier<'a> {
    fn from(p: &'a Policy) -> Self {
        PolicyIdentifier::Object(p)
    }
}

/// Either an account or an org unit, accepted by `get_policies_for_target`.
#[derive(Debug, Clone)]
pub enum TargetIdentifier<'a> {
    Str(&'a str),
}

impl<'a> From<&'a str> for TargetIdentifier<'a> {
    fn from(s: &'a str) -> Self {
        TargetIdentifier::Str(s)
    }
}

impl<'a> From<&'a String> for TargetIdentifier<'a> {
    fn from(s: &'a String) -> Self {
        TargetIdentifier::Str(s.as_str())
    }
}
