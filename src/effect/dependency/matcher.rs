//! Structural matching of services against roles.

use std::collections::BTreeMap;

use crate::error::RoleMismatch;

use super::service::{Member, Service};
use super::signature::{Signature, SignatureParseError};

/// A required interface: member names and the shapes callers expect.
///
/// # Example
///
/// ```
/// use backwater::effect::dependency::Role;
///
/// let role = Role::parse([("greet", "(name: string) => string")]).unwrap();
/// assert!(role.signature("greet").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Role {
    members: BTreeMap<String, Signature>,
}

impl Role {
    /// A role with no members; every service satisfies it.
    pub fn new() -> Self {
        Role::default()
    }

    /// Require a member with the given signature.
    pub fn with(mut self, name: impl Into<String>, signature: Signature) -> Self {
        self.members.insert(name.into(), signature);
        self
    }

    /// Build a role from `(member, signature)` pairs in the signature DSL.
    pub fn parse<'a>(
        members: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, SignatureParseError> {
        members
            .into_iter()
            .map(|(name, signature)| {
                let signature: Signature = signature.parse()?;
                Ok::<_, SignatureParseError>((name.to_string(), signature))
            })
            .collect()
    }

    /// The expected signature of `member`.
    pub fn signature(&self, member: &str) -> Option<&Signature> {
        self.members.get(member)
    }

    /// Required members, ordered by name.
    pub fn members(&self) -> impl Iterator<Item = (&str, &Signature)> {
        self.members.iter().map(|(name, sig)| (name.as_str(), sig))
    }
}

impl<S: Into<String>> FromIterator<(S, Signature)> for Role {
    fn from_iter<I: IntoIterator<Item = (S, Signature)>>(iter: I) -> Self {
        Role {
            members: iter.into_iter().map(|(name, sig)| (name.into(), sig)).collect(),
        }
    }
}

/// A service narrowed to the members of a role.
#[derive(Debug, Clone)]
pub struct RoleView<'s> {
    service: &'s Service,
    members: BTreeMap<&'s str, &'s Member>,
}

impl<'s> RoleView<'s> {
    /// Name of the underlying service.
    pub fn service_name(&self) -> &'s str {
        self.service.name()
    }

    /// A member the role asked for.
    pub fn get(&self, name: &str) -> Option<&'s Member> {
        self.members.get(name).copied()
    }

    /// Members in the view, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&'s str, &'s Member)> + '_ {
        self.members.iter().map(|(name, member)| (*name, *member))
    }
}

/// Decides whether a service can play a role.
pub trait DuckMatcher: Send + Sync {
    /// View `candidate` as `role`, or explain why it does not fit.
    fn expect_role<'s>(
        &self,
        role: &Role,
        candidate: &'s Service,
    ) -> Result<RoleView<'s>, RoleMismatch>;
}

/// The default matcher.
///
/// Every role member must exist on the candidate. A method that declares a
/// signature must satisfy the role's; a method without one is accepted on
/// its name alone. Fields are accepted into the view but cannot be called.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralMatcher;

impl DuckMatcher for StructuralMatcher {
    fn expect_role<'s>(
        &self,
        role: &Role,
        candidate: &'s Service,
    ) -> Result<RoleView<'s>, RoleMismatch> {
        let mut members = BTreeMap::new();
        for (name, expected) in role.members() {
            let (key, member) = candidate
                .members()
                .find(|(member_name, _)| *member_name == name)
                .ok_or_else(|| RoleMismatch::new(name, "member not found"))?;

            if let Some(declared) = member.signature() {
                if !declared.satisfies(expected) {
                    return Err(RoleMismatch::new(
                        name,
                        format!("signature {} does not satisfy {}", declared, expected),
                    ));
                }
            }
            members.insert(key, member);
        }
        Ok(RoleView {
            service: candidate,
            members,
        })
    }
}
