//! Assurance levels and the attribute set a relying party may request.
//!
//! The remote service accepts attributes per registration level: a request
//! carrying an attribute the user's level cannot provide is rejected
//! server-side, so the selection here filters the caller's wishes down to
//! the combination the service accepts before anything goes on the wire.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minimum identity-registration rigor required of the user.
///
/// Levels are totally ordered; a higher level is a superset of the lower
/// levels' eligible attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssuranceLevel {
    Basic,
    Extended,
    Plus,
}

impl AssuranceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssuranceLevel::Basic => "BASIC",
            AssuranceLevel::Extended => "EXTENDED",
            AssuranceLevel::Plus => "PLUS",
        }
    }
}

impl fmt::Display for AssuranceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity attributes the service can return about a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeKind {
    EmailAddress,
    RelyingPartyUserId,
    BasicUserInfo,
    DateOfBirth,
    Ssn,
    AllEmailAddresses,
    AllPhoneNumbers,
    Age,
    Addresses,
    RegistrationLevel,
}

impl AttributeKind {
    /// Whether a user registered at `level` can provide this attribute.
    pub fn eligible_at(&self, level: AssuranceLevel) -> bool {
        match self {
            // Available to every registered user.
            AttributeKind::EmailAddress
            | AttributeKind::RelyingPartyUserId
            | AttributeKind::RegistrationLevel => true,
            _ => level >= AssuranceLevel::Extended,
        }
    }
}

/// The conventional default request: e-mail plus the relying-party user id.
pub fn default_attributes() -> BTreeSet<AttributeKind> {
    BTreeSet::from([AttributeKind::EmailAddress, AttributeKind::RelyingPartyUserId])
}

// EMAIL_ADDRESS and RELYING_PARTY_USER_ID lead the wire list when present.
const LEAD: [AttributeKind; 2] = [AttributeKind::EmailAddress, AttributeKind::RelyingPartyUserId];

// Fixed order of the level-gated attributes for EXTENDED and PLUS.
const LEVEL_GATED: [AttributeKind; 8] = [
    AttributeKind::BasicUserInfo,
    AttributeKind::RegistrationLevel,
    AttributeKind::AllEmailAddresses,
    AttributeKind::AllPhoneNumbers,
    AttributeKind::DateOfBirth,
    AttributeKind::Age,
    AttributeKind::Ssn,
    AttributeKind::Addresses,
];

/// Filters `requested` down to the attributes eligible at `level`, in the
/// deterministic order the wire payload carries them.
///
/// Ineligible attributes are dropped silently, mirroring the service's
/// per-level policy. An empty request set is a caller error and is
/// rejected before any network call.
pub fn select(
    requested: &BTreeSet<AttributeKind>,
    level: AssuranceLevel,
) -> Result<Vec<AttributeKind>> {
    if requested.is_empty() {
        return Err(Error::InvalidRequest(
            "at least one attribute must be requested; \
             for BASIC level only EMAIL_ADDRESS, RELYING_PARTY_USER_ID and \
             REGISTRATION_LEVEL are available"
                .into(),
        ));
    }

    let mut selected: Vec<AttributeKind> = LEAD
        .iter()
        .copied()
        .filter(|attr| requested.contains(attr))
        .collect();

    match level {
        AssuranceLevel::Basic => {
            if requested.contains(&AttributeKind::RegistrationLevel) {
                selected.push(AttributeKind::RegistrationLevel);
            }
        }
        AssuranceLevel::Extended | AssuranceLevel::Plus => {
            selected.extend(
                LEVEL_GATED
                    .iter()
                    .copied()
                    .filter(|attr| requested.contains(attr)),
            );
        }
    }

    Ok(selected)
}
