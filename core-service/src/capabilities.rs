//! Subscription tiers and the features each one unlocks.
//!
//! [`capabilities_for`] is the only place tier ordering is interpreted; every
//! surface asks the resulting [`CapabilitySet`] instead of comparing tiers.

use core_import::SourceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Subscription tier, lowest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Casual,
    Pro,
    Freelancer,
    Team,
    Agency,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Casual,
        Tier::Pro,
        Tier::Freelancer,
        Tier::Team,
        Tier::Agency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Casual => "casual",
            Tier::Pro => "pro",
            Tier::Freelancer => "freelancer",
            Tier::Team => "team",
            Tier::Agency => "agency",
        }
    }
}

impl FromStr for Tier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "casual" => Ok(Tier::Casual),
            "pro" => Ok(Tier::Pro),
            "freelancer" => Ok(Tier::Freelancer),
            "team" => Ok(Tier::Team),
            "agency" => Ok(Tier::Agency),
            _ => Err(CoreError::UnknownTier(s.to_string())),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gated product feature.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    LocalImport,
    LinkImport,
    CloudSync,
    DriveImport,
    ClientFolders,
    TeamWorkspace,
    BatchExport,
}

impl Capability {
    /// The capability that unlocks an import source.
    pub fn required_for_source(source: SourceKind) -> Capability {
        match source {
            SourceKind::Local => Capability::LocalImport,
            SourceKind::Link => Capability::LinkImport,
            SourceKind::Cloud => Capability::CloudSync,
            SourceKind::Drive => Capability::DriveImport,
        }
    }

    /// Lowest tier that has this capability.
    pub fn minimum_tier(&self) -> Tier {
        match self {
            Capability::LocalImport | Capability::LinkImport => Tier::Casual,
            Capability::CloudSync => Tier::Pro,
            Capability::DriveImport | Capability::ClientFolders => Tier::Freelancer,
            Capability::TeamWorkspace => Tier::Team,
            Capability::BatchExport => Tier::Agency,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::LocalImport => "local_import",
            Capability::LinkImport => "link_import",
            Capability::CloudSync => "cloud_sync",
            Capability::DriveImport => "drive_import",
            Capability::ClientFolders => "client_folders",
            Capability::TeamWorkspace => "team_workspace",
            Capability::BatchExport => "batch_export",
        }
    }

    const ALL: [Capability; 7] = [
        Capability::LocalImport,
        Capability::LinkImport,
        Capability::CloudSync,
        Capability::DriveImport,
        Capability::ClientFolders,
        Capability::TeamWorkspace,
        Capability::BatchExport,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities granted to a tier.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn allows_source(&self, source: SourceKind) -> bool {
        self.contains(Capability::required_for_source(source))
    }

    /// Fails with `CapabilityMissing` unless `capability` is granted.
    pub fn require(&self, capability: Capability) -> Result<(), CoreError> {
        if self.contains(capability) {
            Ok(())
        } else {
            Err(CoreError::CapabilityMissing {
                capability: capability.to_string(),
                message: format!("requires the {} tier or higher", capability.minimum_tier()),
            })
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Resolve the capabilities of a tier.
pub fn capabilities_for(tier: Tier) -> CapabilitySet {
    Capability::ALL
        .into_iter()
        .filter(|capability| tier >= capability.minimum_tier())
        .collect()
}
