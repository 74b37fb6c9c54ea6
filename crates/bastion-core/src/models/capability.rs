//! Capability model.
//!
//! The set of capabilities is closed: every name a role may grant is a
//! variant of [`Capability`]. Anything else is unknown and never grants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named permission checked against a role's capability mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CreateContent,
    UpdateContent,
    DeleteContent,
    Publish,
    ManageDocuments,
    ManageLeads,
    ManageCompany,
    ManageSeo,
    ManageTelegram,
    BulkImport,
    ManageUsers,
    ManageRoles,
    ReadAudit,
    UpdateTenant,
    DeleteTenant,
}

impl Capability {
    pub const ALL: [Capability; 15] = [
        Capability::CreateContent,
        Capability::UpdateContent,
        Capability::DeleteContent,
        Capability::Publish,
        Capability::ManageDocuments,
        Capability::ManageLeads,
        Capability::ManageCompany,
        Capability::ManageSeo,
        Capability::ManageTelegram,
        Capability::BulkImport,
        Capability::ManageUsers,
        Capability::ManageRoles,
        Capability::ReadAudit,
        Capability::UpdateTenant,
        Capability::DeleteTenant,
    ];

    /// The wire/storage name of the capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CreateContent => "create_content",
            Capability::UpdateContent => "update_content",
            Capability::DeleteContent => "delete_content",
            Capability::Publish => "publish",
            Capability::ManageDocuments => "manage_documents",
            Capability::ManageLeads => "manage_leads",
            Capability::ManageCompany => "manage_company",
            Capability::ManageSeo => "manage_seo",
            Capability::ManageTelegram => "manage_telegram",
            Capability::BulkImport => "bulk_import",
            Capability::ManageUsers => "manage_users",
            Capability::ManageRoles => "manage_roles",
            Capability::ReadAudit => "read_audit",
            Capability::UpdateTenant => "update_tenant",
            Capability::DeleteTenant => "delete_tenant",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCapability(pub String);

impl fmt::Display for UnknownCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown capability: {}", self.0)
    }
}

impl std::error::Error for UnknownCapability {}

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}
