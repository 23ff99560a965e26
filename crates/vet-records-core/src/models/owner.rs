//! Owner (client) models.

use serde::{Deserialize, Serialize};

use super::{Patient, Table};

/// A pet owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Owner {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    /// Postal address, single line
    pub address: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Patients linked to this owner, present when read with the join
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patients: Vec<Patient>,
}

impl Table for Owner {
    const NAME: &'static str = "owners";
}

impl Owner {
    /// Contact lines shown by the owner panel, in display order.
    pub fn contact_lines(&self) -> [&str; 4] {
        [
            self.name.as_str(),
            self.phone.as_str(),
            self.email.as_str(),
            self.address.as_str(),
        ]
    }
}

/// Fields for creating an owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewOwner {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

/// Partial update for an owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OwnerChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl From<NewOwner> for OwnerChanges {
    fn from(owner: NewOwner) -> Self {
        Self {
            name: Some(owner.name),
            phone: Some(owner.phone),
            email: Some(owner.email),
            address: Some(owner.address),
        }
    }
}
