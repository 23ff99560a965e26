//! Owner registration form.

use super::{required, FormContext, SubmitResult, ValidationResult};
use crate::models::{NewOwner, Owner, OwnerChanges};
use crate::notify::messages;
use crate::services::{create_owner, update_owner};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerForm {
    pub id: Option<String>,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

impl OwnerForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edit(owner: &Owner) -> Self {
        Self {
            id: Some(owner.id.clone()),
            name: owner.name.clone(),
            phone: owner.phone.clone(),
            email: owner.email.clone(),
            address: owner.address.clone(),
        }
    }

    pub fn validate(&self) -> ValidationResult<NewOwner> {
        Ok(NewOwner {
            name: required("name", &self.name)?,
            phone: required("phone", &self.phone)?,
            email: required("email", &self.email)?,
            address: required("address", &self.address)?,
        })
    }

    pub async fn submit(&self, ctx: &FormContext<'_>) -> SubmitResult<Owner> {
        let owner = self.validate()?;
        match &self.id {
            Some(id) => {
                let result = update_owner(ctx.store, id, &OwnerChanges::from(owner)).await;
                ctx.finish(result, messages::OWNER_UPDATED, messages::OWNER_UPDATE_FAILED)
            }
            None => {
                let result = create_owner(ctx.store, &owner).await;
                ctx.finish(result, messages::OWNER_CREATED, messages::OWNER_CREATE_FAILED)
            }
        }
    }
}
