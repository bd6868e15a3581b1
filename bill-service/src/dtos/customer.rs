use serde::Deserialize;
use validator::Validate;

use super::blank_as_none;
use crate::models::{CreateCustomer, UpdateCustomer};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(required(message = "Name, email, and phone are required"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(required(message = "Name, email, and phone are required"))]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(required(message = "Name, email, and phone are required"))]
    pub phone: Option<String>,

    #[serde(default, deserialize_with = "blank_as_none")]
    pub address: Option<String>,
}

impl CreateCustomerRequest {
    /// Only meaningful after `validate()` has passed.
    pub fn into_model(self) -> CreateCustomer {
        CreateCustomer {
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
            address: self.address,
        }
    }
}

/// Partial update; blank values leave the stored field as it is.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCustomerRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub address: Option<String>,
}

impl From<UpdateCustomerRequest> for UpdateCustomer {
    fn from(req: UpdateCustomerRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            phone: req.phone,
            address: req.address,
        }
    }
}
