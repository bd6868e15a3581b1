use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use service_core::error::AppError;
use validator::Validate;

use super::blank_as_none;
use crate::models::{CreateService, UpdateService};
use crate::services::assembler::parse_decimal;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateServiceRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(required(message = "Name and price are required"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "blank_as_none")]
    pub description: Option<String>,

    /// Number or numeric string.
    #[serde(default)]
    #[validate(required(message = "Name and price are required"))]
    pub price: Option<Value>,
}

impl CreateServiceRequest {
    pub fn into_model(self) -> Result<CreateService, AppError> {
        let price = match &self.price {
            Some(raw) => parse_price(raw)?,
            None => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Name and price are required"
                )))
            }
        };
        Ok(CreateService {
            name: self.name.unwrap_or_default(),
            description: self.description,
            price,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateServiceRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
}

impl UpdateServiceRequest {
    pub fn into_model(self) -> Result<UpdateService, AppError> {
        let price = match &self.price {
            Some(raw) => Some(parse_price(raw)?),
            None => None,
        };
        Ok(UpdateService {
            name: self.name,
            description: self.description,
            price,
        })
    }
}

fn parse_price(raw: &Value) -> Result<Decimal, AppError> {
    let price = parse_decimal(raw)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Price must be a number")))?;
    if price < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!("Price must be >= 0")));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn price_is_read_exactly_from_numbers_and_strings() {
        for raw in [json!(19.99), json!("19.99")] {
            let req: CreateServiceRequest =
                serde_json::from_value(json!({ "name": "Audit", "price": raw })).unwrap();
            assert!(req.validate().is_ok());
            let model = req.into_model().unwrap();
            assert_eq!(model.price, Decimal::from_str("19.99").unwrap());
        }
    }

    #[test]
    fn missing_price_fails_validation() {
        let req: CreateServiceRequest =
            serde_json::from_value(json!({ "name": "Audit", "price": null })).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn negative_price_is_rejected() {
        let req: UpdateServiceRequest = serde_json::from_value(json!({ "price": -5 })).unwrap();
        let err = req.into_model().unwrap_err();
        assert_eq!(err.message(), "Price must be >= 0");
    }
}
