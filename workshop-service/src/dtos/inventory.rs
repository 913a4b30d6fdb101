use super::{validate_hours, validate_price, validate_stock};
use crate::models::{NewPart, NewTask, TaskStatus};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePartRequest {
    #[validate(length(min = 1, message = "Part name cannot be empty"))]
    pub name: String,
    #[validate(custom(function = "validate_price"))]
    #[serde(default)]
    pub price: Decimal,
    #[validate(custom(function = "validate_stock"))]
    #[serde(default)]
    pub quantity: Decimal,
    pub part_number: Option<String>,
    pub manufacturer: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub vendor_id: Option<Uuid>,
}

impl From<CreatePartRequest> for NewPart {
    fn from(req: CreatePartRequest) -> Self {
        Self {
            name: req.name,
            price: req.price,
            quantity: req.quantity,
            part_number: req.part_number,
            manufacturer: req.manufacturer,
            category: req.category,
            location: req.location,
            vendor_id: req.vendor_id,
            invoice_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, message = "Task title cannot be empty"))]
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    #[validate(custom(function = "validate_hours"))]
    #[serde(default)]
    pub hours_estimated: Decimal,
    #[validate(custom(function = "validate_hours"))]
    #[serde(default)]
    pub hours_spent: Decimal,
    #[validate(custom(function = "validate_price"))]
    #[serde(default)]
    pub price: Decimal,
}

impl From<CreateTaskRequest> for NewTask {
    fn from(req: CreateTaskRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            status: req.status.unwrap_or(TaskStatus::Pending),
            hours_estimated: req.hours_estimated,
            hours_spent: req.hours_spent,
            price: req.price,
            invoice_id: None,
        }
    }
}
