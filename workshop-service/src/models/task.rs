//! Labor task model for workshop-service.

use super::amount::{check_non_negative, HOURS_LIMIT, MONEY_LIMIT};
use super::item::CustomLaborData;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "in-progress" => TaskStatus::InProgress,
            "completed" => TaskStatus::Completed,
            _ => TaskStatus::Pending,
        }
    }
}

/// Labor task. Billed on at most one invoice at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub org_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub hours_estimated: Decimal,
    pub hours_spent: Decimal,
    pub price: Decimal,
    pub invoice_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl Task {
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_string(&self.status)
    }
}

/// Input for creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub hours_estimated: Decimal,
    pub hours_spent: Decimal,
    pub price: Decimal,
    pub invoice_id: Option<Uuid>,
}

impl NewTask {
    pub fn check_amounts(&self) -> Result<(), String> {
        check_non_negative("hours_estimated", self.hours_estimated, HOURS_LIMIT)
            .and_then(|_| check_non_negative("hours_spent", self.hours_spent, HOURS_LIMIT))
            .and_then(|_| check_non_negative("price", self.price, MONEY_LIMIT))
            .map_err(|e| format!("task '{}': {}", self.title, e))
    }

    /// A task created by an invoice labor line: completed, with the billed
    /// hours as both estimate and actual, rounded to task precision.
    pub fn billed_on_invoice(
        data: &CustomLaborData,
        hours: Decimal,
        hourly_price: Decimal,
        invoice_id: Uuid,
    ) -> Self {
        let hours_billed = hours.round_dp(2);
        Self {
            title: data.title.clone(),
            description: data.description.clone(),
            status: TaskStatus::Completed,
            hours_estimated: hours_billed,
            hours_spent: hours_billed,
            price: hourly_price.saturating_mul(hours).round_dp(2),
            invoice_id: Some(invoice_id),
        }
    }
}
