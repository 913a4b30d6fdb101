//! Invoice line items.
//!
//! Items are persisted in a flat row shape (`kind`, `part_id`, `task_id`,
//! creation flags and optional JSON payloads). In memory an item's linkage is
//! an [`ItemLine`], so only the combinations valid for its kind can exist.

use super::amount::{check_non_negative, check_positive, MONEY_LIMIT, QUANTITY_LIMIT};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// Fields for a part that does not exist in inventory yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPartData {
    pub name: String,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<Uuid>,
}

/// Fields for a labor task that does not exist yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomLaborData {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartLine {
    /// Consumes stock from an existing part.
    Stock { part_id: Uuid },
    /// Creates a new inventory part for this line.
    Custom(CustomPartData),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LaborLine {
    /// Bills an existing task.
    Task { task_id: Uuid },
    /// Creates a completed task for this line.
    Custom(CustomLaborData),
    /// Labor with no task record behind it.
    Unlinked,
}

/// What an item is, and what it links to.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemLine {
    Part(PartLine),
    Labor(LaborLine),
    Other { custom_part: Option<CustomPartData> },
}

/// Column values for an [`ItemLine`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatLine {
    pub kind: &'static str,
    pub part_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub creates_inventory_part: bool,
    pub creates_task: bool,
    pub custom_part_data: Option<CustomPartData>,
    pub custom_labor_data: Option<CustomLaborData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemShapeError {
    #[error("unknown item kind '{0}'")]
    UnknownKind(String),
    #[error("{0} item cannot reference a part")]
    UnexpectedPart(&'static str),
    #[error("{0} item cannot reference a task")]
    UnexpectedTask(&'static str),
    #[error("{0} item cannot carry custom labor data")]
    UnexpectedLaborData(&'static str),
    #[error("{0} item cannot carry custom part data")]
    UnexpectedPartData(&'static str),
    #[error("part item must reference a part or carry custom part data")]
    MissingPartLink,
    #[error("part item references a part and also asks to create one")]
    AmbiguousPartLink,
    #[error("labor item references a task and also asks to create one")]
    AmbiguousTaskLink,
    #[error("creates_inventory_part is set without custom part data")]
    MissingCustomPartData,
    #[error("creates_task is set without custom labor data")]
    MissingCustomLaborData,
    #[error("custom part data is present but creates_inventory_part is not set")]
    UnflaggedCustomPart,
    #[error("custom labor data is present but creates_task is not set")]
    UnflaggedCustomLabor,
}

impl ItemLine {
    pub fn kind(&self) -> &'static str {
        match self {
            ItemLine::Part(_) => "part",
            ItemLine::Labor(_) => "labor",
            ItemLine::Other { .. } => "other",
        }
    }

    /// Build a line from its flat column values, rejecting combinations the
    /// kind does not allow.
    pub fn from_flat(
        kind: &str,
        part_id: Option<Uuid>,
        task_id: Option<Uuid>,
        creates_inventory_part: bool,
        creates_task: bool,
        custom_part_data: Option<CustomPartData>,
        custom_labor_data: Option<CustomLaborData>,
    ) -> Result<Self, ItemShapeError> {
        let custom_part = match (creates_inventory_part, custom_part_data) {
            (true, Some(data)) => Some(data),
            (true, None) => return Err(ItemShapeError::MissingCustomPartData),
            (false, Some(_)) => return Err(ItemShapeError::UnflaggedCustomPart),
            (false, None) => None,
        };
        let custom_labor = match (creates_task, custom_labor_data) {
            (true, Some(data)) => Some(data),
            (true, None) => return Err(ItemShapeError::MissingCustomLaborData),
            (false, Some(_)) => return Err(ItemShapeError::UnflaggedCustomLabor),
            (false, None) => None,
        };

        match kind {
            "part" => {
                if task_id.is_some() {
                    return Err(ItemShapeError::UnexpectedTask("part"));
                }
                if custom_labor.is_some() {
                    return Err(ItemShapeError::UnexpectedLaborData("part"));
                }
                match (part_id, custom_part) {
                    (Some(part_id), None) => Ok(ItemLine::Part(PartLine::Stock { part_id })),
                    (None, Some(data)) => Ok(ItemLine::Part(PartLine::Custom(data))),
                    (Some(_), Some(_)) => Err(ItemShapeError::AmbiguousPartLink),
                    (None, None) => Err(ItemShapeError::MissingPartLink),
                }
            }
            "labor" => {
                if part_id.is_some() {
                    return Err(ItemShapeError::UnexpectedPart("labor"));
                }
                if custom_part.is_some() {
                    return Err(ItemShapeError::UnexpectedPartData("labor"));
                }
                match (task_id, custom_labor) {
                    (Some(task_id), None) => Ok(ItemLine::Labor(LaborLine::Task { task_id })),
                    (None, Some(data)) => Ok(ItemLine::Labor(LaborLine::Custom(data))),
                    (Some(_), Some(_)) => Err(ItemShapeError::AmbiguousTaskLink),
                    (None, None) => Ok(ItemLine::Labor(LaborLine::Unlinked)),
                }
            }
            "other" => {
                if part_id.is_some() {
                    return Err(ItemShapeError::UnexpectedPart("other"));
                }
                if task_id.is_some() {
                    return Err(ItemShapeError::UnexpectedTask("other"));
                }
                if custom_labor.is_some() {
                    return Err(ItemShapeError::UnexpectedLaborData("other"));
                }
                Ok(ItemLine::Other { custom_part })
            }
            other => Err(ItemShapeError::UnknownKind(other.to_string())),
        }
    }

    pub fn to_flat(&self) -> FlatLine {
        match self {
            ItemLine::Part(PartLine::Stock { part_id }) => FlatLine {
                kind: "part",
                part_id: Some(*part_id),
                ..Default::default()
            },
            ItemLine::Part(PartLine::Custom(data)) => FlatLine {
                kind: "part",
                creates_inventory_part: true,
                custom_part_data: Some(data.clone()),
                ..Default::default()
            },
            ItemLine::Labor(LaborLine::Task { task_id }) => FlatLine {
                kind: "labor",
                task_id: Some(*task_id),
                ..Default::default()
            },
            ItemLine::Labor(LaborLine::Custom(data)) => FlatLine {
                kind: "labor",
                creates_task: true,
                custom_labor_data: Some(data.clone()),
                ..Default::default()
            },
            ItemLine::Labor(LaborLine::Unlinked) => FlatLine {
                kind: "labor",
                ..Default::default()
            },
            ItemLine::Other { custom_part } => FlatLine {
                kind: "other",
                creates_inventory_part: custom_part.is_some(),
                custom_part_data: custom_part.clone(),
                ..Default::default()
            },
        }
    }

    /// The stock part this line consumes, if any.
    pub fn stock_part_id(&self) -> Option<Uuid> {
        match self {
            ItemLine::Part(PartLine::Stock { part_id }) => Some(*part_id),
            _ => None,
        }
    }
}

/// An item to be written to an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub is_auto_added: bool,
    pub line: ItemLine,
}

impl NewInvoiceItem {
    /// Quantity must be positive and the unit price non-negative, both
    /// within what an item row holds.
    pub fn check_amounts(&self) -> Result<(), String> {
        check_positive("quantity", self.quantity, QUANTITY_LIMIT)
            .and_then(|_| check_non_negative("price", self.price, MONEY_LIMIT))
            .map_err(|e| format!("item '{}': {}", self.description, e))
    }
}

/// A stored invoice item.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub is_auto_added: bool,
    pub line: ItemLine,
    pub created_utc: DateTime<Utc>,
}

impl InvoiceItem {
    /// `quantity × price`, or `None` on overflow.
    pub fn line_total(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.price)
    }

    /// The same item as input for a later write.
    pub fn to_new(&self) -> NewInvoiceItem {
        NewInvoiceItem {
            description: self.description.clone(),
            quantity: self.quantity,
            price: self.price,
            is_auto_added: self.is_auto_added,
            line: self.line.clone(),
        }
    }
}

/// Row shape of `invoice_items`.
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceItemRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub position: i32,
    pub description: String,
    pub kind: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub part_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub is_auto_added: bool,
    pub creates_inventory_part: bool,
    pub creates_task: bool,
    pub custom_part_data: Option<Json<CustomPartData>>,
    pub custom_labor_data: Option<Json<CustomLaborData>>,
    pub created_utc: DateTime<Utc>,
}

impl TryFrom<InvoiceItemRow> for InvoiceItem {
    type Error = ItemShapeError;

    fn try_from(row: InvoiceItemRow) -> Result<Self, Self::Error> {
        let line = ItemLine::from_flat(
            &row.kind,
            row.part_id,
            row.task_id,
            row.creates_inventory_part,
            row.creates_task,
            row.custom_part_data.map(|Json(data)| data),
            row.custom_labor_data.map(|Json(data)| data),
        )?;

        Ok(InvoiceItem {
            id: row.id,
            invoice_id: row.invoice_id,
            position: row.position,
            description: row.description,
            quantity: row.quantity,
            price: row.price,
            is_auto_added: row.is_auto_added,
            line,
            created_utc: row.created_utc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_data() -> CustomPartData {
        CustomPartData {
            name: "Oil filter".to_string(),
            part_number: Some("OF-113".to_string()),
            manufacturer: None,
            category: Some("filters".to_string()),
            location: None,
            vendor_id: None,
        }
    }

    #[test]
    fn test_part_with_stock_link() {
        let part_id = Uuid::new_v4();
        let line = ItemLine::from_flat("part", Some(part_id), None, false, false, None, None)
            .unwrap();
        assert_eq!(line, ItemLine::Part(PartLine::Stock { part_id }));
        assert_eq!(line.stock_part_id(), Some(part_id));
    }

    #[test]
    fn test_part_without_link_is_rejected() {
        let err = ItemLine::from_flat("part", None, None, false, false, None, None).unwrap_err();
        assert_eq!(err, ItemShapeError::MissingPartLink);
    }

    #[test]
    fn test_part_referencing_task_is_rejected() {
        let err = ItemLine::from_flat(
            "part",
            Some(Uuid::new_v4()),
            Some(Uuid::new_v4()),
            false,
            false,
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, ItemShapeError::UnexpectedTask("part"));
    }

    #[test]
    fn test_creation_flag_requires_payload() {
        let err = ItemLine::from_flat("part", None, None, true, false, None, None).unwrap_err();
        assert_eq!(err, ItemShapeError::MissingCustomPartData);

        let err = ItemLine::from_flat("labor", None, None, false, true, None, None).unwrap_err();
        assert_eq!(err, ItemShapeError::MissingCustomLaborData);
    }

    #[test]
    fn test_payload_without_flag_is_rejected() {
        let err = ItemLine::from_flat("part", None, None, false, false, Some(filter_data()), None)
            .unwrap_err();
        assert_eq!(err, ItemShapeError::UnflaggedCustomPart);
    }

    #[test]
    fn test_labor_without_task_is_unlinked() {
        let line = ItemLine::from_flat("labor", None, None, false, false, None, None).unwrap();
        assert_eq!(line, ItemLine::Labor(LaborLine::Unlinked));
    }

    #[test]
    fn test_other_may_create_a_part_but_not_reference_one() {
        let line =
            ItemLine::from_flat("other", None, None, true, false, Some(filter_data()), None)
                .unwrap();
        assert_eq!(
            line,
            ItemLine::Other {
                custom_part: Some(filter_data())
            }
        );

        let err = ItemLine::from_flat("other", Some(Uuid::new_v4()), None, false, false, None, None)
            .unwrap_err();
        assert_eq!(err, ItemShapeError::UnexpectedPart("other"));
    }

    #[test]
    fn test_unknown_kind() {
        let err = ItemLine::from_flat("fee", None, None, false, false, None, None).unwrap_err();
        assert_eq!(err, ItemShapeError::UnknownKind("fee".to_string()));
    }

    #[test]
    fn test_custom_labor_flattens_with_flag() {
        let line = ItemLine::Labor(LaborLine::Custom(CustomLaborData {
            title: "Brake bleed".to_string(),
            description: None,
        }));
        let flat = line.to_flat();
        assert_eq!(flat.kind, "labor");
        assert!(flat.creates_task);
        assert!(!flat.creates_inventory_part);
        assert!(flat.custom_labor_data.is_some());
    }

    #[test]
    fn test_check_amounts() {
        let mut item = NewInvoiceItem {
            description: "Shop rag".to_string(),
            quantity: Decimal::ONE,
            price: Decimal::ZERO,
            is_auto_added: false,
            line: ItemLine::Other { custom_part: None },
        };
        assert!(item.check_amounts().is_ok());

        item.quantity = Decimal::ZERO;
        assert!(item.check_amounts().is_err());

        item.quantity = Decimal::ONE;
        item.price = Decimal::NEGATIVE_ONE;
        assert!(item.check_amounts().is_err());
    }

    #[test]
    fn test_check_amounts_rejects_values_the_row_cannot_hold() {
        let mut item = NewInvoiceItem {
            description: "Coolant".to_string(),
            quantity: Decimal::MAX,
            price: Decimal::TWO,
            is_auto_added: false,
            line: ItemLine::Other { custom_part: None },
        };
        let err = item.check_amounts().unwrap_err();
        assert!(err.contains("Coolant"));

        item.quantity = Decimal::new(1, 4);
        assert!(item.check_amounts().is_err());

        item.quantity = Decimal::new(1, 3);
        item.price = Decimal::new(12345, 3);
        assert!(item.check_amounts().is_err());
    }
}
