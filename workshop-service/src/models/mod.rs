//! Domain models for workshop-service.

mod amount;
mod invoice;
mod item;
mod part;
mod payment;
mod task;
mod totals;

pub use amount::{
    check_non_negative, check_positive, AmountLimit, HOURS_LIMIT, MONEY_LIMIT, PERCENT_LIMIT,
    QUANTITY_LIMIT, TAX_RATE_LIMIT,
};
pub use invoice::{
    Discount, Invoice, InvoiceDetail, InvoiceFilter, InvoiceHeaderUpdate, InvoiceStatus,
    InvoiceUpdate, NewInvoice, NewInvoiceHeader,
};
pub use item::{
    CustomLaborData, CustomPartData, FlatLine, InvoiceItem, InvoiceItemRow, ItemLine,
    ItemShapeError, LaborLine, NewInvoiceItem, PartLine,
};
pub use part::{NewPart, Part};
pub use payment::{NormalizedPayment, Payment, PaymentDraft, DEFAULT_PAYMENT_METHOD};
pub use task::{NewTask, Task, TaskStatus};
pub use totals::{InvoiceTotals, TotalsOverflow};
