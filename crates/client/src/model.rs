//! Typed views of the remote records.
//!
//! Field names follow the API's camelCase JSON. The same structs are used
//! for snapshots (deserialized) and for payloads (serialized), so optional
//! remote-assigned fields (`*Id`, `state`) are skipped when absent.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CrunchError;
use crate::money::{Money, VatRate};
use crate::vat::VatType;

/// Remote identifier.
pub type Id = i64;

/// Payment method assumed when the caller does not name one.
pub const DEFAULT_PAYMENT_METHOD: &str = "EFT";

// ── References ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierRef {
    pub supplier_id: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRef {
    pub client_id: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRef {
    pub account_id: Id,
}

// ── Reference data ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub supplier_id: Id,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub account_id: Id,
    /// Display name; the API calls this field `account`.
    #[serde(rename = "account", default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub client_id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_terms_days: Option<u32>,
}

// ── Line items ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemAmount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    pub net_amount: Money,
    pub gross_amount: Money,
    pub vat_amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_rate: Option<VatRate>,
}

// ── Expenses ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expense_id: Option<Id>,
    pub amount: Money,
    pub expense_details: ExpenseDetails,
    #[serde(default)]
    pub payment_details: PaymentDetails,
    #[serde(default)]
    pub expense_line_items: ExpenseLineItems,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipts: Option<Receipts>,
}

impl Expense {
    pub fn first_payment(&self) -> Option<&Payment> {
        self.payment_details.payment.first()
    }

    pub fn first_line_item(&self) -> Option<&ExpenseLineItem> {
        self.expense_line_items.expense_line_items.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDetails {
    pub supplier: SupplierRef,
    #[serde(with = "iso_date")]
    pub posting_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(default)]
    pub payment: Vec<Payment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(with = "iso_date")]
    pub payment_date: NaiveDate,
    pub payment_method: String,
    pub bank_account: AccountRef,
    pub amount: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseLineItems {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub line_item_gross_total: Money,
    #[serde(default)]
    pub expense_line_items: Vec<ExpenseLineItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseLineItem {
    pub expense_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benefiting_director: Option<Id>,
    #[serde(default)]
    pub line_item_description: String,
    pub line_item_amount: LineItemAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipts {
    pub count: usize,
    pub receipt: Vec<Receipt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub file_name: String,
    pub content_type: String,
    /// Base64-encoded file contents
    pub file_data: String,
}

// ── Sales invoices ──────────────────────────────────────────────────

/// Invoice lifecycle. Anything other than DRAFT and SETTLED counts as issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InvoiceState {
    Draft,
    Settled,
    Issued(String),
}

impl From<String> for InvoiceState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "DRAFT" => InvoiceState::Draft,
            "SETTLED" => InvoiceState::Settled,
            _ => InvoiceState::Issued(s),
        }
    }
}

impl From<InvoiceState> for String {
    fn from(state: InvoiceState) -> Self {
        match state {
            InvoiceState::Draft => "DRAFT".to_string(),
            InvoiceState::Settled => "SETTLED".to_string(),
            InvoiceState::Issued(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesInvoice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_invoice_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub sales_invoice_details: SalesInvoiceDetails,
    #[serde(default)]
    pub sales_invoice_line_items: SalesInvoiceLineItems,
}

impl SalesInvoice {
    pub fn client_id(&self) -> Id {
        self.sales_invoice_details.client.client_id
    }

    /// Sum of every line's gross amount.
    pub fn gross_total(&self) -> Money {
        self.sales_invoice_line_items
            .sales_invoice_line_item
            .iter()
            .map(|item| item.line_item_amount.gross_amount)
            .sum()
    }

    pub fn is_draft(&self) -> bool {
        self.sales_invoice_details.state == Some(InvoiceState::Draft)
    }

    pub fn is_settled(&self) -> bool {
        self.sales_invoice_details.state == Some(InvoiceState::Settled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesInvoiceDetails {
    pub client: ClientRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_reference: Option<String>,
    #[serde(with = "iso_date")]
    pub issued_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_terms_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<InvoiceState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesInvoiceLineItems {
    #[serde(default)]
    pub sales_invoice_line_item: Vec<SalesInvoiceLineItem>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesInvoiceLineItem {
    #[serde(default)]
    pub line_item_description: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub rate: Money,
    pub line_item_amount: LineItemAmount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_type: Option<VatType>,
}

// ── Client payments ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPayment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_payment_id: Option<Id>,
    #[serde(with = "iso_date")]
    pub payment_date: NaiveDate,
    pub payment_method: String,
    pub bank_account: AccountRef,
    pub amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub client: ClientRef,
    #[serde(default)]
    pub sales_invoices: InvoiceAllocations,
}

impl ClientPayment {
    pub fn first_invoice_id(&self) -> Option<Id> {
        self.sales_invoices.sales_invoice.first().map(|a| a.sales_invoice_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceAllocations {
    #[serde(default)]
    pub sales_invoice: Vec<InvoiceAllocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceAllocation {
    pub sales_invoice_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated_amount: Option<Money>,
}

// ── Decoding helpers ────────────────────────────────────────────────

/// Decode the list under `key` in a collection response.
///
/// A missing or null key is an empty list; a single object is a list of
/// one; a bare top-level array is accepted as-is.
pub fn decode_list<T: DeserializeOwned>(response: &serde_json::Value, key: &str) -> Result<Vec<T>, CrunchError> {
    let items = match response {
        serde_json::Value::Array(_) => response,
        _ => &response[key],
    };
    let decode_err = |e: serde_json::Error| CrunchError::Decode(format!("{}: {}", key, e));
    match items {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(_) => serde_json::from_value(items.clone()).map_err(decode_err),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(items.clone()).map_err(decode_err)?]),
        other => Err(CrunchError::Decode(format!("{}: expected a list, got {}", key, other))),
    }
}

pub fn decode_one<T: DeserializeOwned>(response: &serde_json::Value, what: &str) -> Result<T, CrunchError> {
    serde_json::from_value(response.clone()).map_err(|e| CrunchError::Decode(format!("{}: {}", what, e)))
}

/// `YYYY-MM-DD`; longer timestamps are truncated to their date part.
mod iso_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format("%Y-%m-%d"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        let date_part = s.get(..10).unwrap_or(&s);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(serde::de::Error::custom)
    }
}
