//! Payload assembly for expenses, sales invoices, and client payments.
//!
//! The `build_*` functions are pure: they take validated inputs and return
//! the typed record that serializes to the request body. Reading receipt
//! files happens beforehand, through a [`FileInspector`].

use std::path::Path;

use base64::Engine;
use chrono::NaiveDate;

use crate::error::CrunchError;
use crate::model::{
    AccountRef, Client, ClientPayment, ClientRef, Expense, ExpenseDetails, ExpenseLineItem, ExpenseLineItems, Id,
    InvoiceAllocation, InvoiceAllocations, LineItemAmount, Payment, PaymentDetails, Receipt, Receipts, SalesInvoice,
    SalesInvoiceDetails, SalesInvoiceLineItem, SalesInvoiceLineItems, SupplierRef, DEFAULT_PAYMENT_METHOD,
};
use crate::money::{Money, CURRENCY};
use crate::recon::{ClientPaymentKey, ExpenseKey};
use crate::reference;
use crate::vat::{AmountCalculator, VatType};

// ── Inputs ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseInput {
    pub supplier_id: Id,
    pub posting_date: NaiveDate,
    pub payment_date: NaiveDate,
    /// `None` means EFT.
    pub payment_method: Option<String>,
    pub bank_account_id: Id,
    /// Gross amount paid.
    pub amount: Money,
    pub expense_type: String,
    pub description: String,
    pub director_id: Option<Id>,
}

impl ExpenseInput {
    pub fn payment_method(&self) -> &str {
        self.payment_method.as_deref().unwrap_or(DEFAULT_PAYMENT_METHOD)
    }

    pub fn key(&self) -> ExpenseKey {
        ExpenseKey {
            supplier_id: self.supplier_id,
            posting_date: self.posting_date,
            payment_date: self.payment_date,
            payment_method: self.payment_method().to_string(),
            bank_account_id: self.bank_account_id,
            amount: self.amount,
            expense_type: self.expense_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceInput {
    pub client_id: Id,
    pub issued_date: NaiveDate,
    /// Allocated from the client's name when absent.
    pub client_reference: Option<String>,
    pub description: String,
    /// Net unit rate.
    pub rate: Money,
    pub quantity: f64,
    /// STANDARD when true, OUTSIDE_SCOPE otherwise.
    pub add_vat: bool,
}

impl InvoiceInput {
    pub fn vat_type(&self) -> VatType {
        if self.add_vat {
            VatType::Standard
        } else {
            VatType::OutsideScope
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPaymentInput {
    pub client_id: Id,
    pub payment_date: NaiveDate,
    pub payment_method: Option<String>,
    pub bank_account_id: Id,
    pub amount: Money,
    /// Invoice the whole amount is allocated to.
    pub invoice_id: Id,
}

impl ClientPaymentInput {
    pub fn payment_method(&self) -> &str {
        self.payment_method.as_deref().unwrap_or(DEFAULT_PAYMENT_METHOD)
    }

    pub fn key(&self) -> ClientPaymentKey {
        ClientPaymentKey {
            client_id: self.client_id,
            payment_date: self.payment_date,
            payment_method: self.payment_method().to_string(),
            bank_account_id: self.bank_account_id,
            amount: self.amount,
            invoice_id: self.invoice_id,
        }
    }
}

// ── Attachments ─────────────────────────────────────────────────────

/// A receipt file read into memory. Absence of a receipt is `None` at the
/// call site; a zero-byte file is still an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn from_path(path: &Path, inspector: &dyn FileInspector) -> Result<Self, CrunchError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CrunchError::Attachment(format!("{} is not a file path", path.display())))?;
        let (content_type, data) = inspector.inspect(path)?;
        Ok(Self { file_name, content_type, data })
    }

    pub fn to_receipt(&self) -> Receipt {
        Receipt {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            file_data: base64::engine::general_purpose::STANDARD.encode(&self.data),
        }
    }
}

/// Reads a file and reports its content type.
pub trait FileInspector {
    fn inspect(&self, path: &Path) -> Result<(String, Vec<u8>), CrunchError>;
}

/// Content type from the file extension; unknown extensions are
/// `application/octet-stream`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeGuessInspector;

impl FileInspector for MimeGuessInspector {
    fn inspect(&self, path: &Path) -> Result<(String, Vec<u8>), CrunchError> {
        let data = std::fs::read(path)
            .map_err(|e| CrunchError::Attachment(format!("failed to read {}: {}", path.display(), e)))?;
        let content_type = mime_guess::from_path(path).first_or_octet_stream();
        Ok((content_type.essence_str().to_string(), data))
    }
}

// ── Builders ────────────────────────────────────────────────────────

/// Single-payment, single-line expense. Fails on an unclassified expense type.
pub fn build_expense(
    input: &ExpenseInput,
    calculator: &AmountCalculator,
    attachment: Option<&Attachment>,
) -> Result<Expense, CrunchError> {
    let split = calculator.expense_split(input.amount, &input.expense_type)?;

    Ok(Expense {
        expense_id: None,
        amount: input.amount,
        expense_details: ExpenseDetails {
            supplier: SupplierRef { supplier_id: input.supplier_id },
            posting_date: input.posting_date,
        },
        payment_details: PaymentDetails {
            payment: vec![Payment {
                payment_date: input.payment_date,
                payment_method: input.payment_method().to_string(),
                bank_account: AccountRef { account_id: input.bank_account_id },
                amount: input.amount,
            }],
        },
        expense_line_items: ExpenseLineItems {
            count: 1,
            line_item_gross_total: split.gross,
            expense_line_items: vec![ExpenseLineItem {
                expense_type: input.expense_type.clone(),
                benefiting_director: input.director_id,
                line_item_description: input.description.clone(),
                line_item_amount: LineItemAmount {
                    currency_code: Some(CURRENCY.to_string()),
                    net_amount: split.net,
                    gross_amount: split.gross,
                    vat_amount: split.vat,
                    vat_rate: None,
                },
            }],
        },
        receipts: attachment.map(|a| Receipts {
            count: 1,
            receipt: vec![a.to_receipt()],
        }),
    })
}

/// Single-line sales invoice for `client`.
///
/// Without an explicit reference, the first free `<initials><NNN>` not in
/// `used_references` is taken.
pub fn build_invoice<S: AsRef<str>>(
    input: &InvoiceInput,
    calculator: &AmountCalculator,
    client: &Client,
    used_references: &[S],
) -> Result<SalesInvoice, CrunchError> {
    let net = calculator.line_amount(input.rate, input.quantity)?;
    let vat_type = input.vat_type();
    let split = calculator.invoice_split(net, vat_type);
    let client_reference = input
        .client_reference
        .clone()
        .unwrap_or_else(|| reference::allocate(&client.name, used_references));

    Ok(SalesInvoice {
        sales_invoice_id: None,
        currency: Some(CURRENCY.to_string()),
        sales_invoice_details: SalesInvoiceDetails {
            client: ClientRef { client_id: input.client_id },
            client_reference: Some(client_reference),
            issued_date: input.issued_date,
            payment_terms_days: client.payment_terms_days,
            state: None,
        },
        sales_invoice_line_items: SalesInvoiceLineItems {
            sales_invoice_line_item: vec![SalesInvoiceLineItem {
                line_item_description: input.description.clone(),
                quantity: input.quantity,
                rate: input.rate,
                line_item_amount: LineItemAmount {
                    currency_code: None,
                    net_amount: split.net,
                    gross_amount: split.gross,
                    vat_amount: split.vat,
                    vat_rate: Some(calculator.rate()),
                },
                vat_type: Some(vat_type),
            }],
            count: 1,
        },
    })
}

/// Payment allocating its whole amount to one invoice.
pub fn build_client_payment(input: &ClientPaymentInput) -> ClientPayment {
    ClientPayment {
        client_payment_id: None,
        payment_date: input.payment_date,
        payment_method: input.payment_method().to_string(),
        bank_account: AccountRef { account_id: input.bank_account_id },
        amount: input.amount,
        currency: Some(CURRENCY.to_string()),
        client: ClientRef { client_id: input.client_id },
        sales_invoices: InvoiceAllocations {
            sales_invoice: vec![InvoiceAllocation {
                sales_invoice_id: input.invoice_id,
                allocated_amount: Some(input.amount),
            }],
        },
    }
}
