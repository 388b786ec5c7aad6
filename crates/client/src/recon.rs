//! Snapshot-based duplicate detection.
//!
//! The remote API has no idempotency key, so before creating a record the
//! caller proves no equivalent one exists by scanning a cached snapshot of
//! that entity kind. Snapshots are loaded explicitly and never refreshed
//! behind the caller's back: a record created after the last load is not
//! visible until [`ReconciliationEngine::reload`].

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;

use crate::auth::AuthSession;
use crate::error::CrunchError;
use crate::model::{decode_list, BankAccount, Client, ClientPayment, Expense, Id, SalesInvoice, Supplier};
use crate::money::Money;
use crate::transport::SigningTransport;

// ── Kinds ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    Expenses,
    Suppliers,
    Accounts,
    Clients,
    Invoices,
    ClientPayments,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 6] = [
        SnapshotKind::Expenses,
        SnapshotKind::Suppliers,
        SnapshotKind::Accounts,
        SnapshotKind::Clients,
        SnapshotKind::Invoices,
        SnapshotKind::ClientPayments,
    ];

    /// Collection path under the API base.
    pub fn path(self) -> &'static str {
        match self {
            SnapshotKind::Expenses => "/expenses",
            SnapshotKind::Suppliers => "/suppliers",
            SnapshotKind::Accounts => "/accounts",
            SnapshotKind::Clients => "/clients",
            SnapshotKind::Invoices => "/sales_invoices",
            SnapshotKind::ClientPayments => "/client_payments",
        }
    }

    /// Key holding the record list in the collection response.
    pub fn response_key(self) -> &'static str {
        match self {
            SnapshotKind::Expenses => "expense",
            SnapshotKind::Suppliers => "supplier",
            SnapshotKind::Accounts => "bankAccounts",
            SnapshotKind::Clients => "client",
            SnapshotKind::Invoices => "salesInvoice",
            SnapshotKind::ClientPayments => "clientPayment",
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SnapshotKind::Expenses => "expenses",
            SnapshotKind::Suppliers => "suppliers",
            SnapshotKind::Accounts => "accounts",
            SnapshotKind::Clients => "clients",
            SnapshotKind::Invoices => "invoices",
            SnapshotKind::ClientPayments => "client payments",
        };
        f.write_str(name)
    }
}

// ── Business keys ───────────────────────────────────────────────────

/// Fields that identify an expense for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseKey {
    pub supplier_id: Id,
    pub posting_date: NaiveDate,
    pub payment_date: NaiveDate,
    pub payment_method: String,
    pub bank_account_id: Id,
    pub amount: Money,
    pub expense_type: String,
}

impl ExpenseKey {
    pub fn matches(&self, expense: &Expense) -> bool {
        let (Some(payment), Some(item)) = (expense.first_payment(), expense.first_line_item()) else {
            return false;
        };
        expense.expense_details.supplier.supplier_id == self.supplier_id
            && expense.expense_details.posting_date == self.posting_date
            && payment.payment_date == self.payment_date
            && payment.payment_method == self.payment_method
            && payment.bank_account.account_id == self.bank_account_id
            && payment.amount == self.amount
            && item.expense_type == self.expense_type
    }
}

/// Fields that identify a client payment for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPaymentKey {
    pub client_id: Id,
    pub payment_date: NaiveDate,
    pub payment_method: String,
    pub bank_account_id: Id,
    pub amount: Money,
    pub invoice_id: Id,
}

impl ClientPaymentKey {
    pub fn matches(&self, payment: &ClientPayment) -> bool {
        payment.client.client_id == self.client_id
            && payment.payment_date == self.payment_date
            && payment.payment_method == self.payment_method
            && payment.bank_account.account_id == self.bank_account_id
            && payment.amount == self.amount
            && payment.first_invoice_id() == Some(self.invoice_id)
    }
}

// ── Engine ──────────────────────────────────────────────────────────

/// One optional snapshot per kind; `None` means never loaded.
#[derive(Debug, Default)]
pub struct ReconciliationEngine {
    expenses: Option<Vec<Expense>>,
    suppliers: Option<Vec<Supplier>>,
    accounts: Option<Vec<BankAccount>>,
    clients: Option<Vec<Client>>,
    invoices: Option<Vec<SalesInvoice>>,
    client_payments: Option<Vec<ClientPayment>>,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self, kind: SnapshotKind) -> bool {
        match kind {
            SnapshotKind::Expenses => self.expenses.is_some(),
            SnapshotKind::Suppliers => self.suppliers.is_some(),
            SnapshotKind::Accounts => self.accounts.is_some(),
            SnapshotKind::Clients => self.clients.is_some(),
            SnapshotKind::Invoices => self.invoices.is_some(),
            SnapshotKind::ClientPayments => self.client_payments.is_some(),
        }
    }

    /// Fetch `kind` unless it is already cached.
    pub fn ensure_loaded<T: SigningTransport>(
        &mut self,
        session: &AuthSession<T>,
        kind: SnapshotKind,
    ) -> Result<(), CrunchError> {
        if self.is_loaded(kind) {
            return Ok(());
        }
        self.reload(session, kind)
    }

    /// Fetch `kind` unconditionally, replacing any cached snapshot. On
    /// failure the previous snapshot (if any) is kept.
    pub fn reload<T: SigningTransport>(
        &mut self,
        session: &AuthSession<T>,
        kind: SnapshotKind,
    ) -> Result<(), CrunchError> {
        let response = session.get(kind.path())?;
        self.install(kind, &response)?;
        Ok(())
    }

    /// Replace the `kind` snapshot with the records in a collection
    /// response. Returns the number of records.
    pub fn install(&mut self, kind: SnapshotKind, response: &serde_json::Value) -> Result<usize, CrunchError> {
        let key = kind.response_key();
        let count = match kind {
            SnapshotKind::Expenses => store(&mut self.expenses, decode_list(response, key)?),
            SnapshotKind::Suppliers => {
                let suppliers: Vec<Supplier> = decode_list(response, key)?;
                warn_duplicate_names(kind, suppliers.iter().map(|s| s.name.as_str()));
                store(&mut self.suppliers, suppliers)
            }
            SnapshotKind::Accounts => {
                let accounts: Vec<BankAccount> = decode_list(response, key)?;
                warn_duplicate_names(kind, accounts.iter().map(|a| a.name.as_str()));
                store(&mut self.accounts, accounts)
            }
            SnapshotKind::Clients => store(&mut self.clients, decode_list(response, key)?),
            SnapshotKind::Invoices => store(&mut self.invoices, decode_list(response, key)?),
            SnapshotKind::ClientPayments => store(&mut self.client_payments, decode_list(response, key)?),
        };
        log::info!("loaded {} snapshot: {} records", kind, count);
        Ok(count)
    }

    /// Drop the cached `kind` snapshot; lookups fail until it is reloaded.
    pub fn invalidate(&mut self, kind: SnapshotKind) {
        match kind {
            SnapshotKind::Expenses => self.expenses = None,
            SnapshotKind::Suppliers => self.suppliers = None,
            SnapshotKind::Accounts => self.accounts = None,
            SnapshotKind::Clients => self.clients = None,
            SnapshotKind::Invoices => self.invoices = None,
            SnapshotKind::ClientPayments => self.client_payments = None,
        }
    }

    // ── Snapshot access ─────────────────────────────────────────────

    pub fn expenses(&self) -> Result<&[Expense], CrunchError> {
        loaded(&self.expenses, SnapshotKind::Expenses)
    }

    pub fn suppliers(&self) -> Result<&[Supplier], CrunchError> {
        loaded(&self.suppliers, SnapshotKind::Suppliers)
    }

    pub fn accounts(&self) -> Result<&[BankAccount], CrunchError> {
        loaded(&self.accounts, SnapshotKind::Accounts)
    }

    pub fn clients(&self) -> Result<&[Client], CrunchError> {
        loaded(&self.clients, SnapshotKind::Clients)
    }

    pub fn invoices(&self) -> Result<&[SalesInvoice], CrunchError> {
        loaded(&self.invoices, SnapshotKind::Invoices)
    }

    pub fn client_payments(&self) -> Result<&[ClientPayment], CrunchError> {
        loaded(&self.client_payments, SnapshotKind::ClientPayments)
    }

    // ── Lookups ─────────────────────────────────────────────────────
    //
    // `Ok(None)` is the normal "no equivalent record" outcome. The only
    // error is an unloaded snapshot: treating it as empty would let a
    // duplicate through.

    /// First expense matching `key` whose id is not in `ignore_ids`.
    pub fn find_expense(&self, key: &ExpenseKey, ignore_ids: &[Id]) -> Result<Option<&Expense>, CrunchError> {
        Ok(self.expenses()?.iter().find(|expense| {
            let ignored = expense.expense_id.is_some_and(|id| ignore_ids.contains(&id));
            !ignored && key.matches(expense)
        }))
    }

    pub fn find_draft_invoice(&self, client_id: Id, issued_date: NaiveDate) -> Result<Option<&SalesInvoice>, CrunchError> {
        Ok(self.invoices()?.iter().find(|invoice| {
            invoice.client_id() == client_id
                && invoice.sales_invoice_details.issued_date == issued_date
                && invoice.is_draft()
        }))
    }

    pub fn find_invoice(&self, client_id: Id, issued_date: NaiveDate) -> Result<Option<&SalesInvoice>, CrunchError> {
        Ok(self.invoices()?.iter().find(|invoice| {
            invoice.client_id() == client_id && invoice.sales_invoice_details.issued_date == issued_date
        }))
    }

    /// An unsettled invoice for `client_id` whose line items sum to `amount` gross.
    pub fn find_outstanding_client_invoice(
        &self,
        client_id: Id,
        amount: Money,
    ) -> Result<Option<&SalesInvoice>, CrunchError> {
        Ok(self.invoices()?.iter().find(|invoice| {
            invoice.client_id() == client_id && invoice.gross_total() == amount && !invoice.is_settled()
        }))
    }

    pub fn find_client_payment(&self, key: &ClientPaymentKey) -> Result<Option<&ClientPayment>, CrunchError> {
        Ok(self.client_payments()?.iter().find(|payment| key.matches(payment)))
    }

    /// First supplier with this exact name.
    pub fn supplier_by_name(&self, name: &str) -> Result<Option<&Supplier>, CrunchError> {
        Ok(self.suppliers()?.iter().find(|s| s.name == name))
    }

    /// First bank account with this exact name.
    pub fn account_by_name(&self, name: &str) -> Result<Option<&BankAccount>, CrunchError> {
        Ok(self.accounts()?.iter().find(|a| a.name == name))
    }

    pub fn find_client(&self, name: &str) -> Result<Option<&Client>, CrunchError> {
        Ok(self.clients()?.iter().find(|c| c.name == name))
    }

    /// Client references already used on `client_id`'s invoices.
    pub fn client_references(&self, client_id: Id) -> Result<Vec<&str>, CrunchError> {
        Ok(self
            .invoices()?
            .iter()
            .filter(|invoice| invoice.client_id() == client_id)
            .filter_map(|invoice| invoice.sales_invoice_details.client_reference.as_deref())
            .collect())
    }
}

fn store<T>(slot: &mut Option<Vec<T>>, records: Vec<T>) -> usize {
    let count = records.len();
    *slot = Some(records);
    count
}

fn loaded<T>(slot: &Option<Vec<T>>, kind: SnapshotKind) -> Result<&[T], CrunchError> {
    slot.as_deref().ok_or(CrunchError::SnapshotNotLoaded(kind))
}

fn warn_duplicate_names<'a>(kind: SnapshotKind, names: impl Iterator<Item = &'a str>) {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            log::warn!("{} snapshot has duplicate name {:?}; lookups use the first", kind, name);
        }
    }
}
