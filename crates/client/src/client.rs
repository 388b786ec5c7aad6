//! High-level client: authorization, reconciliation, and submission in one place.

use std::collections::HashMap;
use std::path::Path;

use crunch_config::ClientConfig;

use crate::auth::{AuthSession, AuthState, Credentials};
use crate::error::CrunchError;
use crate::ledger::{
    build_client_payment, build_expense, build_invoice, Attachment, ClientPaymentInput, ExpenseInput, FileInspector,
    InvoiceInput, MimeGuessInspector,
};
use crate::model::{decode_list, decode_one, BankAccount, Client, ClientPayment, Expense, Id};
use crate::money::VatRate;
use crate::recon::{ReconciliationEngine, SnapshotKind};
use crate::reference;
use crate::transport::{HttpTransport, SigningTransport};
use crate::vat::AmountCalculator;

/// Outcome of an idempotent create.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled<T> {
    /// An equivalent record was already in the snapshot; nothing was sent.
    Existing(T),
    /// Nothing matched; the record was created. Holds the API response.
    Created(serde_json::Value),
}

impl<T> Reconciled<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, Reconciled::Created(_))
    }
}

pub struct CrunchClient<T = HttpTransport> {
    session: AuthSession<T>,
    calculator: AmountCalculator,
    recon: ReconciliationEngine,
    inspector: Box<dyn FileInspector>,
    /// References handed out this session, per client id.
    allocated_references: HashMap<Id, Vec<String>>,
}

impl CrunchClient<HttpTransport> {
    pub fn from_config(config: &ClientConfig) -> Result<Self, CrunchError> {
        let session = AuthSession::from_config(config)?;
        Ok(Self::new(session, VatRate::from_percent(config.vat_rate)))
    }
}

impl<T: SigningTransport> CrunchClient<T> {
    pub fn new(session: AuthSession<T>, vat_rate: VatRate) -> Self {
        Self {
            session,
            calculator: AmountCalculator::new(vat_rate),
            recon: ReconciliationEngine::new(),
            inspector: Box::new(MimeGuessInspector),
            allocated_references: HashMap::new(),
        }
    }

    /// Replace how receipt files are read and typed.
    pub fn with_inspector(mut self, inspector: impl FileInspector + 'static) -> Self {
        self.inspector = Box::new(inspector);
        self
    }

    pub fn session(&self) -> &AuthSession<T> {
        &self.session
    }

    pub fn calculator(&self) -> &AmountCalculator {
        &self.calculator
    }

    pub fn recon(&self) -> &ReconciliationEngine {
        &self.recon
    }

    // ── Authorization ───────────────────────────────────────────────

    pub fn begin_authorization(&mut self) -> Result<String, CrunchError> {
        self.session.begin_authorization()
    }

    pub fn complete_authorization(&mut self, verifier: &str) -> Result<Credentials, CrunchError> {
        self.session.complete_authorization(verifier)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn auth_state(&self) -> AuthState {
        self.session.state()
    }

    // ── Snapshots ───────────────────────────────────────────────────

    pub fn ensure_loaded(&mut self, kind: SnapshotKind) -> Result<&ReconciliationEngine, CrunchError> {
        self.recon.ensure_loaded(&self.session, kind)?;
        Ok(&self.recon)
    }

    pub fn reload(&mut self, kind: SnapshotKind) -> Result<&ReconciliationEngine, CrunchError> {
        self.recon.reload(&self.session, kind)?;
        Ok(&self.recon)
    }

    // ── Reference data ──────────────────────────────────────────────

    /// `GET /accounts/:type`. Not cached.
    pub fn accounts_of_type(&self, account_type: &str) -> Result<Vec<BankAccount>, CrunchError> {
        let response = self.session.get(&format!("/accounts/{}", account_type))?;
        decode_list(&response, SnapshotKind::Accounts.response_key())
    }

    pub fn expense_types(&self) -> Result<serde_json::Value, CrunchError> {
        self.session.get("/expense_types")
    }

    pub fn client(&self, client_id: Id) -> Result<Client, CrunchError> {
        let response = self.session.get(&format!("/clients/{}", client_id))?;
        decode_one(&response, "client")
    }

    /// Deletes remotely; the suppliers snapshot is left as it was.
    pub fn delete_supplier(&self, supplier_id: Id) -> Result<serde_json::Value, CrunchError> {
        log::info!("deleting supplier {}", supplier_id);
        self.session.delete(&format!("/suppliers/{}", supplier_id))
    }

    // ── Submission ──────────────────────────────────────────────────
    //
    // These send unconditionally. Run the matching `find_*` first, or use
    // the `record_*` helpers.

    pub fn create_expense(&self, input: &ExpenseInput, receipt: Option<&Path>) -> Result<serde_json::Value, CrunchError> {
        let expense = self.expense_payload(input, receipt)?;
        log::info!("creating expense: supplier {} amount {}", input.supplier_id, input.amount);
        self.session.post("/expenses", &to_body(&expense)?)
    }

    /// Replace expense `expense_id` with the record built from `input`.
    pub fn update_expense(
        &self,
        expense_id: Id,
        input: &ExpenseInput,
        receipt: Option<&Path>,
    ) -> Result<serde_json::Value, CrunchError> {
        let mut expense = self.expense_payload(input, receipt)?;
        expense.expense_id = Some(expense_id);
        log::info!("updating expense {}", expense_id);
        self.session.put("/expenses", Some(&to_body(&expense)?))
    }

    /// Create a draft invoice. Without an explicit reference one is
    /// allocated from the invoices snapshot (loaded if needed) plus the
    /// references already handed out this session.
    pub fn create_invoice(&mut self, input: &InvoiceInput) -> Result<serde_json::Value, CrunchError> {
        let client = self.client(input.client_id)?;
        let used = match input.client_reference {
            Some(_) => Vec::new(),
            None => self.used_references(client.client_id)?,
        };
        let invoice = build_invoice(input, &self.calculator, &client, used.as_slice())?;
        let client_reference = invoice.sales_invoice_details.client_reference.clone();

        log::info!("creating invoice for client {}", client.client_id);
        let response = self.session.post("/sales_invoices", &to_body(&invoice)?)?;
        if let Some(r) = client_reference {
            self.allocated_references.entry(client.client_id).or_default().push(r);
        }
        Ok(response)
    }

    pub fn issue_invoice(&self, invoice_id: Id) -> Result<serde_json::Value, CrunchError> {
        log::info!("issuing invoice {}", invoice_id);
        self.session.put(&format!("/sales_invoices/{}/issue", invoice_id), None)
    }

    pub fn create_client_payment(&self, input: &ClientPaymentInput) -> Result<serde_json::Value, CrunchError> {
        let payment = build_client_payment(input);
        log::info!("creating client payment: client {} amount {}", input.client_id, input.amount);
        self.session.post("/client_payments", &to_body(&payment)?)
    }

    /// Post a caller-built client payment body as-is.
    pub fn add_client_payment_raw(&self, payload: &serde_json::Value) -> Result<serde_json::Value, CrunchError> {
        self.session.post("/client_payments", payload)
    }

    // ── Idempotent helpers ──────────────────────────────────────────

    /// Create the expense unless the expenses snapshot already holds one
    /// with the same business key. The snapshot is loaded if needed but
    /// not refreshed afterwards.
    pub fn record_expense(
        &mut self,
        input: &ExpenseInput,
        receipt: Option<&Path>,
    ) -> Result<Reconciled<Expense>, CrunchError> {
        self.recon.ensure_loaded(&self.session, SnapshotKind::Expenses)?;
        if let Some(existing) = self.recon.find_expense(&input.key(), &[])? {
            log::info!("expense already recorded as {:?}", existing.expense_id);
            return Ok(Reconciled::Existing(existing.clone()));
        }
        self.create_expense(input, receipt).map(Reconciled::Created)
    }

    pub fn record_client_payment(&mut self, input: &ClientPaymentInput) -> Result<Reconciled<ClientPayment>, CrunchError> {
        self.recon.ensure_loaded(&self.session, SnapshotKind::ClientPayments)?;
        if let Some(existing) = self.recon.find_client_payment(&input.key())? {
            log::info!("client payment already recorded as {:?}", existing.client_payment_id);
            return Ok(Reconciled::Existing(existing.clone()));
        }
        self.create_client_payment(input).map(Reconciled::Created)
    }

    /// Next free reference for `client`, considering the invoices snapshot
    /// and references allocated this session.
    pub fn next_client_reference(&mut self, client: &Client) -> Result<String, CrunchError> {
        let used = self.used_references(client.client_id)?;
        Ok(reference::allocate(&client.name, used.as_slice()))
    }

    fn used_references(&mut self, client_id: Id) -> Result<Vec<String>, CrunchError> {
        self.recon.ensure_loaded(&self.session, SnapshotKind::Invoices)?;
        let mut used: Vec<String> = self
            .recon
            .client_references(client_id)?
            .into_iter()
            .map(str::to_string)
            .collect();
        if let Some(allocated) = self.allocated_references.get(&client_id) {
            used.extend(allocated.iter().cloned());
        }
        Ok(used)
    }

    fn expense_payload(&self, input: &ExpenseInput, receipt: Option<&Path>) -> Result<Expense, CrunchError> {
        let attachment = receipt
            .map(|path| Attachment::from_path(path, self.inspector.as_ref()))
            .transpose()?;
        build_expense(input, &self.calculator, attachment.as_ref())
    }
}

fn to_body<S: serde::Serialize>(record: &S) -> Result<serde_json::Value, CrunchError> {
    serde_json::to_value(record).map_err(|e| CrunchError::Decode(format!("failed to encode payload: {}", e)))
}
