//! Client for the Crunch accounting REST API.
//!
//! [`AuthSession`] runs the OAuth 1.0a handshake and signs every call.
//! [`ReconciliationEngine`] checks cached snapshots for an equivalent record
//! before anything is created, and [`ledger`] builds the request payloads.
//! [`CrunchClient`] ties them together.

pub mod auth;
pub mod client;
pub mod error;
pub mod ledger;
pub mod model;
pub mod money;
pub mod oauth;
pub mod recon;
pub mod reference;
pub mod transport;
pub mod vat;

pub use auth::{AuthSession, AuthState, Credentials, Endpoints};
pub use client::{CrunchClient, Reconciled};
pub use error::{CrunchError, TransportError};
pub use ledger::{Attachment, ClientPaymentInput, ExpenseInput, FileInspector, InvoiceInput, MimeGuessInspector};
pub use money::{Money, VatRate};
pub use oauth::{Consumer, OAuthSigner, SignatureMethod, TokenPair};
pub use recon::{ClientPaymentKey, ExpenseKey, ReconciliationEngine, SnapshotKind};
pub use transport::{HttpTransport, Method, SigningTransport, TokenResponse};
pub use vat::{AmountCalculator, Split, VatClassification, VatType};
