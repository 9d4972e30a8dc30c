//! Domain model (IDs, envelopes, operations, accounts, dispositions).

pub mod account;
pub mod disposition;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod operation;

pub use self::account::Account;
pub use self::disposition::{DeadLetterReason, Disposition, DomainFailurePolicy};
pub use self::envelope::Envelope;
pub use self::errors::{ErrorKind, LedgerError};
pub use self::ids::{AccountId, EnvelopeId, Id, IdMarker, OperationId};
pub use self::operation::{Operation, OperationKind};
