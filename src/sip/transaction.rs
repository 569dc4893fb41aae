use std::sync::{Arc, Mutex};

use rsip::Method;

use crate::error::{Error, Result};
use crate::sip::dialog::Dialog;
use crate::sip::message::{RxData, TxData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionRole {
    Uac,
    Uas,
}

/// Key the embedding stack matches transactions with, built from a received
/// message: role, method, top Via branch, and Call-ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionKey {
    pub role: TransactionRole,
    pub method: Method,
    pub branch: String,
    pub call_id: String,
}

impl std::hash::Hash for TransactionKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.role.hash(state);
        self.method.to_string().hash(state);
        self.branch.hash(state);
        self.call_id.hash(state);
    }
}

impl TransactionKey {
    /// Build the key that matches `rdata` for the given role and method.
    pub fn from_rx(role: TransactionRole, method: Method, rdata: &RxData) -> Result<Self> {
        let branch = rdata
            .branch()
            .ok_or_else(|| Error::Malformed("missing Via branch".into()))?;
        Ok(Self {
            role,
            method,
            branch,
            call_id: rdata.call_id(),
        })
    }
}

/// Handle to a transaction owned by the embedding stack.
///
/// Exposes the two pieces inbound dispatch reads: the dialog the transaction
/// belongs to and the request it last transmitted.
pub struct Transaction {
    id: String,
    key: TransactionKey,
    dialog: Mutex<Option<Arc<Dialog>>>,
    last_tx: Mutex<Option<Arc<TxData>>>,
}

impl Transaction {
    pub fn new(id: impl Into<String>, key: TransactionKey) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            key,
            dialog: Mutex::new(None),
            last_tx: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> &TransactionKey {
        &self.key
    }

    pub fn dialog(&self) -> Option<Arc<Dialog>> {
        self.dialog.lock().unwrap().clone()
    }

    pub fn set_dialog(&self, dialog: Option<Arc<Dialog>>) {
        *self.dialog.lock().unwrap() = dialog;
    }

    /// The last transmitted request, carrying the serializer-name
    /// annotation when one was recorded at send time.
    pub fn last_tx(&self) -> Option<Arc<TxData>> {
        self.last_tx.lock().unwrap().clone()
    }

    pub fn set_last_tx(&self, tdata: Option<Arc<TxData>>) {
        *self.last_tx.lock().unwrap() = tdata;
    }
}
