use crate::{Signature, Slot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Full transaction body as returned by `getTransaction`.
///
/// The body is kept as raw JSON; consumers pick out the parts they care
/// about. A receipt never changes once fetched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Receipt(pub Value);

impl Receipt {
    pub fn new(body: Value) -> Self {
        Receipt(body)
    }

    pub fn body(&self) -> &Value {
        &self.0
    }

    /// Slot of the containing block, if the body reports one.
    pub fn slot(&self) -> Option<Slot> {
        self.0.get("slot").and_then(Value::as_u64).map(Slot)
    }

    /// Whether the transaction executed with an error (`meta.err` set).
    pub fn is_failed(&self) -> bool {
        self.0
            .get("meta")
            .and_then(|meta| meta.get("err"))
            .is_some_and(|err| !err.is_null())
    }
}

/// One entry of a `getSignaturesForAddress` page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature: Signature,
    pub slot: Slot,
    #[serde(default)]
    pub err: Option<Value>,
}

impl SignatureInfo {
    pub fn new(signature: Signature, slot: Slot) -> Self {
        Self {
            signature,
            slot,
            err: None,
        }
    }
}
