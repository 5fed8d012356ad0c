use async_trait::async_trait;
use containers::{Receipt, Signature};
use std::collections::HashMap;

/// Downstream receiver of newly indexed transactions.
///
/// Called once per successful cycle with the full retained order (newest
/// first) and the stored receipts for it. Returns how many signatures,
/// counted from the oldest end of `order`, it has finished with; those are
/// dropped from the retained order. Delivery is at-least-once, so
/// implementations must tolerate seeing a signature again.
#[async_trait]
pub trait TransactionConsumer: Send {
    async fn on_new_transactions(
        &mut self,
        order: &[Signature],
        receipts: &HashMap<Signature, Receipt>,
    ) -> anyhow::Result<usize>;
}

/// Consumer that accepts and drains everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DrainAll;

#[async_trait]
impl TransactionConsumer for DrainAll {
    async fn on_new_transactions(
        &mut self,
        order: &[Signature],
        _receipts: &HashMap<Signature, Receipt>,
    ) -> anyhow::Result<usize> {
        Ok(order.len())
    }
}
