//! Credit Ledger: the only writer of credit balances.

pub mod handlers;

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::models::credit::CreditAccount;
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn LedgerStore>,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn open_account(&self, user_id: Uuid) -> Result<CreditAccount, PipelineError> {
        self.store.open_account(user_id).await
    }

    pub async fn account(&self, user_id: Uuid) -> Result<CreditAccount, PipelineError> {
        self.store
            .account(user_id)
            .await?
            .ok_or(PipelineError::AccountNotFound(user_id))
    }

    /// Returns the new balance. Fails with `InsufficientCredits` rather than
    /// going below zero; the balance is unchanged on failure.
    pub async fn debit(&self, user_id: Uuid, amount: i32) -> Result<i32, PipelineError> {
        validate_amount(amount)?;
        let balance = self.store.debit(user_id, amount).await?;
        info!(%user_id, amount, balance, "Credits debited");
        Ok(balance)
    }

    pub async fn credit(&self, user_id: Uuid, amount: i32) -> Result<i32, PipelineError> {
        validate_amount(amount)?;
        let balance = self.store.credit(user_id, amount).await?;
        info!(%user_id, amount, balance, "Credits granted");
        Ok(balance)
    }
}

fn validate_amount(amount: i32) -> Result<(), PipelineError> {
    if amount <= 0 {
        return Err(PipelineError::Validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}
