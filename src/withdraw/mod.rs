use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::ledger::{
    Amount, Ledger, LedgerError, WithdrawDetails, WithdrawalRequest, WithdrawalStatus,
    MIN_REFERRALS, WITHDRAW_AMOUNT,
};

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct WithdrawalReceipt {
    pub request_id: String,
    pub amount: Amount,
    pub new_balance: Amount,
}

impl Ledger {
    /// Submit a withdrawal request. The eligibility checks, the debit,
    /// and the request record land in one atomic unit: if any
    /// precondition fails, no request is written and the balance is
    /// untouched.
    pub fn request_withdrawal(
        &mut self,
        user_id: &str,
        details: WithdrawDetails,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalReceipt, LedgerError> {
        if details.name.trim().is_empty()
            || details.method.trim().is_empty()
            || details.number.trim().is_empty()
        {
            return Err(LedgerError::invalid(
                "withdrawal details require name, method, and number",
            ));
        }

        let account = self.account_mut(user_id)?;
        if account.balance < WITHDRAW_AMOUNT {
            return Err(LedgerError::InsufficientBalance {
                balance: account.balance,
                required: WITHDRAW_AMOUNT,
            });
        }
        if account.referral_count < MIN_REFERRALS {
            return Err(LedgerError::InsufficientReferrals {
                count: account.referral_count,
                required: MIN_REFERRALS,
            });
        }

        account.balance -= WITHDRAW_AMOUNT;
        let new_balance = account.balance;
        let user_name = account.first_name.clone();
        let request_id = request_id(user_id, now, self.withdrawals.len() as u64);
        self.withdrawals.push(WithdrawalRequest {
            id: request_id.clone(),
            user_id: user_id.to_string(),
            user_name,
            details,
            amount: WITHDRAW_AMOUNT,
            status: WithdrawalStatus::Pending,
            requested_at: now,
        });
        Ok(WithdrawalReceipt {
            request_id,
            amount: WITHDRAW_AMOUNT,
            new_balance,
        })
    }
}

/// Content-derived request id: user, instant, and log position hashed
/// together, so ids stay unique even for back-to-back requests from
/// one user within the same instant.
fn request_id(user_id: &str, now: DateTime<Utc>, seq: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"withdrawal");
    hasher.update(user_id.as_bytes());
    hasher.update(now.timestamp_micros().to_le_bytes());
    hasher.update(seq.to_le_bytes());
    hex::encode(hasher.finalize())
}
