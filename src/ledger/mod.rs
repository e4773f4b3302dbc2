use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type EventId = String;
pub type Amount = u64;

/// TK credited to a referrer when a referred user first opens the app.
pub const REFERRAL_BONUS: Amount = 10;
/// Fixed amount debited by every withdrawal request.
pub const WITHDRAW_AMOUNT: Amount = 50;
/// Referrals required before a withdrawal is accepted.
pub const MIN_REFERRALS: u32 = 5;
/// Seconds between reward-wheel spins.
pub const SPIN_COOLDOWN_SECS: i64 = 2 * 60 * 60;
/// Seconds an ad button stays on (advisory) cooldown after a view.
pub const AD_COOLDOWN_SECS: i64 = 10 * 60;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
    #[error("unknown user {user}")]
    UnknownUser { user: UserId },
    #[error("insufficient balance: have {balance} TK, need {required} TK")]
    InsufficientBalance { balance: Amount, required: Amount },
    #[error("insufficient referrals: have {count}, need {required}")]
    InsufficientReferrals { count: u32, required: u32 },
    #[error("spin available again in {remaining_secs}s")]
    StillCoolingDown { remaining_secs: i64 },
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

impl LedgerError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        LedgerError::InvalidRequest {
            reason: reason.into(),
        }
    }
}

/// Per-user record. Balance only moves through the defined operations
/// (reward credit, referral credit, spin credit, withdrawal debit) and
/// can never go negative.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub balance: Amount,
    pub referral_count: u32,
    /// Advisory ad-button cooldowns keyed by ad slot. The reward
    /// processor never consults these; they only drive UI timers.
    pub cooldowns: BTreeMap<String, DateTime<Utc>>,
    pub last_spin_at: Option<DateTime<Utc>>,
    pub first_name: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(first_name: String, username: String, created_at: DateTime<Utc>) -> Self {
        Self {
            balance: 0,
            referral_count: 0,
            cooldowns: BTreeMap::new(),
            last_spin_at: None,
            first_name,
            username,
            created_at,
        }
    }
}

/// Idempotency record for one ad impression. Written once per `ymid`,
/// never mutated or deleted; its existence is the single source of
/// truth for "already rewarded".
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessedEvent {
    pub processed_at: DateTime<Utc>,
    pub telegram_id: UserId,
    pub reward_amount: Amount,
    pub ad_type: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WithdrawDetails {
    pub name: String,
    pub method: String,
    pub number: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub id: String,
    pub user_id: UserId,
    pub user_name: String,
    pub details: WithdrawDetails,
    pub amount: Amount,
    /// Set to `Pending` at creation; terminal states are applied by an
    /// external review process.
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
}

/// The full document state: user accounts, the processed-event
/// idempotency ledger, and the append-only withdrawal log.
///
/// `Ledger` itself is plain data with synchronous methods; atomicity
/// across check-then-write sequences comes from running every operation
/// inside [`crate::store::Store::transact`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ledger {
    pub accounts: BTreeMap<UserId, Account>,
    pub processed_events: BTreeMap<EventId, ProcessedEvent>,
    pub withdrawals: Vec<WithdrawalRequest>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, user: &str) -> Option<&Account> {
        self.accounts.get(user)
    }

    pub fn account_mut(&mut self, user: &str) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(user)
            .ok_or_else(|| LedgerError::UnknownUser {
                user: user.to_string(),
            })
    }

    /// Credit an existing account. Fails for unknown users rather than
    /// creating them implicitly; account creation is its own operation.
    pub fn credit(&mut self, user: &str, amount: Amount) -> Result<Amount, LedgerError> {
        let account = self.account_mut(user)?;
        account.balance += amount;
        Ok(account.balance)
    }

    /// Debit an existing account, rejecting any debit that would make
    /// the balance negative.
    pub fn debit(&mut self, user: &str, amount: Amount) -> Result<Amount, LedgerError> {
        let account = self.account_mut(user)?;
        if account.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                balance: account.balance,
                required: amount,
            });
        }
        account.balance -= amount;
        Ok(account.balance)
    }
}
