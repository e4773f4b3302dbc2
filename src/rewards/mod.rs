use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::ledger::{Amount, Ledger, LedgerError, ProcessedEvent, AD_COOLDOWN_SECS};

/// Result of a postback delivery. Both variants are "do not retry"
/// outcomes for the ad network; a duplicate must not surface as an
/// error or the network will resend the same event forever.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RewardOutcome {
    Credited { new_balance: Amount },
    AlreadyProcessed,
}

/// Injection seam for the client-side ad SDK. No server-side code
/// implements this: the real implementation lives in the mini-app
/// webview, which reaches the server only through the postback. It
/// exists so the show-then-postback trigger path can be exercised
/// against a fake instead of a name-based global lookup.
pub trait AdDisplayService {
    fn show(&self, ad_slot: &str, event_id: &str) -> Result<(), LedgerError>;
}

impl Ledger {
    /// Process one ad-completion postback.
    ///
    /// Exactly one credit and one [`ProcessedEvent`] per distinct
    /// `event_id`, regardless of how many times this is invoked. The
    /// duplicate check and the credit+mark must run inside a single
    /// [`crate::store::Store::transact`] unit; that is what makes two
    /// simultaneous postbacks with the same `ymid` yield one credit.
    ///
    /// An unknown user leaves no ProcessedEvent behind, so a retry for
    /// the same `event_id` after the account exists can still succeed.
    pub fn process_reward(
        &mut self,
        event_id: &str,
        user_id: &str,
        amount: Amount,
        ad_type: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RewardOutcome, LedgerError> {
        if event_id.trim().is_empty() {
            return Err(LedgerError::invalid("missing event id (ymid)"));
        }
        if user_id.trim().is_empty() {
            return Err(LedgerError::invalid("missing telegram_id"));
        }
        if amount == 0 {
            return Err(LedgerError::invalid("reward_amount must be positive"));
        }

        if self.processed_events.contains_key(event_id) {
            return Ok(RewardOutcome::AlreadyProcessed);
        }

        // UnknownUser propagates from here before the event is marked.
        let new_balance = self.credit(user_id, amount)?;
        self.processed_events.insert(
            event_id.to_string(),
            ProcessedEvent {
                processed_at: now,
                telegram_id: user_id.to_string(),
                reward_amount: amount,
                ad_type: ad_type.map(str::to_string),
            },
        );
        Ok(RewardOutcome::Credited { new_balance })
    }

    /// Stamp the advisory cooldown for an ad slot and return its expiry.
    /// Purely informational for the UI; reward crediting ignores it.
    pub fn mark_ad_cooldown(
        &mut self,
        user_id: &str,
        slot: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, LedgerError> {
        if slot.trim().is_empty() {
            return Err(LedgerError::invalid("missing ad slot"));
        }
        let expires_at = now + Duration::seconds(AD_COOLDOWN_SECS);
        let account = self.account_mut(user_id)?;
        account.cooldowns.insert(slot.to_string(), expires_at);
        Ok(expires_at)
    }
}
