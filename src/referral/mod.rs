use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{Account, Ledger, LedgerError, REFERRAL_BONUS};

/// Telegram profile fields captured at first contact.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileHints {
    pub first_name: Option<String>,
    pub username: Option<String>,
}

impl Ledger {
    /// First contact creates a zero-balance account and runs the
    /// referral linker; later contacts return the stored account
    /// untouched. Creation and referral credit happen in the same
    /// atomic unit, which is the only thing keeping the referral bonus
    /// one-time (there is no per-referral idempotency record).
    pub fn get_or_create_account(
        &mut self,
        user_id: &str,
        hints: &ProfileHints,
        referrer: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Account, LedgerError> {
        if user_id.trim().is_empty() {
            return Err(LedgerError::invalid("missing user id"));
        }
        if let Some(existing) = self.accounts.get(user_id) {
            return Ok(existing.clone());
        }

        // Link before insertion: the "new user has no account yet"
        // check inside link_referral must still see the pre-creation
        // state.
        self.link_referral(user_id, referrer);

        let account = Account::new(
            hints.first_name.clone().unwrap_or_default(),
            hints.username.clone().unwrap_or_default(),
            now,
        );
        self.accounts.insert(user_id.to_string(), account.clone());
        Ok(account)
    }

    /// Credit the referrer of a brand-new user. Every guard is a silent
    /// no-op by design: a missing referrer, a self-referral, an already
    /// existing account for the new user, or an unknown referrer are
    /// normal conditions, not errors. Returns whether a credit was made.
    pub fn link_referral(&mut self, new_user_id: &str, referrer: Option<&str>) -> bool {
        let Some(referrer) = referrer.filter(|r| !r.trim().is_empty()) else {
            return false;
        };
        if referrer == new_user_id {
            return false;
        }
        if self.accounts.contains_key(new_user_id) {
            return false;
        }
        let Some(account) = self.accounts.get_mut(referrer) else {
            return false;
        };
        account.balance += REFERRAL_BONUS;
        account.referral_count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn hints(first_name: &str, username: &str) -> ProfileHints {
        ProfileHints {
            first_name: Some(first_name.into()),
            username: Some(username.into()),
        }
    }

    #[test]
    fn first_contact_creates_zero_balance_account() {
        let mut ledger = Ledger::new();
        let account = ledger
            .get_or_create_account("u1", &hints("Alice", "alice"), None, t0())
            .unwrap();
        assert_eq!(account.balance, 0);
        assert_eq!(account.referral_count, 0);
        assert_eq!(account.first_name, "Alice");
        assert_eq!(account.created_at, t0());
    }

    #[test]
    fn repeat_contact_returns_stored_account_unchanged() {
        let mut ledger = Ledger::new();
        ledger
            .get_or_create_account("u1", &hints("Alice", "alice"), None, t0())
            .unwrap();
        ledger.credit("u1", 42).unwrap();

        let later = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let account = ledger
            .get_or_create_account("u1", &hints("Alicia", "alicia"), None, later)
            .unwrap();
        assert_eq!(account.balance, 42);
        assert_eq!(account.first_name, "Alice");
        assert_eq!(account.created_at, t0());
    }

    #[test]
    fn referral_credited_exactly_once() {
        let mut ledger = Ledger::new();
        ledger
            .get_or_create_account("ref-a", &hints("A", "a"), None, t0())
            .unwrap();

        ledger
            .get_or_create_account("user-b", &hints("B", "b"), Some("ref-a"), t0())
            .unwrap();
        let referrer = ledger.account("ref-a").unwrap();
        assert_eq!(referrer.balance, REFERRAL_BONUS);
        assert_eq!(referrer.referral_count, 1);

        // Re-sending the same start parameter after creation is a no-op.
        for _ in 0..3 {
            ledger
                .get_or_create_account("user-b", &hints("B", "b"), Some("ref-a"), t0())
                .unwrap();
        }
        let referrer = ledger.account("ref-a").unwrap();
        assert_eq!(referrer.balance, REFERRAL_BONUS);
        assert_eq!(referrer.referral_count, 1);
    }

    #[test]
    fn self_referral_changes_no_balance() {
        let mut ledger = Ledger::new();
        ledger
            .get_or_create_account("u1", &hints("A", "a"), None, t0())
            .unwrap();
        assert!(!ledger.link_referral("u1", Some("u1")));

        let mut fresh = Ledger::new();
        fresh
            .get_or_create_account("u2", &hints("B", "b"), Some("u2"), t0())
            .unwrap();
        assert_eq!(fresh.account("u2").unwrap().balance, 0);
        assert_eq!(fresh.account("u2").unwrap().referral_count, 0);
    }

    #[test]
    fn unknown_referrer_is_a_silent_noop() {
        let mut ledger = Ledger::new();
        let account = ledger
            .get_or_create_account("u1", &hints("A", "a"), Some("nonexistent-id"), t0())
            .unwrap();
        assert_eq!(account.balance, 0);
        assert!(ledger.account("nonexistent-id").is_none());
    }

    #[test]
    fn missing_or_blank_referrer_is_a_noop() {
        let mut ledger = Ledger::new();
        ledger
            .get_or_create_account("ref-a", &hints("A", "a"), None, t0())
            .unwrap();
        assert!(!ledger.link_referral("new-user", None));
        assert!(!ledger.link_referral("new-user", Some("  ")));
        assert_eq!(ledger.account("ref-a").unwrap().balance, 0);
    }

    #[test]
    fn direct_link_for_existing_user_is_a_noop() {
        let mut ledger = Ledger::new();
        ledger
            .get_or_create_account("ref-a", &hints("A", "a"), None, t0())
            .unwrap();
        ledger
            .get_or_create_account("user-b", &hints("B", "b"), None, t0())
            .unwrap();
        // user-b already has an account, so a late link attempt pays nothing.
        assert!(!ledger.link_referral("user-b", Some("ref-a")));
        assert_eq!(ledger.account("ref-a").unwrap().balance, 0);
    }
}
