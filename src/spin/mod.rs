use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

use crate::ledger::{Amount, Ledger, LedgerError, SPIN_COOLDOWN_SECS};

/// Wheel slices in display order. The winning slice is a uniform-random
/// index into this list, so 5 TK is twice as likely as the other
/// values; that is intentional, not a weighted distribution.
pub const WHEEL_VALUES: [Amount; 8] = [5, 10, 15, 20, 25, 40, 3, 5];

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SpinOutcome {
    pub slice: usize,
    pub won: Amount,
    pub new_balance: Amount,
    pub next_spin_at: DateTime<Utc>,
}

impl Ledger {
    /// Spin the reward wheel: one spin per cooldown window, credited
    /// and stamped in the same atomic unit.
    pub fn claim_spin<R: Rng>(
        &mut self,
        user_id: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<SpinOutcome, LedgerError> {
        let cooldown = Duration::seconds(SPIN_COOLDOWN_SECS);
        let account = self.account_mut(user_id)?;
        if let Some(last) = account.last_spin_at {
            let ready_at = last + cooldown;
            if now < ready_at {
                return Err(LedgerError::StillCoolingDown {
                    remaining_secs: (ready_at - now).num_seconds().max(1),
                });
            }
        }
        let slice = rng.gen_range(0..WHEEL_VALUES.len());
        let won = WHEEL_VALUES[slice];
        account.balance += won;
        account.last_spin_at = Some(now);
        Ok(SpinOutcome {
            slice,
            won,
            new_balance: account.balance,
            next_spin_at: now + cooldown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Account;
    use chrono::TimeZone;
    use rand::{rngs::StdRng, SeedableRng};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn ledger_with_user(user: &str) -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .accounts
            .insert(user.to_string(), Account::new("Test".into(), String::new(), t0()));
        ledger
    }

    #[test]
    fn spin_credits_a_wheel_value_and_stamps_time() {
        let mut ledger = ledger_with_user("u1");
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = ledger.claim_spin("u1", t0(), &mut rng).unwrap();
        assert_eq!(outcome.won, WHEEL_VALUES[outcome.slice]);
        assert_eq!(outcome.new_balance, outcome.won);
        assert_eq!(outcome.next_spin_at, t0() + Duration::seconds(SPIN_COOLDOWN_SECS));
        assert_eq!(ledger.account("u1").unwrap().last_spin_at, Some(t0()));
    }

    #[test]
    fn second_spin_inside_cooldown_is_rejected_with_remaining_time() {
        let mut ledger = ledger_with_user("u1");
        let mut rng = StdRng::seed_from_u64(7);
        ledger.claim_spin("u1", t0(), &mut rng).unwrap();

        let balance_after_first = ledger.account("u1").unwrap().balance;
        let one_hour_later = t0() + Duration::hours(1);
        let err = ledger.claim_spin("u1", one_hour_later, &mut rng).unwrap_err();
        match err {
            LedgerError::StillCoolingDown { remaining_secs } => {
                assert_eq!(remaining_secs, 60 * 60);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger.account("u1").unwrap().balance, balance_after_first);
    }

    #[test]
    fn spin_allowed_again_once_cooldown_elapses() {
        let mut ledger = ledger_with_user("u1");
        let mut rng = StdRng::seed_from_u64(7);
        ledger.claim_spin("u1", t0(), &mut rng).unwrap();
        let later = t0() + Duration::seconds(SPIN_COOLDOWN_SECS);
        ledger.claim_spin("u1", later, &mut rng).unwrap();
        assert_eq!(ledger.account("u1").unwrap().last_spin_at, Some(later));
    }

    #[test]
    fn spin_for_unknown_user_fails() {
        let mut ledger = Ledger::new();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            ledger.claim_spin("ghost", t0(), &mut rng),
            Err(LedgerError::UnknownUser { .. })
        ));
    }

    #[test]
    fn every_slice_is_reachable() {
        let mut ledger = ledger_with_user("u1");
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = [false; WHEEL_VALUES.len()];
        let mut now = t0();
        for _ in 0..200 {
            let outcome = ledger.claim_spin("u1", now, &mut rng).unwrap();
            seen[outcome.slice] = true;
            now = now + Duration::seconds(SPIN_COOLDOWN_SECS);
        }
        assert!(seen.iter().all(|s| *s));
    }
}
