//! Reward backend for a Telegram mini-app.
//!
//! Users earn TK by watching ads, referring friends, and spinning a
//! reward wheel. The ad network reports completed views through a
//! server-to-server postback, and [`rewards`] credits each ad event
//! exactly once no matter how often the postback is retried. All
//! balance-touching operations run as atomic units through
//! [`store::Store`].
//!
//! - [`ledger`] — accounts, the processed-event idempotency ledger,
//!   withdrawal records, and balance primitives
//! - [`rewards`] — the idempotent postback processor
//! - [`referral`] — account creation and one-time referrer crediting
//! - [`spin`] — the cooldown-gated reward wheel
//! - [`withdraw`] — withdrawal requests and their balance debit
//! - [`store`] — transactional state with snapshot persistence
//! - [`http`] — the actix-web surface the ad network and webview call

pub mod http;
pub mod ledger;
pub mod referral;
pub mod rewards;
pub mod spin;
pub mod store;
pub mod withdraw;
