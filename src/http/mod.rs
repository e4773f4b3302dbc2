use std::fmt;

use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ledger::{Account, Amount, LedgerError, WithdrawDetails};
use crate::referral::ProfileHints;
use crate::rewards::RewardOutcome;
use crate::store::Store;

/// HTTP-facing wrapper that maps each [`LedgerError`] kind onto a
/// status code the callers key off: the ad network retries on 5xx and
/// stops on anything else, the mini-app UI renders 4xx bodies.
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            LedgerError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            LedgerError::UnknownUser { .. } => StatusCode::NOT_FOUND,
            LedgerError::InsufficientBalance { .. } | LedgerError::InsufficientReferrals { .. } => {
                StatusCode::CONFLICT
            }
            LedgerError::StillCoolingDown { .. } => StatusCode::TOO_MANY_REQUESTS,
            LedgerError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let kind = match self.0 {
            LedgerError::InvalidRequest { .. } => "invalid_request",
            LedgerError::UnknownUser { .. } => "unknown_user",
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::InsufficientReferrals { .. } => "insufficient_referrals",
            LedgerError::StillCoolingDown { .. } => "still_cooling_down",
            LedgerError::Storage { .. } => "storage_failure",
        };
        let mut body = json!({ "error": kind, "message": self.0.to_string() });
        if let LedgerError::StillCoolingDown { remaining_secs } = self.0 {
            body["remaining_secs"] = json!(remaining_secs);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[derive(Debug, Deserialize)]
pub struct PostbackQuery {
    pub reward_event_type: Option<String>,
    pub ymid: Option<String>,
    pub telegram_id: Option<String>,
    pub reward_amount: Option<String>,
    pub ad_type: Option<String>,
}

/// Server-to-server postback from the ad network. 200 covers credited,
/// duplicate, and ignored alike: all three mean "handled, do not
/// retry". Only malformed input (400), an unknown user (404), or a
/// storage failure (500) break that contract.
async fn postback(
    store: web::Data<Store>,
    query: web::Query<PostbackQuery>,
) -> Result<HttpResponse, ApiError> {
    // Only "valued" events are billable completions; anything else,
    // including a postback with no discriminator at all, is
    // acknowledged and dropped.
    if query.reward_event_type.as_deref() != Some("valued") {
        log::info!(
            "ignoring postback event of type {:?}",
            query.reward_event_type
        );
        return Ok(HttpResponse::Ok().body("OK: event ignored"));
    }

    let ymid = query.ymid.as_deref().unwrap_or_default();
    let telegram_id = query.telegram_id.as_deref().unwrap_or_default();
    let amount: Amount = query
        .reward_amount
        .as_deref()
        .ok_or_else(|| LedgerError::invalid("missing reward_amount"))?
        .trim()
        .parse()
        .map_err(|_| LedgerError::invalid("reward_amount must be a positive integer"))?;

    let now = Utc::now();
    let outcome = store.transact(|ledger| {
        ledger.process_reward(ymid, telegram_id, amount, query.ad_type.as_deref(), now)
    })?;
    match &outcome {
        RewardOutcome::Credited { new_balance } => {
            log::info!("credited {amount} TK to {telegram_id} for ymid {ymid} (balance now {new_balance})");
        }
        // Duplicates stay visible in the logs for fraud analysis even
        // though the caller sees plain success.
        RewardOutcome::AlreadyProcessed => {
            log::warn!("duplicate postback for ymid {ymid} (telegram_id {telegram_id}); no credit");
        }
    }
    Ok(HttpResponse::Ok().json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountBody {
    pub user_id: String,
    pub first_name: Option<String>,
    pub username: Option<String>,
    /// Referrer id from the bot's start parameter, if any.
    pub referrer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountView {
    pub user_id: String,
    #[serde(flatten)]
    pub account: Account,
}

async fn create_account(
    store: web::Data<Store>,
    body: web::Json<CreateAccountBody>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let hints = ProfileHints {
        first_name: body.first_name,
        username: body.username,
    };
    let now = Utc::now();
    let account = store.transact(|ledger| {
        ledger.get_or_create_account(&body.user_id, &hints, body.referrer.as_deref(), now)
    })?;
    Ok(HttpResponse::Ok().json(AccountView {
        user_id: body.user_id,
        account,
    }))
}

async fn get_account(
    store: web::Data<Store>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let account = store
        .read(|ledger| ledger.account(&user_id).cloned())
        .ok_or_else(|| LedgerError::UnknownUser {
            user: user_id.clone(),
        })?;
    Ok(HttpResponse::Ok().json(AccountView { user_id, account }))
}

#[derive(Debug, Deserialize)]
pub struct UserBody {
    pub user_id: String,
}

async fn claim_spin(
    store: web::Data<Store>,
    body: web::Json<UserBody>,
) -> Result<HttpResponse, ApiError> {
    let now = Utc::now();
    let outcome = store.transact(|ledger| {
        let mut rng = rand::thread_rng();
        ledger.claim_spin(&body.user_id, now, &mut rng)
    })?;
    log::info!("{} won {} TK on the wheel", body.user_id, outcome.won);
    Ok(HttpResponse::Ok().json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct WithdrawBody {
    pub user_id: String,
    pub name: String,
    pub method: String,
    pub number: String,
}

async fn request_withdrawal(
    store: web::Data<Store>,
    body: web::Json<WithdrawBody>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let details = WithdrawDetails {
        name: body.name,
        method: body.method,
        number: body.number,
    };
    let now = Utc::now();
    let receipt =
        store.transact(|ledger| ledger.request_withdrawal(&body.user_id, details, now))?;
    log::info!(
        "withdrawal {} submitted by {} ({} TK debited)",
        receipt.request_id,
        body.user_id,
        receipt.amount
    );
    Ok(HttpResponse::Ok().json(receipt))
}

#[derive(Debug, Deserialize)]
pub struct AdCooldownBody {
    pub user_id: String,
    pub slot: String,
}

async fn mark_ad_cooldown(
    store: web::Data<Store>,
    body: web::Json<AdCooldownBody>,
) -> Result<HttpResponse, ApiError> {
    let now = Utc::now();
    let expires_at =
        store.transact(|ledger| ledger.mark_ad_cooldown(&body.user_id, &body.slot, now))?;
    Ok(HttpResponse::Ok().json(json!({ "slot": body.slot, "expires_at": expires_at })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/postback", web::get().to(postback)).service(
        web::scope("/api")
            .route("/account", web::post().to(create_account))
            .route("/account/{id}", web::get().to(get_account))
            .route("/spin", web::post().to(claim_spin))
            .route("/withdraw", web::post().to(request_withdrawal))
            .route("/ad-cooldown", web::post().to(mark_ad_cooldown)),
    );
}
