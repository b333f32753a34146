use crate::authorization::AuthorizationRequest;
use crate::error::CoreError;
use crate::money::Money;
use crate::store::AuthorizationStore;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleResult {
    Approve,
    Decline(String),
}

/// A single independent policy check. Evaluation order is the order rules
/// are registered with the engine; a rule never sees another rule's
/// decision, only the request and whatever store it was built with.
#[async_trait]
pub trait Rule: Send + Sync {
    async fn evaluate(&self, request: &AuthorizationRequest) -> Result<RuleResult, CoreError>;

    fn name(&self) -> &'static str;
}

/// Declines if `amount` exceeds the configured per-transaction cap in the
/// presented currency. A currency that doesn't match the cap's currency
/// declines rather than raising, per the rule contract.
pub struct TransactionLimitRule {
    cap: Money,
}

impl TransactionLimitRule {
    pub fn new(cap: Money) -> Self {
        Self { cap }
    }
}

#[async_trait]
impl Rule for TransactionLimitRule {
    async fn evaluate(&self, request: &AuthorizationRequest) -> Result<RuleResult, CoreError> {
        match request.amount.exceeds(&self.cap) {
            Ok(true) => Ok(RuleResult::Decline(format!(
                "amount {} exceeds transaction limit {}",
                request.amount, self.cap
            ))),
            Ok(false) => Ok(RuleResult::Approve),
            Err(_) => Ok(RuleResult::Decline("currency not supported".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "transaction_limit"
    }
}

/// Sums APPROVED authorizations for the card since the start of the current
/// UTC day, adds the request amount, and declines if the total exceeds the
/// configured cap.
pub struct DailySpendLimitRule {
    cap: Money,
    store: Arc<dyn AuthorizationStore>,
}

impl DailySpendLimitRule {
    pub fn new(cap: Money, store: Arc<dyn AuthorizationStore>) -> Self {
        Self { cap, store }
    }
}

#[async_trait]
impl Rule for DailySpendLimitRule {
    async fn evaluate(&self, request: &AuthorizationRequest) -> Result<RuleResult, CoreError> {
        let start_of_day = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc();

        let spent = self
            .store
            .sum_approved_since(request.card_id, start_of_day)
            .await?;

        let projected = Money::new(spent + request.amount.amount(), request.amount.currency());

        if projected.exceeds(&self.cap).unwrap_or(true) {
            return Ok(RuleResult::Decline(format!(
                "projected daily spend {} exceeds daily limit {}",
                projected, self.cap
            )));
        }

        Ok(RuleResult::Approve)
    }

    fn name(&self) -> &'static str {
        "daily_spend_limit"
    }
}

/// Declines if the request's merchant category code is on the blocklist.
pub struct MccBlockingRule {
    blocklist: HashSet<String>,
}

impl MccBlockingRule {
    pub fn new(blocklist: impl IntoIterator<Item = String>) -> Self {
        Self {
            blocklist: blocklist.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Rule for MccBlockingRule {
    async fn evaluate(&self, request: &AuthorizationRequest) -> Result<RuleResult, CoreError> {
        if let Some(mcc) = &request.merchant.mcc {
            if self.blocklist.contains(mcc) {
                return Ok(RuleResult::Decline(format!(
                    "merchant category code {mcc} is blocked"
                )));
            }
        }
        Ok(RuleResult::Approve)
    }

    fn name(&self) -> &'static str {
        "mcc_blocking"
    }
}

/// Declines if the card has `threshold` or more authorizations in the
/// trailing 60 seconds. The boundary is inclusive (`>=`, not `>`).
pub struct VelocityRule {
    threshold: u64,
    store: Arc<dyn AuthorizationStore>,
}

impl VelocityRule {
    pub fn new(threshold: u64, store: Arc<dyn AuthorizationStore>) -> Self {
        Self { threshold, store }
    }
}

#[async_trait]
impl Rule for VelocityRule {
    async fn evaluate(&self, request: &AuthorizationRequest) -> Result<RuleResult, CoreError> {
        let window_start = Utc::now() - Duration::seconds(60);
        let count = self.store.count_since(request.card_id, window_start).await?;

        if count >= self.threshold {
            return Ok(RuleResult::Decline(format!(
                "velocity {count} at or above threshold {}",
                self.threshold
            )));
        }

        Ok(RuleResult::Approve)
    }

    fn name(&self) -> &'static str {
        "velocity"
    }
}

/// Ordered pipeline of independent rules; the first decline short-circuits
/// and wins. Running the rules engine before any CBS call avoids spending
/// an external round-trip on a request that policy would reject anyway.
pub struct RulesEngine {
    rules: Vec<Arc<dyn Rule>>,
}

impl RulesEngine {
    pub fn new(rules: Vec<Arc<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub async fn evaluate(&self, request: &AuthorizationRequest) -> Result<RuleResult, CoreError> {
        for rule in &self.rules {
            if let RuleResult::Decline(reason) = rule.evaluate(request).await? {
                tracing::info!(rule = rule.name(), reason = %reason, "rule declined request");
                return Ok(RuleResult::Decline(reason));
            }
        }
        Ok(RuleResult::Approve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::MerchantMetadata;
    use crate::money::Currency;
    use uuid::Uuid;

    fn request(amount: &str, mcc: Option<&str>) -> AuthorizationRequest {
        AuthorizationRequest {
            card_id: Uuid::new_v4(),
            amount: Money::from_str_amount(amount, Currency::Usd).unwrap(),
            merchant: MerchantMetadata {
                name: "Coffee Shop".to_string(),
                mcc: mcc.map(|s| s.to_string()),
                city: None,
                country: None,
            },
            idempotency_key: "k1".to_string(),
        }
    }

    #[tokio::test]
    async fn transaction_limit_approves_at_exact_cap() {
        let rule = TransactionLimitRule::new(Money::from_str_amount("1000.00", Currency::Usd).unwrap());
        let req = request("1000.00", None);
        assert_eq!(rule.evaluate(&req).await.unwrap(), RuleResult::Approve);
    }

    #[tokio::test]
    async fn transaction_limit_declines_above_cap() {
        let rule = TransactionLimitRule::new(Money::from_str_amount("1000.00", Currency::Usd).unwrap());
        let req = request("1000.01", None);
        assert!(matches!(rule.evaluate(&req).await.unwrap(), RuleResult::Decline(_)));
    }

    #[tokio::test]
    async fn mcc_blocking_declines_listed_code() {
        let rule = MccBlockingRule::new(vec!["7995".to_string(), "6211".to_string()]);
        let req = request("50.00", Some("7995"));
        assert!(matches!(rule.evaluate(&req).await.unwrap(), RuleResult::Decline(_)));
    }

    #[tokio::test]
    async fn mcc_blocking_approves_unlisted_code() {
        let rule = MccBlockingRule::new(vec!["7995".to_string()]);
        let req = request("50.00", Some("5814"));
        assert_eq!(rule.evaluate(&req).await.unwrap(), RuleResult::Approve);
    }
}
