//! Run-wide token budget shared by all workers.
//!
//! [`BudgetedModel`] wraps a [`LanguageModel`] and charges the shared
//! [`TokenBudget`] for every prompt before sending it. Once the budget is
//! spent every further call fails with [`BudgetExhausted`], which callers
//! can recover with `anyhow::Error::downcast_ref`.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::llm::LanguageModel;

/// Approximate characters per token.
pub const CHARS_PER_TOKEN: u64 = 4;

/// Estimated token count of `text`.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(CHARS_PER_TOKEN)
}

#[derive(Debug)]
pub struct TokenBudget {
    limit: u64,
    used: AtomicU64,
}

impl TokenBudget {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
        }
    }

    /// Reserve `tokens`. Returns false, reserving nothing, when the
    /// reservation would exceed the limit.
    pub fn try_charge(&self, tokens: u64) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                let next = used.checked_add(tokens)?;
                (next <= self.limit).then_some(next)
            })
            .is_ok()
    }

    /// Record tokens already spent, even past the limit.
    pub fn charge_spent(&self, tokens: u64) {
        self.used.fetch_add(tokens, Ordering::SeqCst);
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

#[derive(Debug, thiserror::Error)]
#[error("token budget exhausted ({used}/{limit} tokens used)")]
pub struct BudgetExhausted {
    pub used: u64,
    pub limit: u64,
}

pub struct BudgetedModel {
    inner: Arc<dyn LanguageModel>,
    budget: Arc<TokenBudget>,
}

impl BudgetedModel {
    pub fn new(inner: Arc<dyn LanguageModel>, budget: Arc<TokenBudget>) -> Self {
        Self { inner, budget }
    }
}

#[async_trait]
impl LanguageModel for BudgetedModel {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        if !self.budget.try_charge(estimate_tokens(prompt)) {
            return Err(BudgetExhausted {
                used: self.budget.used(),
                limit: self.budget.limit(),
            }
            .into());
        }
        let output = self.inner.complete(prompt).await?;
        self.budget.charge_spent(estimate_tokens(&output));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl LanguageModel for Echo {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    #[tokio::test]
    async fn budgeted_model_stops_when_spent() {
        let budget = Arc::new(TokenBudget::new(6));
        let model = BudgetedModel::new(Arc::new(Echo), budget.clone());

        assert_eq!(model.complete("abcd").await.unwrap(), "abcd");
        assert_eq!(budget.used(), 2);

        let err = model.complete("abcdefghijklmnopqrst").await.unwrap_err();
        let exhausted = err.downcast_ref::<BudgetExhausted>().unwrap();
        assert_eq!((exhausted.used, exhausted.limit), (2, 6));
    }

    #[test]
    fn charges_until_exhausted() {
        let budget = TokenBudget::new(10);
        assert!(budget.try_charge(6));
        assert!(!budget.try_charge(5));
        assert_eq!(budget.used(), 6);
        assert!(budget.try_charge(4));
        assert!(!budget.try_charge(1));
    }

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
