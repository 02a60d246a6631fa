//! Insight generator - language-model helpers for categorisation and coaching.
//!
//! Every operation degrades to a fixed local answer when the model is unreachable
//! or answers with something unusable, so callers never see an upstream failure.

mod minimax;

pub use minimax::MinimaxClient;

use crate::{
    core::{report::monthly_summary, streak::get_or_create_streak, user::find_user},
    errors::Result,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::warn;

/// Categories the model may assign to a transaction.
pub const TRANSACTION_CATEGORIES: [&str; 7] = [
    "Food & Dining",
    "Entertainment",
    "Shopping",
    "Transport",
    "Bills & Utilities",
    "Health & Fitness",
    "Other",
];

/// Category used when the model cannot decide.
pub const FALLBACK_CATEGORY: &str = "Other";
/// Returned by [`InsightService::analyze_spending`] on failure.
pub const FALLBACK_SPENDING_INSIGHT: &str = "Unable to generate insights at this time.";
/// The single suggestion returned by [`InsightService::analyze_reflection`] on failure.
pub const FALLBACK_REFLECTION_SUGGESTION: &str = "Take time to reflect on your spending habits.";
/// Returned by [`InsightService::impulse_question`] on failure.
pub const FALLBACK_IMPULSE_QUESTION: &str = "Do you really need this right now?";

const CATEGORIZE_SYSTEM: &str = "You are a financial categorization assistant. \
Categorize transactions into one of these categories: Food & Dining, Entertainment, \
Shopping, Transport, Bills & Utilities, Health & Fitness, Other. \
Return ONLY the category name, nothing else.";

const SPENDING_SYSTEM: &str = "You are a personal finance advisor. \
Analyze spending patterns and provide brief, actionable insights. \
Keep your response under 100 words. Focus on specific patterns and suggestions.";

const REFLECTION_SYSTEM: &str = "You are a behavioral finance psychologist. \
Analyze reflections to identify emotional triggers and spending patterns. \
Return insights in this format:\n\
Triggers:\n- trigger one\n- trigger two\n\
Suggestions:\n- suggestion one\n- suggestion two";

const IMPULSE_SYSTEM: &str = "You are a mindful spending coach. \
Generate ONE brief, thought-provoking question to help someone pause before an impulse \
purchase. The question should make them consider if they really need the item. \
Keep it under 20 words.";

/// A chat-completion model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends one optional system prompt and one user prompt, returning the reply text.
    async fn complete(
        &self,
        system: Option<&str>,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String>;
}

/// Month-to-date figures fed into the spending analysis prompt
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpendingSnapshot {
    /// Spent this month
    pub total_spent: f64,
    /// Monthly income minus fixed expenses
    pub budget: f64,
    /// Biggest category this month
    pub top_category: Option<String>,
    /// Amount spent in the top category
    pub top_category_amount: f64,
    /// Impulse transactions this month
    pub impulse_count: usize,
    /// Amount spent on impulses this month
    pub impulse_total: f64,
    /// Current streak in days
    pub streak: i32,
}

/// Collects the figures [`InsightService::analyze_spending`] works from.
pub async fn spending_snapshot(
    db: &DatabaseConnection,
    user_id: i64,
    today: NaiveDate,
) -> Result<SpendingSnapshot> {
    let user = find_user(db, user_id).await?;
    let summary = monthly_summary(db, user_id, today).await?;
    let streak = get_or_create_streak(db, user_id).await?;
    let top = summary.categories.first();

    Ok(SpendingSnapshot {
        total_spent: summary.spent,
        budget: (user.monthly_income - user.fixed_expenses).max(0.0),
        top_category: top.map(|c| c.category.clone()),
        top_category_amount: top.map_or(0.0, |c| c.amount),
        impulse_count: summary.impulse_count,
        impulse_total: summary.impulse_total,
        streak: streak.current_streak,
    })
}

/// Emotional triggers and suggestions drawn from a reflection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectionAnalysis {
    /// What prompted the spending
    pub triggers: Vec<String>,
    /// What to try next time
    pub suggestions: Vec<String>,
}

impl ReflectionAnalysis {
    fn fallback() -> Self {
        Self {
            triggers: Vec::new(),
            suggestions: vec![FALLBACK_REFLECTION_SUGGESTION.to_string()],
        }
    }

    /// Reads `Triggers:` and `Suggestions:` sections made of `-` bullets.
    ///
    /// Lines outside a section, and lines that are not bullets, are ignored.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        #[derive(Clone, Copy)]
        enum Section {
            Triggers,
            Suggestions,
        }

        let mut analysis = Self {
            triggers: Vec::new(),
            suggestions: Vec::new(),
        };
        let mut section = None;
        for line in text.lines().map(str::trim) {
            if line.contains("Triggers:") {
                section = Some(Section::Triggers);
            } else if line.contains("Suggestions:") {
                section = Some(Section::Suggestions);
            } else if let Some(item) = line.strip_prefix('-') {
                let item = item.trim().to_string();
                match section {
                    Some(Section::Triggers) => analysis.triggers.push(item),
                    Some(Section::Suggestions) => analysis.suggestions.push(item),
                    None => {}
                }
            }
        }
        analysis
    }
}

/// Insight operations over any [`LanguageModel`].
pub struct InsightService<M> {
    model: M,
}

impl<M: LanguageModel> InsightService<M> {
    /// Wraps a model.
    pub const fn new(model: M) -> Self {
        Self { model }
    }

    async fn ask(
        &self,
        task: &str,
        system: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Option<String> {
        match self
            .model
            .complete(Some(system), prompt, temperature, max_tokens)
            .await
        {
            Ok(reply) => Some(reply.trim().to_string()).filter(|r| !r.is_empty()),
            Err(e) => {
                warn!("Insight request '{}' failed: {}", task, e);
                None
            }
        }
    }

    /// Picks one of [`TRANSACTION_CATEGORIES`] for a transaction description.
    pub async fn categorize_transaction(&self, description: &str, amount: f64) -> String {
        let prompt = format!("Categorize this transaction: '{description}' (${amount:.2})");
        self.ask("categorize", CATEGORIZE_SYSTEM, &prompt, 0.3, 20)
            .await
            .and_then(|reply| {
                TRANSACTION_CATEGORIES
                    .iter()
                    .find(|c| c.eq_ignore_ascii_case(&reply))
                    .map(|c| (*c).to_string())
            })
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string())
    }

    /// Two or three short observations about this month's spending.
    pub async fn analyze_spending(&self, snapshot: &SpendingSnapshot) -> String {
        let prompt = format!(
            "Analyze this spending data:\n\
             - Total spent this month: ${:.2}\n\
             - Budget: ${:.2}\n\
             - Top category: {} (${:.2})\n\
             - Impulse purchases: {} (${:.2})\n\
             - Current streak: {} days\n\n\
             Provide 2-3 specific insights and suggestions.",
            snapshot.total_spent,
            snapshot.budget,
            snapshot.top_category.as_deref().unwrap_or("N/A"),
            snapshot.top_category_amount,
            snapshot.impulse_count,
            snapshot.impulse_total,
            snapshot.streak,
        );
        self.ask("analyze_spending", SPENDING_SYSTEM, &prompt, 0.7, 200)
            .await
            .unwrap_or_else(|| FALLBACK_SPENDING_INSIGHT.to_string())
    }

    /// Triggers and suggestions for a reflection written in regret or satisfaction.
    pub async fn analyze_reflection(&self, text: &str, regret: bool) -> ReflectionAnalysis {
        let emotion = if regret { "regret" } else { "satisfaction" };
        let prompt = format!("Analyze this reflection (feeling {emotion}): '{text}'");
        match self
            .ask("analyze_reflection", REFLECTION_SYSTEM, &prompt, 0.7, 300)
            .await
        {
            Some(reply) => ReflectionAnalysis::parse(&reply),
            None => ReflectionAnalysis::fallback(),
        }
    }

    /// One question to make the user pause before buying.
    pub async fn impulse_question(&self, item_name: &str, price: f64) -> String {
        let prompt =
            format!("Generate a reflection question for buying '{item_name}' at ${price:.2}");
        self.ask("impulse_question", IMPULSE_SYSTEM, &prompt, 0.8, 50)
            .await
            .unwrap_or_else(|| FALLBACK_IMPULSE_QUESTION.to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::transaction::{NewTransaction, create_transaction},
        errors::Error,
        test_utils::*,
    };
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// Replies with a fixed answer (or fails) and records the prompts it saw.
    struct ScriptedModel {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(
            &self,
            _system: Option<&str>,
            prompt: &str,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().ok_or_else(|| Error::UpstreamUnavailable {
                message: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_categorize_accepts_known_category() {
        let service = InsightService::new(ScriptedModel::replying("  shopping\n"));
        assert_eq!(
            service.categorize_transaction("New headphones", 89.0).await,
            "Shopping"
        );
        let prompts = service.model.prompts.lock().unwrap();
        assert!(prompts[0].contains("'New headphones' ($89.00)"));
    }

    #[tokio::test]
    async fn test_categorize_falls_back() {
        let service = InsightService::new(ScriptedModel::replying("Groceries"));
        assert_eq!(service.categorize_transaction("Milk", 2.0).await, "Other");

        let service = InsightService::new(ScriptedModel::failing());
        assert_eq!(service.categorize_transaction("Milk", 2.0).await, "Other");
    }

    #[tokio::test]
    async fn test_fallback_answers_when_model_is_down() {
        let service = InsightService::new(ScriptedModel::failing());
        assert_eq!(
            service.analyze_spending(&SpendingSnapshot::default()).await,
            FALLBACK_SPENDING_INSIGHT
        );
        assert_eq!(
            service.impulse_question("Sneakers", 120.0).await,
            FALLBACK_IMPULSE_QUESTION
        );
        let analysis = service.analyze_reflection("Bought a game", true).await;
        assert!(analysis.triggers.is_empty());
        assert_eq!(analysis.suggestions, vec![FALLBACK_REFLECTION_SUGGESTION]);
    }

    #[tokio::test]
    async fn test_empty_reply_uses_fallback() {
        let service = InsightService::new(ScriptedModel::replying("   "));
        assert_eq!(
            service.impulse_question("Sneakers", 120.0).await,
            FALLBACK_IMPULSE_QUESTION
        );
    }

    #[tokio::test]
    async fn test_analyze_reflection_parses_sections() {
        let reply = "Here is what I see.\n\
                     Triggers:\n\
                     - Boredom after work\n\
                     - Social media ads\n\
                     Suggestions:\n\
                     - Unsubscribe from store newsletters\n\
                     not a bullet\n";
        let service = InsightService::new(ScriptedModel::replying(reply));
        let analysis = service.analyze_reflection("Bought a lamp", false).await;
        assert_eq!(
            analysis.triggers,
            vec!["Boredom after work", "Social media ads"]
        );
        assert_eq!(analysis.suggestions, vec!["Unsubscribe from store newsletters"]);
        assert!(service.model.prompts.lock().unwrap()[0].contains("feeling satisfaction"));
    }

    #[test]
    fn test_parse_ignores_bullets_before_sections() {
        let analysis = ReflectionAnalysis::parse("- stray\nSuggestions:\n- Walk first");
        assert!(analysis.triggers.is_empty());
        assert_eq!(analysis.suggestions, vec!["Walk first"]);
    }

    #[tokio::test]
    async fn test_spending_snapshot() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let when = Utc.with_ymd_and_hms(2024, 5, 3, 12, 0, 0).unwrap();

        let mut food = NewTransaction::new(40.0, "Food & Dining");
        food.date = Some(when);
        create_transaction(&db, user.id, food).await?;
        let mut gadget = NewTransaction::new(25.0, "Shopping");
        gadget.date = Some(when);
        gadget.is_impulse = true;
        create_transaction(&db, user.id, gadget).await?;

        let snapshot =
            spending_snapshot(&db, user.id, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()).await?;
        assert_eq!(snapshot.total_spent, 65.0);
        assert_eq!(snapshot.budget, 1500.0);
        assert_eq!(snapshot.top_category.as_deref(), Some("Food & Dining"));
        assert_eq!(snapshot.top_category_amount, 40.0);
        assert_eq!(snapshot.impulse_count, 1);
        assert_eq!(snapshot.impulse_total, 25.0);
        assert_eq!(snapshot.streak, 0);

        let service = InsightService::new(ScriptedModel::replying("Cook at home more."));
        assert_eq!(service.analyze_spending(&snapshot).await, "Cook at home more.");
        let prompts = service.model.prompts.lock().unwrap();
        assert!(prompts[0].contains("Top category: Food & Dining ($40.00)"));
        Ok(())
    }
}
