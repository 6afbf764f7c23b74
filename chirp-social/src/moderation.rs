use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{SocialContext, SocialError, SocialResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Harassment,
    Hate,
    Sexual,
    Violence,
    SelfHarm,
    Spam,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Harassment,
        Category::Hate,
        Category::Sexual,
        Category::Violence,
        Category::SelfHarm,
        Category::Spam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Harassment => "harassment",
            Category::Hate => "hate",
            Category::Sexual => "sexual",
            Category::Violence => "violence",
            Category::SelfHarm => "self_harm",
            Category::Spam => "spam",
        }
    }

    /// Content at or above this severity is blocked
    pub fn block_threshold(&self) -> Severity {
        match self {
            Category::SelfHarm | Category::Sexual => Severity::Medium,
            _ => Severity::High,
        }
    }

    /// Content at or above this severity is flagged for review
    pub fn review_threshold(&self) -> Severity {
        match self {
            Category::Spam => Severity::High,
            _ => Severity::Medium,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Severity::None),
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

/// The verdict on a piece of text
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationResult {
    pub allowed: bool,
    pub flagged: bool,
    pub blocked: bool,
    /// False when no classifier is configured and the text was let through unchecked
    pub moderated: bool,
    pub categories: BTreeMap<Category, Severity>,
    pub reason: Option<String>,
    /// The model's own flagged/blocked answer contradicted its category severities
    pub model_disagreed: bool,
}

impl ModerationResult {
    fn unmoderated() -> Self {
        Self {
            allowed: true,
            flagged: false,
            blocked: false,
            moderated: false,
            categories: Category::ALL.iter().map(|c| (*c, Severity::None)).collect(),
            reason: None,
            model_disagreed: false,
        }
    }
}

/// What the classifier answered, before the thresholds are applied
#[derive(Debug, Clone, Default)]
struct Verdict {
    categories: BTreeMap<Category, Severity>,
    flagged: Option<bool>,
    blocked: Option<bool>,
    reason: Option<String>,
}

pub struct Moderation {
    context: SocialContext,
}

impl Moderation {
    pub fn new(context: &SocialContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn check(&self, text: &str) -> SocialResult<ModerationResult> {
        let text = text.trim();

        if text.is_empty() {
            return Err(SocialError::invalid("Text is required"));
        }

        let Some(classifier) = &self.context.integrations.classifier else {
            log::warn!("No classifier configured, letting text through unmoderated");
            return Ok(ModerationResult::unmoderated());
        };

        let answer = classifier.classify(&prompt(text), &schema()).await?;
        let verdict = parse_verdict(&answer);

        Ok(apply_guard(verdict))
    }
}

fn prompt(text: &str) -> String {
    let rubric = Category::ALL
        .iter()
        .map(|c| {
            format!(
                "- {}: block at {}, review at {}",
                c,
                c.block_threshold().as_str(),
                c.review_threshold().as_str()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a content moderator for a social network. Rate the text below in every \
category with one of none, low, medium or high.\n\
Thresholds per category:\n{}\n\
Set flagged when any category reaches its review threshold and blocked when any category \
reaches its block threshold. Give a short reason when the text is flagged.\n\n\
Text:\n\"\"\"\n{}\n\"\"\"",
        rubric, text
    )
}

/// The JSON schema the classifier is constrained to
fn schema() -> Value {
    let levels = json!({
        "type": "STRING",
        "enum": ["none", "low", "medium", "high"],
    });

    let categories: serde_json::Map<_, _> = Category::ALL
        .iter()
        .map(|c| (c.as_str().to_string(), levels.clone()))
        .collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "categories": {
                "type": "OBJECT",
                "properties": categories,
                "required": Category::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            },
            "flagged": { "type": "BOOLEAN" },
            "blocked": { "type": "BOOLEAN" },
            "reason": { "type": "STRING" },
        },
        "required": ["categories", "flagged", "blocked"],
    })
}

/// Reads the model's answer leniently. Missing or unknown severities count as none.
fn parse_verdict(answer: &Value) -> Verdict {
    let categories = Category::ALL
        .iter()
        .map(|c| {
            let severity = answer
                .get("categories")
                .and_then(|cs| cs.get(c.as_str()))
                .and_then(Value::as_str)
                .and_then(Severity::parse)
                .unwrap_or_default();

            (*c, severity)
        })
        .collect();

    Verdict {
        categories,
        flagged: answer.get("flagged").and_then(Value::as_bool),
        blocked: answer.get("blocked").and_then(Value::as_bool),
        reason: answer
            .get("reason")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
    }
}

/// Decides from the per-category severities, ignoring the model's own booleans
fn apply_guard(verdict: Verdict) -> ModerationResult {
    let reaches = |threshold: fn(&Category) -> Severity| {
        verdict
            .categories
            .iter()
            .filter(|(category, severity)| **severity >= threshold(category))
            .map(|(category, _)| *category)
            .collect::<Vec<_>>()
    };

    let blocking = reaches(Category::block_threshold);
    let reviewable = reaches(Category::review_threshold);

    let blocked = !blocking.is_empty();
    let flagged = blocked || !reviewable.is_empty();

    let model_disagreed =
        verdict.blocked.is_some_and(|b| b != blocked) || verdict.flagged.is_some_and(|f| f != flagged);

    if model_disagreed {
        log::warn!(
            "Classifier answered flagged={:?} blocked={:?}, severities say flagged={} blocked={}",
            verdict.flagged,
            verdict.blocked,
            flagged,
            blocked
        );
    }

    let reason = if flagged {
        verdict.reason.or_else(|| {
            let reached = if blocked { &blocking } else { &reviewable };
            let names: Vec<_> = reached.iter().map(|c| c.as_str()).collect();

            Some(format!("Rated too high for: {}", names.join(", ")))
        })
    } else {
        None
    };

    ModerationResult {
        allowed: !blocked,
        flagged,
        blocked,
        moderated: true,
        categories: verdict.categories,
        reason,
        model_disagreed,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chirp_core::{Config, IntegrationError};

    use super::*;
    use crate::{
        testing::{FakeClassifier, TestSocial},
        Integrations,
    };

    fn verdict(ratings: &[(Category, Severity)]) -> Verdict {
        let mut verdict = parse_verdict(&json!({}));
        verdict.categories.extend(ratings.iter().copied());
        verdict
    }

    async fn moderation_with(response: Result<Value, IntegrationError>) -> TestSocial {
        let integrations = Integrations {
            classifier: Some(Arc::new(FakeClassifier { response })),
            ..Default::default()
        };

        TestSocial::build(Config::default(), integrations, &[]).await
    }

    #[test]
    fn test_thresholds() {
        let clean = apply_guard(verdict(&[(Category::Hate, Severity::Low)]));
        assert!(clean.allowed && !clean.flagged && clean.reason.is_none());

        let spammy = apply_guard(verdict(&[(Category::Spam, Severity::Medium)]));
        assert!(!spammy.flagged);

        let rude = apply_guard(verdict(&[(Category::Harassment, Severity::Medium)]));
        assert!(rude.flagged && !rude.blocked && rude.allowed);

        let explicit = apply_guard(verdict(&[(Category::Sexual, Severity::Medium)]));
        assert!(explicit.blocked && explicit.flagged && !explicit.allowed);
        assert_eq!(explicit.reason.as_deref(), Some("Rated too high for: sexual"));

        let violent = apply_guard(verdict(&[(Category::Violence, Severity::High)]));
        assert!(violent.blocked);
    }

    #[test]
    fn test_model_booleans_are_overridden() {
        let answer = json!({
            "categories": { "self_harm": "HIGH", "spam": "weird" },
            "flagged": false,
            "blocked": false,
            "reason": "  ",
        });

        let parsed = parse_verdict(&answer);
        assert_eq!(parsed.categories[&Category::SelfHarm], Severity::High);
        assert_eq!(parsed.categories[&Category::Spam], Severity::None);
        assert_eq!(parsed.reason, None);

        let result = apply_guard(parsed);
        assert!(result.blocked);
        assert!(result.model_disagreed);
    }

    #[test]
    fn test_schema_lists_every_category() {
        let schema = schema();
        let properties = &schema["properties"]["categories"]["properties"];

        for category in Category::ALL {
            assert!(properties.get(category.as_str()).is_some());
        }
        assert!(prompt("hello").contains("self_harm: block at medium, review at medium"));
    }

    #[tokio::test]
    async fn test_fails_open_without_classifier() {
        let test = TestSocial::with_users(&[]).await;
        let result = test.social.moderation.check("anything").await.unwrap();

        assert!(result.allowed);
        assert!(!result.moderated);

        assert!(matches!(
            test.social.moderation.check("   ").await,
            Err(SocialError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_check_uses_classifier() {
        let test = moderation_with(Ok(json!({
            "categories": { "hate": "high" },
            "flagged": true,
            "blocked": true,
            "reason": "Slur",
        })))
        .await;

        let result = test.social.moderation.check("bad words").await.unwrap();
        assert!(result.blocked && result.moderated && !result.model_disagreed);
        assert_eq!(result.reason.as_deref(), Some("Slur"));

        let failing = moderation_with(Err(IntegrationError::Request("down".to_string()))).await;
        assert!(matches!(
            failing.social.moderation.check("text").await,
            Err(SocialError::Integration(_))
        ));
    }
}
