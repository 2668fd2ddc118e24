//! Board generation
//!
//! Asks the generative service for a complete board about a topic and turns the
//! answer into [`GameData`]. Anything that goes wrong along the way (no key,
//! network, garbage JSON, wrong shape) ends in the built-in holiday board plus a
//! [`BoardNotice`] for the host. Board generation itself never fails.

mod fallback;

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::llm::{GenerateRequest, GenerationTask, LlmError, LlmProvider};
use crate::types::{
    BoardNotice, Category, FinalClue, GameData, Question, CATEGORY_COUNT, VALUE_TIERS,
};

pub use fallback::fallback_board;

/// Errors that can occur while producing a generated board
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Received empty response from the AI model")]
    Empty,

    #[error("Board JSON is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Board does not have the required shape: {0}")]
    Invalid(String),
}

impl BoardError {
    /// The notice the host sees when this error forces the fallback board
    pub fn notice(&self) -> BoardNotice {
        match self {
            BoardError::Llm(LlmError::MissingCredentials) => BoardNotice::MissingCredentials,
            _ => BoardNotice::GenerationFailed,
        }
    }
}

/// A board ready to play, and why it is the fallback if it is one
#[derive(Debug, Clone)]
pub struct BoardOutcome {
    pub data: GameData,
    pub notice: Option<BoardNotice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoardPayload {
    categories: Vec<CategoryPayload>,
    final_jeopardy: FinalPayload,
}

#[derive(Debug, Deserialize)]
struct CategoryPayload {
    title: String,
    #[serde(default)]
    questions: Vec<QuestionPayload>,
}

#[derive(Debug, Deserialize)]
struct QuestionPayload {
    value: u32,
    clue: String,
    answer: String,
}

#[derive(Debug, Deserialize)]
struct FinalPayload {
    category: String,
    clue: String,
    answer: String,
}

pub fn board_prompt(topic: &str) -> String {
    format!(
        "Generate a full Jeopardy-style game board specifically about the topic: \"{topic}\".\n\
         Requirements:\n\
         1. Create exactly 5 unique categories related to \"{topic}\".\n\
         2. Each category must have exactly 5 questions with dollar values 200, 400, 600, 800, 1000.\n\
         3. Create 1 \"Final Jeopardy\" question (category, clue, and answer) about \"{topic}\".\n\
         4. Clue format: A statement like \"This reindeer is famous for his red nose.\"\n\
         5. Answer format: A question like \"Who is Rudolph?\"\n\
         Return ONLY a raw JSON object."
    )
}

/// Response schema sent along with the board prompt
pub fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "categories": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "questions": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "value": { "type": "INTEGER" },
                                    "clue": { "type": "STRING" },
                                    "answer": { "type": "STRING" }
                                },
                                "required": ["value", "clue", "answer"]
                            }
                        }
                    },
                    "required": ["title", "questions"]
                }
            },
            "finalJeopardy": {
                "type": "OBJECT",
                "properties": {
                    "category": { "type": "STRING" },
                    "clue": { "type": "STRING" },
                    "answer": { "type": "STRING" }
                },
                "required": ["category", "clue", "answer"]
            }
        },
        "required": ["categories", "finalJeopardy"]
    })
}

/// Remove a markdown code fence the model sometimes wraps around JSON
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse a service response into a fresh board.
/// IDs from the service are never trusted; every id is newly minted here.
pub fn parse_board(text: &str) -> Result<GameData, BoardError> {
    let cleaned = strip_code_fence(text);
    if cleaned.is_empty() {
        return Err(BoardError::Empty);
    }

    let payload: BoardPayload = serde_json::from_str(cleaned)?;

    let categories = payload
        .categories
        .into_iter()
        .map(|category| {
            let mut questions: Vec<Question> = category
                .questions
                .into_iter()
                .map(|q| Question {
                    id: ulid::Ulid::new().to_string(),
                    value: q.value,
                    clue: q.clue.trim().to_string(),
                    answer: q.answer.trim().to_string(),
                    is_answered: false,
                })
                .collect();
            // Rows are laid out by value even if the model shuffled them
            questions.sort_by_key(|q| q.value);

            Category {
                id: ulid::Ulid::new().to_string(),
                title: category.title.trim().to_string(),
                questions,
            }
        })
        .collect();

    let data = GameData {
        categories,
        final_clue: FinalClue {
            category: payload.final_jeopardy.category.trim().to_string(),
            clue: payload.final_jeopardy.clue.trim().to_string(),
            answer: payload.final_jeopardy.answer.trim().to_string(),
        },
    };

    validate(&data)?;
    Ok(data)
}

/// Check the board shape every game relies on
pub fn validate(data: &GameData) -> Result<(), BoardError> {
    if data.categories.len() != CATEGORY_COUNT {
        return Err(BoardError::Invalid(format!(
            "expected {} categories, got {}",
            CATEGORY_COUNT,
            data.categories.len()
        )));
    }

    for category in &data.categories {
        if category.title.is_empty() {
            return Err(BoardError::Invalid("category without a title".to_string()));
        }

        let values: Vec<u32> = category.questions.iter().map(|q| q.value).collect();
        if values != VALUE_TIERS {
            return Err(BoardError::Invalid(format!(
                "category \"{}\" has values {:?}, expected {:?}",
                category.title, values, VALUE_TIERS
            )));
        }

        if let Some(q) = category
            .questions
            .iter()
            .find(|q| q.clue.is_empty() || q.answer.is_empty())
        {
            return Err(BoardError::Invalid(format!(
                "question worth {} in \"{}\" is missing its clue or answer",
                q.value, category.title
            )));
        }
    }

    let final_clue = &data.final_clue;
    if final_clue.category.is_empty() || final_clue.clue.is_empty() || final_clue.answer.is_empty()
    {
        return Err(BoardError::Invalid("incomplete final clue".to_string()));
    }

    Ok(())
}

/// Ask the service for a board about `topic`
pub async fn request_board(
    provider: &dyn LlmProvider,
    topic: &str,
    thinking_budget: u32,
    timeout: Option<Duration>,
) -> Result<GameData, BoardError> {
    let request = GenerateRequest {
        task: GenerationTask::Board,
        prompt: board_prompt(topic),
        response_schema: Some(response_schema()),
        thinking_budget: Some(thinking_budget),
        timeout,
    };

    let response = provider.generate(request).await?;
    tracing::info!(
        "Board response from {} ({}ms, {:?} tokens)",
        response.metadata.model,
        response.metadata.latency_ms,
        response.metadata.tokens_used
    );

    parse_board(&response.text)
}

/// Produce a playable board, generated if possible and the fallback otherwise
pub async fn generate_board(
    provider: Option<&dyn LlmProvider>,
    topic: &str,
    thinking_budget: u32,
    timeout: Option<Duration>,
) -> BoardOutcome {
    let result = match provider {
        Some(provider) => request_board(provider, topic, thinking_budget, timeout).await,
        None => Err(BoardError::Llm(LlmError::MissingCredentials)),
    };

    match result {
        Ok(data) => {
            tracing::info!("Generated board for topic \"{}\"", topic);
            BoardOutcome { data, notice: None }
        }
        Err(e) => {
            tracing::error!("Game generation failed for \"{}\": {}", topic, e);
            BoardOutcome {
                data: fallback_board(),
                notice: Some(e.notice()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json(values: [u32; 5], categories: usize) -> String {
        let category = |i: usize| {
            let questions: Vec<_> = values
                .iter()
                .map(|v| json!({ "value": v, "clue": format!("clue {v}"), "answer": format!("What is {v}?") }))
                .collect();
            json!({ "id": "untrusted", "title": format!("Category {i}"), "questions": questions })
        };
        json!({
            "categories": (0..categories).map(category).collect::<Vec<_>>(),
            "finalJeopardy": { "category": "Origins", "clue": "Roman festival", "answer": "What is Saturnalia?" }
        })
        .to_string()
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_board_assigns_fresh_ids() {
        let data = parse_board(&sample_json(VALUE_TIERS, 5)).unwrap();
        assert_eq!(data.categories.len(), 5);

        let mut ids = std::collections::HashSet::new();
        for category in &data.categories {
            assert_ne!(category.id, "untrusted");
            assert!(ids.insert(category.id.clone()));
            for q in &category.questions {
                assert!(!q.is_answered);
                assert!(ids.insert(q.id.clone()));
            }
        }
        assert_eq!(ids.len(), 30);
        assert_eq!(data.final_clue.answer, "What is Saturnalia?");
    }

    #[test]
    fn test_parse_board_inside_fence() {
        let fenced = format!("```json\n{}\n```", sample_json(VALUE_TIERS, 5));
        assert!(parse_board(&fenced).is_ok());
    }

    #[test]
    fn test_parse_board_orders_rows_by_value() {
        let data = parse_board(&sample_json([1000, 200, 800, 400, 600], 5)).unwrap();
        let values: Vec<u32> = data.categories[0].questions.iter().map(|q| q.value).collect();
        assert_eq!(values, VALUE_TIERS);
    }

    #[test]
    fn test_parse_board_rejects_wrong_shape() {
        assert!(matches!(
            parse_board(&sample_json(VALUE_TIERS, 4)),
            Err(BoardError::Invalid(_))
        ));
        assert!(matches!(
            parse_board(&sample_json([200, 400, 600, 800, 1200], 5)),
            Err(BoardError::Invalid(_))
        ));
        assert!(matches!(
            parse_board("not json"),
            Err(BoardError::Malformed(_))
        ));
        assert!(matches!(parse_board("```json\n```"), Err(BoardError::Empty)));
    }

    #[test]
    fn test_notice_distinguishes_missing_key() {
        assert_eq!(
            BoardError::Llm(LlmError::MissingCredentials).notice(),
            BoardNotice::MissingCredentials
        );
        assert_eq!(
            BoardError::Llm(LlmError::ApiError("boom".to_string())).notice(),
            BoardNotice::GenerationFailed
        );
        assert_eq!(BoardError::Empty.notice(), BoardNotice::GenerationFailed);
    }

    #[tokio::test]
    async fn test_generate_board_without_provider_uses_fallback() {
        let outcome = generate_board(None, "Holiday Food", 4000, None).await;
        assert_eq!(outcome.notice, Some(BoardNotice::MissingCredentials));
        assert_eq!(outcome.data.categories[0].title, "Christmas Carols");
        assert!(validate(&outcome.data).is_ok());
    }
}
