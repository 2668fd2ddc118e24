use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type GameId = String;
pub type CategoryId = String;
pub type QuestionId = String;
pub type TeamId = u32;

/// Dollar values of the five rows on the board, top to bottom
pub const VALUE_TIERS: [u32; 5] = [200, 400, 600, 800, 1000];

/// Number of categories (columns) on a board
pub const CATEGORY_COUNT: usize = 5;

pub const DEFAULT_TOPIC: &str = "Christmas Traditions";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Setup,
    Loading,
    Playing,
    FinalRound,
    GameOver,
}

/// Steps of the final round, strictly in this order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalStep {
    Category,
    Clue,
    Answer,
    Scoring,
}

impl FinalStep {
    /// The only step reachable from this one
    pub fn next(self) -> Option<FinalStep> {
        match self {
            FinalStep::Category => Some(FinalStep::Clue),
            FinalStep::Clue => Some(FinalStep::Answer),
            FinalStep::Answer => Some(FinalStep::Scoring),
            FinalStep::Scoring => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub clue_seconds: u32,
    pub final_round_seconds: u32,
    pub max_teams: usize,
    pub min_teams: usize,
    /// Points moved by one press of a scoreboard +/- control
    pub score_step: i64,
    pub default_topic: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            clue_seconds: 30,
            final_round_seconds: 30,
            max_teams: 5,
            min_teams: 1,
            score_step: 200,
            default_topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

impl GameConfig {
    /// Load timer overrides from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let seconds = |key: &str, fallback: u32| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok())
                .filter(|s| *s > 0)
                .unwrap_or(fallback)
        };

        Self {
            clue_seconds: seconds("CLUE_SECONDS", defaults.clue_seconds),
            final_round_seconds: seconds("FINAL_ROUND_SECONDS", defaults.final_round_seconds),
            ..defaults
        }
    }
}

/// Why the built-in board was used instead of a generated one
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoardNotice {
    MissingCredentials,
    GenerationFailed,
}

impl BoardNotice {
    /// Human-readable notice shown above the board
    pub fn message(&self) -> &'static str {
        match self {
            BoardNotice::MissingCredentials => {
                "API key missing. Using the fallback holiday board."
            }
            BoardNotice::GenerationFailed => {
                "Failed to build a board for this topic. Using holiday defaults."
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub version: u64,
    pub phase: GamePhase,
    pub topic: String,
    pub config: GameConfig,
    pub notice: Option<BoardNotice>,
    pub created_at: String, // ISO timestamp
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub value: u32,
    pub clue: String,
    pub answer: String,
    pub is_answered: bool,
}

impl Question {
    /// Flip the answered flag. There is no way back.
    pub fn mark_answered(&mut self) {
        self.is_answered = true;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalClue {
    pub category: String,
    pub clue: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameData {
    pub categories: Vec<Category>,
    pub final_clue: FinalClue,
}

impl GameData {
    pub fn all_answered(&self) -> bool {
        self.categories
            .iter()
            .all(|c| c.questions.iter().all(|q| q.is_answered))
    }

    /// Find a question together with the title of its category
    pub fn find_question(&self, id: &str) -> Option<(&Category, &Question)> {
        self.categories.iter().find_map(|c| {
            c.questions
                .iter()
                .find(|q| q.id == id)
                .map(|q| (c, q))
        })
    }

    pub fn find_question_mut(&mut self, id: &str) -> Option<&mut Question> {
        self.categories
            .iter_mut()
            .flat_map(|c| c.questions.iter_mut())
            .find(|q| q.id == id)
    }

    pub fn remaining_questions(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|c| c.questions.iter())
            .filter(|q| !q.is_answered)
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    /// Can go negative after a missed final wager or a scoreboard correction
    pub score: i64,
}

impl Team {
    pub fn new(id: TeamId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            score: 0,
        }
    }
}

/// The two teams every new game starts with
pub fn default_teams() -> Vec<Team> {
    vec![Team::new(1, "The Elves"), Team::new(2, "The Reindeer")]
}

/// Direction of a scoreboard correction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScoreDirection {
    Up,
    Down,
}

/// Which presenter a timer or narration belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Presenter {
    Clue,
    FinalRound,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, value: u32) -> Question {
        Question {
            id: id.to_string(),
            value,
            clue: "clue".to_string(),
            answer: "answer".to_string(),
            is_answered: false,
        }
    }

    #[test]
    fn test_final_step_is_linear() {
        assert_eq!(FinalStep::Category.next(), Some(FinalStep::Clue));
        assert_eq!(FinalStep::Clue.next(), Some(FinalStep::Answer));
        assert_eq!(FinalStep::Answer.next(), Some(FinalStep::Scoring));
        assert_eq!(FinalStep::Scoring.next(), None);
    }

    #[test]
    fn test_all_answered_and_lookup() {
        let mut data = GameData {
            categories: vec![Category {
                id: "c".to_string(),
                title: "Carols".to_string(),
                questions: vec![question("a", 200), question("b", 400)],
            }],
            final_clue: FinalClue {
                category: "x".to_string(),
                clue: "y".to_string(),
                answer: "z".to_string(),
            },
        };
        assert!(!data.all_answered());
        assert_eq!(data.remaining_questions(), 2);

        let (category, q) = data.find_question("b").unwrap();
        assert_eq!(category.title, "Carols");
        assert_eq!(q.value, 400);

        data.find_question_mut("a").unwrap().mark_answered();
        data.find_question_mut("b").unwrap().mark_answered();
        assert!(data.all_answered());
        assert!(data.find_question("missing").is_none());
    }

    #[test]
    fn test_default_teams() {
        let teams = default_teams();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].name, "The Elves");
        assert_eq!(teams[1].name, "The Reindeer");
        assert!(teams.iter().all(|t| t.score == 0));
    }

    #[test]
    fn test_game_phase_serializes_screaming_snake() {
        let json = serde_json::to_string(&GamePhase::FinalRound).unwrap();
        assert_eq!(json, "\"FINAL_ROUND\"");
    }
}
