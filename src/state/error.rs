use crate::types::{FinalStep, GamePhase, QuestionId, TeamId};

/// Reasons a command is rejected by the game state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Cannot {action} during {phase:?}")]
    WrongPhase {
        action: &'static str,
        phase: GamePhase,
    },

    #[error("Invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition { from: GamePhase, to: GamePhase },

    #[error("Team {0} not found")]
    TeamNotFound(TeamId),

    #[error("Question {0} not found")]
    QuestionNotFound(QuestionId),

    #[error("Question {0} has already been answered")]
    AlreadyAnswered(QuestionId),

    #[error("Another clue is already open")]
    ClueAlreadyOpen,

    #[error("No clue is open")]
    NoActiveClue,

    #[error("A game needs between {min} and {max} teams")]
    RosterLimit { min: usize, max: usize },

    #[error("Team name cannot be empty")]
    EmptyTeamName,

    #[error("{0} questions are still on the board")]
    BoardIncomplete(usize),

    #[error("No board is loaded")]
    NoBoard,

    #[error("A hint was already requested for this clue")]
    HintAlreadyRequested,

    #[error("Hints are closed once the answer is revealed")]
    AnswerRevealed,

    #[error("Final round cannot move from {from:?} to {to:?}")]
    InvalidFinalStep { from: FinalStep, to: FinalStep },

    #[error("Cannot {action} while the final round is at {step:?}")]
    WrongFinalStep {
        action: &'static str,
        step: FinalStep,
    },

    #[error("Final round has not started")]
    NoFinalRound,
}

impl StateError {
    /// Stable machine-readable code sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            StateError::WrongPhase { .. } => "WRONG_PHASE",
            StateError::InvalidTransition { .. } => "INVALID_TRANSITION",
            StateError::TeamNotFound(_) => "TEAM_NOT_FOUND",
            StateError::QuestionNotFound(_) => "QUESTION_NOT_FOUND",
            StateError::AlreadyAnswered(_) => "ALREADY_ANSWERED",
            StateError::ClueAlreadyOpen => "CLUE_ALREADY_OPEN",
            StateError::NoActiveClue => "NO_ACTIVE_CLUE",
            StateError::RosterLimit { .. } => "ROSTER_LIMIT",
            StateError::EmptyTeamName => "EMPTY_TEAM_NAME",
            StateError::BoardIncomplete(_) => "BOARD_INCOMPLETE",
            StateError::NoBoard => "NO_BOARD",
            StateError::HintAlreadyRequested => "HINT_ALREADY_REQUESTED",
            StateError::AnswerRevealed => "ANSWER_REVEALED",
            StateError::InvalidFinalStep { .. } => "INVALID_FINAL_STEP",
            StateError::WrongFinalStep { .. } => "WRONG_FINAL_STEP",
            StateError::NoFinalRound => "NO_FINAL_ROUND",
        }
    }
}
