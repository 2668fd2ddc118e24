use crate::timer::Countdown;
use crate::types::*;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    // Setup
    SetTopic {
        topic: String,
    },
    AddTeam,
    RemoveTeam {
        team_id: TeamId,
    },
    RenameTeam {
        team_id: TeamId,
        name: String,
    },
    StartGame,

    // Board and clue modal
    OpenClue {
        question_id: QuestionId,
    },
    RevealAnswer,
    RequestHint,
    RereadClue,
    /// Give the open clue's value to a team and close the modal
    AwardPoints {
        team_id: TeamId,
    },
    /// Close the open clue without changing any score
    NoWinner,
    /// Scoreboard +/- control
    AdjustScore {
        team_id: TeamId,
        direction: ScoreDirection,
    },
    EnterFinalRound,

    // Final round
    FinalRevealClue,
    FinalRevealAnswer,
    FinalBeginScoring,
    FinalRereadClue,
    /// Raw text from the wager field; anything non-numeric counts as zero
    SetWager {
        team_id: TeamId,
        amount: String,
    },
    MarkCorrect {
        team_id: TeamId,
    },
    MarkIncorrect {
        team_id: TeamId,
    },
    FinishGame,

    // Game over
    Restart,

    GetState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        server_now: String,
        snapshot: Box<GameSnapshot>,
    },
    Phase {
        phase: GamePhase,
        server_now: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<NoticeInfo>,
    },
    Setup {
        topic: String,
        teams: Vec<Team>,
    },
    Board {
        board: BoardView,
    },
    Teams {
        teams: Vec<Team>,
    },
    Clue {
        clue: ClueView,
    },
    ClueClosed {
        question_id: QuestionId,
        awarded_to: Option<TeamId>,
        points: i64,
        all_answered: bool,
        teams: Vec<Team>,
    },
    Countdown {
        presenter: Presenter,
        remaining: u32,
        running: bool,
    },
    Hint {
        question_id: QuestionId,
        text: String,
    },
    Narration {
        presenter: Presenter,
        speaking: bool,
    },
    FinalRound {
        round: FinalRoundView,
    },
    Wager {
        team_id: TeamId,
        amount: u32,
        teams: Vec<Team>,
    },
    GameOver {
        winner: Option<Team>,
        standings: Vec<Team>,
    },
    Snapshot {
        snapshot: Box<GameSnapshot>,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Fallback notice with its display text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoticeInfo {
    pub kind: BoardNotice,
    pub message: String,
}

impl From<BoardNotice> for NoticeInfo {
    fn from(kind: BoardNotice) -> Self {
        Self {
            kind,
            message: kind.message().to_string(),
        }
    }
}

/// Board as the players see it: values and answered flags, no clue text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub categories: Vec<CategoryView>,
    pub all_answered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryView {
    pub id: CategoryId,
    pub title: String,
    pub questions: Vec<TileView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileView {
    pub id: QuestionId,
    pub value: u32,
    pub is_answered: bool,
}

impl From<&GameData> for BoardView {
    fn from(data: &GameData) -> Self {
        Self {
            categories: data
                .categories
                .iter()
                .map(|c| CategoryView {
                    id: c.id.clone(),
                    title: c.title.clone(),
                    questions: c
                        .questions
                        .iter()
                        .map(|q| TileView {
                            id: q.id.clone(),
                            value: q.value,
                            is_answered: q.is_answered,
                        })
                        .collect(),
                })
                .collect(),
            all_answered: data.all_answered(),
        }
    }
}

/// The open clue modal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClueView {
    pub question_id: QuestionId,
    pub category: String,
    pub value: u32,
    pub clue: String,
    /// Present once revealed
    pub answer: Option<String>,
    pub countdown: Countdown,
    /// Hidden again once the answer is revealed
    pub hint: Option<String>,
    pub hint_pending: bool,
    pub can_request_hint: bool,
    pub speaking: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerView {
    pub team_id: TeamId,
    pub amount: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalRoundView {
    pub step: FinalStep,
    pub category: String,
    /// Present from the clue step on
    pub clue: Option<String>,
    /// Present from the answer step on
    pub answer: Option<String>,
    pub countdown: Countdown,
    pub wagers: Vec<WagerView>,
    pub speaking: bool,
}

/// Everything a freshly attached front end needs to draw the current view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game: Game,
    pub teams: Vec<Team>,
    pub board: Option<BoardView>,
    pub clue: Option<ClueView>,
    pub final_round: Option<FinalRoundView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_tagging() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"t":"set_wager","team_id":2,"amount":"500"}"#).unwrap();
        match msg {
            ClientMessage::SetWager { team_id, amount } => {
                assert_eq!(team_id, 2);
                assert_eq!(amount, "500");
            }
            other => panic!("unexpected message {:?}", other),
        }

        let msg: ClientMessage =
            serde_json::from_str(r#"{"t":"adjust_score","team_id":1,"direction":"down"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::AdjustScore {
                team_id: 1,
                direction: ScoreDirection::Down
            }
        ));
    }

    #[test]
    fn test_board_view_hides_clues() {
        let data = crate::board::fallback_board();
        let view = BoardView::from(&data);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("Rudolph"));
        assert!(json.contains("Christmas Carols"));
        assert!(!view.all_answered);
    }

    #[test]
    fn test_error_serialization() {
        let msg = ServerMessage::Error {
            code: "WRONG_PHASE".to_string(),
            msg: "nope".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"t\":\"error\""));
    }
}
