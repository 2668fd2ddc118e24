//! Command dispatch
//!
//! Every command gets a direct reply: the updated view on success or an
//! `Error` on rejection. Effects that finish later (board load, countdown
//! ticks, hints, narration) reach the front end as broadcasts instead.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, ClosedClue, StateError};
use crate::types::GamePhase;

fn error_message(e: StateError) -> ServerMessage {
    tracing::warn!("Command rejected: {}", e);
    ServerMessage::Error {
        code: e.code().to_string(),
        msg: e.to_string(),
    }
}

async fn setup_message(state: &AppState) -> ServerMessage {
    ServerMessage::Setup {
        topic: state.get_game().await.topic,
        teams: state.get_teams().await,
    }
}

fn clue_closed_message(closed: ClosedClue) -> ServerMessage {
    ServerMessage::ClueClosed {
        question_id: closed.question_id,
        awarded_to: closed.awarded_to,
        points: closed.points,
        all_answered: closed.all_answered,
        teams: closed.teams,
    }
}

/// Handle a client message and return the reply
pub async fn handle_message(msg: ClientMessage, state: &AppState) -> Option<ServerMessage> {
    match msg {
        // Setup
        ClientMessage::SetTopic { topic } => match state.set_topic(topic).await {
            Ok(_) => Some(setup_message(state).await),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::AddTeam => match state.add_team().await {
            Ok(_) => Some(setup_message(state).await),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::RemoveTeam { team_id } => match state.remove_team(team_id).await {
            Ok(_) => Some(setup_message(state).await),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::RenameTeam { team_id, name } => {
            match state.rename_team(team_id, name).await {
                Ok(_) => Some(setup_message(state).await),
                Err(e) => Some(error_message(e)),
            }
        }

        ClientMessage::StartGame => handle_start_game(state).await,

        // Board and clue modal
        ClientMessage::OpenClue { question_id } => match state.open_clue(&question_id).await {
            Ok(clue) => Some(ServerMessage::Clue { clue }),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::RevealAnswer => match state.reveal_answer().await {
            Ok(clue) => Some(ServerMessage::Clue { clue }),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::RequestHint => match state.request_hint().await {
            Ok(clue) => Some(ServerMessage::Clue { clue }),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::RereadClue => match state.reread_clue().await {
            Ok(clue) => Some(ServerMessage::Clue { clue }),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::AwardPoints { team_id } => match state.award_points(team_id).await {
            Ok(closed) => Some(clue_closed_message(closed)),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::NoWinner => match state.no_winner().await {
            Ok(closed) => Some(clue_closed_message(closed)),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::AdjustScore { team_id, direction } => {
            match state.adjust_score(team_id, direction).await {
                Ok(_) => Some(ServerMessage::Teams {
                    teams: state.get_teams().await,
                }),
                Err(e) => Some(error_message(e)),
            }
        }

        ClientMessage::EnterFinalRound => match state.enter_final_round().await {
            Ok(round) => Some(ServerMessage::FinalRound { round }),
            Err(e) => Some(error_message(e)),
        },

        // Final round
        ClientMessage::FinalRevealClue => match state.final_reveal_clue().await {
            Ok(round) => Some(ServerMessage::FinalRound { round }),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::FinalRevealAnswer => match state.final_reveal_answer().await {
            Ok(round) => Some(ServerMessage::FinalRound { round }),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::FinalBeginScoring => match state.final_begin_scoring().await {
            Ok(round) => Some(ServerMessage::FinalRound { round }),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::FinalRereadClue => match state.final_reread_clue().await {
            Ok(round) => Some(ServerMessage::FinalRound { round }),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::SetWager { team_id, amount } => {
            match state.set_wager(team_id, &amount).await {
                Ok(amount) => Some(ServerMessage::Wager {
                    team_id,
                    amount,
                    teams: state.get_teams().await,
                }),
                Err(e) => Some(error_message(e)),
            }
        }

        ClientMessage::MarkCorrect { team_id } => handle_resolve_wager(state, team_id, true).await,

        ClientMessage::MarkIncorrect { team_id } => {
            handle_resolve_wager(state, team_id, false).await
        }

        ClientMessage::FinishGame => match state.finish_game().await {
            Ok((winner, standings)) => Some(ServerMessage::GameOver { winner, standings }),
            Err(e) => Some(error_message(e)),
        },

        // Game over
        ClientMessage::Restart => match state.restart().await {
            Ok(()) => Some(ServerMessage::Snapshot {
                snapshot: Box::new(state.snapshot().await),
            }),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::GetState => Some(ServerMessage::Snapshot {
            snapshot: Box::new(state.snapshot().await),
        }),
    }
}

/// Leave setup right away and build the board in the background.
/// `Phase` and `Board` are broadcast once it is ready.
async fn handle_start_game(state: &AppState) -> Option<ServerMessage> {
    let topic = match state.begin_loading().await {
        Ok(topic) => topic,
        Err(e) => return Some(error_message(e)),
    };

    let loader = state.clone();
    tokio::spawn(async move {
        if let Err(e) = loader.load_board(&topic).await {
            tracing::warn!("Board for \"{}\" was not installed: {}", topic, e);
        }
    });

    Some(ServerMessage::Phase {
        phase: GamePhase::Loading,
        server_now: chrono::Utc::now().to_rfc3339(),
        notice: None,
    })
}

async fn handle_resolve_wager(
    state: &AppState,
    team_id: crate::types::TeamId,
    correct: bool,
) -> Option<ServerMessage> {
    match state.resolve_wager(team_id, correct).await {
        Ok(_) => Some(ServerMessage::Wager {
            team_id,
            amount: 0,
            teams: state.get_teams().await,
        }),
        Err(e) => Some(error_message(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wrong_phase_is_reported() {
        let state = AppState::new();

        let result = handle_message(ClientMessage::RevealAnswer, &state).await;
        match result {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "WRONG_PHASE"),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_start_game_replies_loading_then_broadcasts_board() {
        let state = AppState::new();
        let mut rx = state.broadcast.subscribe();

        let reply = handle_message(ClientMessage::StartGame, &state).await;
        assert!(matches!(
            reply,
            Some(ServerMessage::Phase {
                phase: GamePhase::Loading,
                ..
            })
        ));

        assert!(matches!(
            rx.recv().await.unwrap(),
            ServerMessage::Phase {
                phase: GamePhase::Playing,
                ..
            }
        ));
        assert!(matches!(rx.recv().await.unwrap(), ServerMessage::Board { .. }));

        let again = handle_message(ClientMessage::StartGame, &state).await;
        assert!(matches!(again, Some(ServerMessage::Error { .. })));
    }

    #[tokio::test]
    async fn test_setup_replies_with_roster() {
        let state = AppState::new();

        let reply = handle_message(
            ClientMessage::RenameTeam {
                team_id: 2,
                name: "Snowmen".to_string(),
            },
            &state,
        )
        .await;

        match reply {
            Some(ServerMessage::Setup { teams, .. }) => assert_eq!(teams[1].name, "Snowmen"),
            other => panic!("unexpected reply {:?}", other),
        }
    }
}
