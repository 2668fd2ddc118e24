use super::{AppState, FinalRound, StateError};
use crate::board::generate_board;
use crate::protocol::{BoardView, FinalRoundView, NoticeInfo, ServerMessage};
use crate::types::*;

impl AppState {
    /// Get current game
    pub async fn get_game(&self) -> Game {
        self.game.read().await.clone()
    }

    pub async fn phase(&self) -> GamePhase {
        self.game.read().await.phase
    }

    /// Check if a phase transition is valid
    pub fn is_valid_phase_transition(from: GamePhase, to: GamePhase) -> bool {
        use GamePhase::*;

        matches!(
            (from, to),
            (Setup, Loading)
                | (Loading, Playing)
                | (Playing, FinalRound)
                | (FinalRound, GameOver)
                | (GameOver, Setup)
        )
    }

    /// Move `game` to `to`, bumping its version
    pub(crate) fn transition_phase(game: &mut Game, to: GamePhase) -> Result<(), StateError> {
        if !Self::is_valid_phase_transition(game.phase, to) {
            return Err(StateError::InvalidTransition {
                from: game.phase,
                to,
            });
        }

        tracing::info!("Game phase {:?} -> {:?}", game.phase, to);
        game.phase = to;
        game.version += 1;
        Ok(())
    }

    pub(crate) fn require_phase(
        game: &Game,
        action: &'static str,
        allowed: &[GamePhase],
    ) -> Result<(), StateError> {
        if allowed.contains(&game.phase) {
            Ok(())
        } else {
            Err(StateError::WrongPhase {
                action,
                phase: game.phase,
            })
        }
    }

    /// Replace the topic text; only during setup
    pub async fn set_topic(&self, topic: String) -> Result<String, StateError> {
        let mut game = self.game.write().await;
        Self::require_phase(&game, "change the topic", &[GamePhase::Setup])?;

        game.topic = topic;
        game.version += 1;
        Ok(game.topic.clone())
    }

    /// Leave setup and return the topic the board will be generated for.
    /// A blank topic falls back to the configured default.
    pub async fn begin_loading(&self) -> Result<String, StateError> {
        let mut game = self.game.write().await;
        Self::require_phase(&game, "start the game", &[GamePhase::Setup])?;

        let topic = match game.topic.trim() {
            "" => game.config.default_topic.clone(),
            trimmed => trimmed.to_string(),
        };

        Self::transition_phase(&mut game, GamePhase::Loading)?;
        game.topic = topic.clone();
        game.notice = None;

        tracing::info!("Loading board for topic \"{}\"", topic);
        Ok(topic)
    }

    /// Generate (or fall back to) a board and start play.
    /// Board generation never fails, so this always ends in Playing unless the
    /// game left Loading in the meantime.
    pub async fn load_board(&self, topic: &str) -> Result<BoardView, StateError> {
        let outcome = generate_board(
            self.llm.as_deref(),
            topic,
            self.llm_config.board_thinking_budget,
            self.llm_config.request_timeout,
        )
        .await;

        let mut game = self.game.write().await;
        if game.phase != GamePhase::Loading {
            tracing::debug!("Discarding board for \"{}\", game is {:?}", topic, game.phase);
            return Err(StateError::WrongPhase {
                action: "install a board",
                phase: game.phase,
            });
        }

        let view = BoardView::from(&outcome.data);
        *self.board.write().await = Some(outcome.data);
        Self::transition_phase(&mut game, GamePhase::Playing)?;
        game.notice = outcome.notice;

        if let Some(notice) = outcome.notice {
            tracing::warn!("{}", notice.message());
        }

        self.broadcast_to_all(ServerMessage::Phase {
            phase: game.phase,
            server_now: chrono::Utc::now().to_rfc3339(),
            notice: outcome.notice.map(NoticeInfo::from),
        });
        self.broadcast_to_all(ServerMessage::Board {
            board: view.clone(),
        });

        Ok(view)
    }

    /// Setup -> Loading -> Playing in one call
    pub async fn start_game(&self) -> Result<BoardView, StateError> {
        let topic = self.begin_loading().await?;
        self.load_board(&topic).await
    }

    /// Offered only once the board is cleared and no clue is open
    pub async fn enter_final_round(&self) -> Result<FinalRoundView, StateError> {
        let mut game = self.game.write().await;
        Self::require_phase(&game, "enter the final round", &[GamePhase::Playing])?;

        let board = self.board.read().await;
        let board = board.as_ref().ok_or(StateError::NoBoard)?;
        if !board.all_answered() {
            return Err(StateError::BoardIncomplete(board.remaining_questions()));
        }

        if self.active_clue.read().await.is_some() {
            return Err(StateError::ClueAlreadyOpen);
        }

        Self::transition_phase(&mut game, GamePhase::FinalRound)?;

        let round = FinalRound::new(board.final_clue.clone(), game.config.final_round_seconds);
        let view = round.view();
        *self.final_round.write().await = Some(round);

        Ok(view)
    }

    /// End the game from the scoring step, whether or not every wager was settled.
    /// Returns the winner (first of the top scorers) and the full standings.
    pub async fn finish_game(&self) -> Result<(Option<Team>, Vec<Team>), StateError> {
        let mut game = self.game.write().await;
        Self::require_phase(&game, "finish the game", &[GamePhase::FinalRound])?;

        let teams = self.teams.read().await;
        let mut final_round = self.final_round.write().await;
        let round = final_round.as_ref().ok_or(StateError::NoFinalRound)?;
        if round.step != FinalStep::Scoring {
            return Err(StateError::WrongFinalStep {
                action: "finish the game",
                step: round.step,
            });
        }

        let unresolved = round.wagers.values().filter(|amount| **amount > 0).count();
        if unresolved > 0 {
            tracing::info!("Finishing with {} unresolved wagers", unresolved);
        }

        Self::transition_phase(&mut game, GamePhase::GameOver)?;
        *final_round = None;

        let standings = super::rank_teams(&teams);
        let winner = standings.first().cloned();
        match &winner {
            Some(team) => tracing::info!("Game over, {} wins with {}", team.name, team.score),
            None => tracing::info!("Game over without teams"),
        }

        Ok((winner, standings))
    }

    /// Back to a fresh setup: default teams, default topic, no board
    pub async fn restart(&self) -> Result<(), StateError> {
        let mut game = self.game.write().await;
        Self::require_phase(&game, "restart", &[GamePhase::GameOver])?;
        Self::transition_phase(&mut game, GamePhase::Setup)?;

        *game = super::new_game(game.config.clone());
        *self.board.write().await = None;
        *self.teams.write().await = default_teams();
        *self.active_clue.write().await = None;
        *self.final_round.write().await = None;

        tracing::info!("Game reset to setup");
        Ok(())
    }
}
