mod clue;
mod error;
mod final_round;
mod game;
mod team;

use crate::llm::{LlmConfig, LlmProvider};
use crate::narrator::{AudioSink, Narrator, PacedSink, SpeechSlot};
use crate::protocol::{BoardView, GameSnapshot, ServerMessage};
use crate::types::*;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

pub use clue::{ActiveClue, ClosedClue, HintState};
pub use error::StateError;
pub use final_round::{parse_wager, FinalRound};
pub use team::rank_teams;

/// Shared application state
///
/// Locks are always taken in field order (game, board, teams, active_clue,
/// final_round) so that no two commands can deadlock each other.
#[derive(Clone)]
pub struct AppState {
    pub game: Arc<RwLock<Game>>,
    pub board: Arc<RwLock<Option<GameData>>>,
    pub teams: Arc<RwLock<Vec<Team>>>,
    /// The clue modal, if one is open
    pub active_clue: Arc<RwLock<Option<ActiveClue>>>,
    pub final_round: Arc<RwLock<Option<FinalRound>>>,
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub llm_config: LlmConfig,
    pub narrator: Narrator,
    /// Asynchronous effects (board loaded, countdown ticks, hints, narration)
    pub broadcast: broadcast::Sender<ServerMessage>,
}

fn new_game(config: GameConfig) -> Game {
    Game {
        id: ulid::Ulid::new().to_string(),
        version: 1,
        phase: GamePhase::Setup,
        topic: config.default_topic.clone(),
        config,
        notice: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::new_with_llm(None, LlmConfig::default(), GameConfig::default())
    }

    pub fn new_with_llm(
        llm: Option<Arc<dyn LlmProvider>>,
        llm_config: LlmConfig,
        config: GameConfig,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        let narrator = Narrator::new(llm.clone(), Arc::new(PacedSink), llm_config.request_timeout);
        Self {
            game: Arc::new(RwLock::new(new_game(config))),
            board: Arc::new(RwLock::new(None)),
            teams: Arc::new(RwLock::new(default_teams())),
            active_clue: Arc::new(RwLock::new(None)),
            final_round: Arc::new(RwLock::new(None)),
            llm,
            llm_config,
            narrator,
            broadcast: tx,
        }
    }

    /// Route narration to a different audio sink
    pub fn with_audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.narrator = Narrator::new(self.llm.clone(), sink, self.llm_config.request_timeout);
        self
    }

    /// Broadcast a message to every subscriber
    pub fn broadcast_to_all(&self, msg: ServerMessage) {
        // No subscribers is fine; nobody is watching yet
        let _ = self.broadcast.send(msg);
    }

    /// Read `text` aloud for a presenter unless that presenter is already speaking.
    /// Returns whether narration started.
    pub(crate) fn narrate(&self, presenter: Presenter, slot: &SpeechSlot, text: String) -> bool {
        let Some(handle) = self.narrator.speak(slot, text) else {
            return false;
        };

        self.broadcast_to_all(ServerMessage::Narration {
            presenter,
            speaking: true,
        });

        let tx = self.broadcast.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                tracing::warn!("Narration task ended abnormally: {}", e);
            }
            let _ = tx.send(ServerMessage::Narration {
                presenter,
                speaking: false,
            });
        });
        true
    }

    /// Everything needed to redraw the current view
    pub async fn snapshot(&self) -> GameSnapshot {
        let game = self.game.read().await.clone();
        let board = self.board.read().await.as_ref().map(BoardView::from);
        let teams = self.teams.read().await.clone();
        let clue = self.active_clue.read().await.as_ref().map(ActiveClue::view);
        let final_round = self.final_round.read().await.as_ref().map(FinalRound::view);

        GameSnapshot {
            game,
            teams,
            board,
            clue,
            final_round,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
