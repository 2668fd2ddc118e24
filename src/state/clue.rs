//! Clue modal: countdown, narration, hint and award

use super::{team::apply_score_delta, AppState, StateError};
use crate::llm::generate_hint;
use crate::narrator::SpeechSlot;
use crate::protocol::{ClueView, ServerMessage};
use crate::timer::{Countdown, Ticker};
use crate::types::*;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintState {
    NotRequested,
    Pending,
    Ready(String),
}

/// The open clue modal. Dropping it cancels its countdown.
#[derive(Debug)]
pub struct ActiveClue {
    pub question: Question,
    pub category: String,
    pub countdown: Countdown,
    pub revealed: bool,
    pub hint: HintState,
    speech: SpeechSlot,
    ticker: Option<Ticker>,
}

impl ActiveClue {
    fn new(question: Question, category: String, seconds: u32) -> Self {
        Self {
            question,
            category,
            countdown: Countdown::started(seconds),
            revealed: false,
            hint: HintState::NotRequested,
            speech: SpeechSlot::new(),
            ticker: None,
        }
    }

    /// At most one hint per modal, and none after the reveal
    pub fn can_request_hint(&self) -> bool {
        !self.revealed && self.hint == HintState::NotRequested
    }

    pub fn view(&self) -> ClueView {
        let hint = match (&self.hint, self.revealed) {
            (HintState::Ready(text), false) => Some(text.clone()),
            _ => None,
        };

        ClueView {
            question_id: self.question.id.clone(),
            category: self.category.clone(),
            value: self.question.value,
            clue: self.question.clue.clone(),
            answer: self.revealed.then(|| self.question.answer.clone()),
            countdown: self.countdown,
            hint,
            hint_pending: self.hint == HintState::Pending,
            can_request_hint: self.can_request_hint(),
            speaking: self.speech.is_busy(),
        }
    }
}

/// Result of closing a clue modal
#[derive(Debug, Clone)]
pub struct ClosedClue {
    pub question_id: QuestionId,
    pub awarded_to: Option<TeamId>,
    pub points: i64,
    pub all_answered: bool,
    pub teams: Vec<Team>,
}

impl AppState {
    pub async fn get_active_clue(&self) -> Option<ClueView> {
        self.active_clue.read().await.as_ref().map(ActiveClue::view)
    }

    /// Open an unanswered question: starts its countdown and reads it aloud
    pub async fn open_clue(&self, question_id: &str) -> Result<ClueView, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "open a clue", &[GamePhase::Playing])?;

        let board = self.board.read().await;
        let board = board.as_ref().ok_or(StateError::NoBoard)?;
        let (category, question) = board
            .find_question(question_id)
            .ok_or_else(|| StateError::QuestionNotFound(question_id.to_string()))?;
        if question.is_answered {
            return Err(StateError::AlreadyAnswered(question.id.clone()));
        }

        let mut active = self.active_clue.write().await;
        if active.is_some() {
            return Err(StateError::ClueAlreadyOpen);
        }

        let mut clue = ActiveClue::new(
            question.clone(),
            category.title.clone(),
            game.config.clue_seconds,
        );
        clue.ticker = Some(self.spawn_clue_ticker(question.id.clone()));
        self.narrate(Presenter::Clue, &clue.speech, question.clue.clone());

        tracing::info!(
            "Opened {} for {} ({})",
            category.title,
            question.value,
            question.id
        );

        let view = clue.view();
        *active = Some(clue);
        Ok(view)
    }

    fn spawn_clue_ticker(&self, question_id: QuestionId) -> Ticker {
        let state = self.clone();
        Ticker::spawn(Duration::from_secs(1), move || {
            let state = state.clone();
            let question_id = question_id.clone();
            async move {
                let mut active = state.active_clue.write().await;
                let Some(clue) = active.as_mut().filter(|c| c.question.id == question_id) else {
                    return false;
                };

                if clue.countdown.tick() {
                    state.broadcast_to_all(ServerMessage::Countdown {
                        presenter: Presenter::Clue,
                        remaining: clue.countdown.remaining(),
                        running: clue.countdown.is_running(),
                    });
                }
                clue.countdown.is_running()
            }
        })
    }

    /// Show the answer and freeze the countdown. Revealing twice is harmless.
    pub async fn reveal_answer(&self) -> Result<ClueView, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "reveal an answer", &[GamePhase::Playing])?;

        let mut active = self.active_clue.write().await;
        let clue = active.as_mut().ok_or(StateError::NoActiveClue)?;

        if !clue.revealed {
            clue.revealed = true;
            clue.countdown.stop();
            clue.ticker = None;
            tracing::info!(
                "Revealed answer for {} with {}s left",
                clue.question.id,
                clue.countdown.remaining()
            );
        }

        Ok(clue.view())
    }

    /// Ask for a hint in the background; the text arrives as a `Hint` broadcast
    pub async fn request_hint(&self) -> Result<ClueView, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "request a hint", &[GamePhase::Playing])?;

        let mut active = self.active_clue.write().await;
        let clue = active.as_mut().ok_or(StateError::NoActiveClue)?;
        if clue.revealed {
            return Err(StateError::AnswerRevealed);
        }
        if clue.hint != HintState::NotRequested {
            return Err(StateError::HintAlreadyRequested);
        }

        clue.hint = HintState::Pending;

        let state = self.clone();
        let question = clue.question.clone();
        tokio::spawn(async move {
            let text = generate_hint(
                state.llm.as_deref(),
                &question.clue,
                &question.answer,
                state.llm_config.request_timeout,
            )
            .await;
            state.deliver_hint(&question.id, text).await;
        });

        Ok(clue.view())
    }

    /// Store a finished hint if its clue is still the open one
    async fn deliver_hint(&self, question_id: &str, text: String) {
        let mut active = self.active_clue.write().await;
        let Some(clue) = active
            .as_mut()
            .filter(|c| c.question.id == question_id && c.hint == HintState::Pending)
        else {
            tracing::debug!("Dropping hint for {}, clue is no longer open", question_id);
            return;
        };

        clue.hint = HintState::Ready(text.clone());
        if clue.revealed {
            tracing::debug!("Hint for {} arrived after the reveal", question_id);
            return;
        }

        self.broadcast_to_all(ServerMessage::Hint {
            question_id: question_id.to_string(),
            text,
        });
    }

    /// Read the open clue again unless it is still being read
    pub async fn reread_clue(&self) -> Result<ClueView, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "re-read a clue", &[GamePhase::Playing])?;

        let active = self.active_clue.read().await;
        let clue = active.as_ref().ok_or(StateError::NoActiveClue)?;
        if !self.narrate(Presenter::Clue, &clue.speech, clue.question.clue.clone()) {
            tracing::debug!("Clue {} is still being read", clue.question.id);
        }

        Ok(clue.view())
    }

    /// Give the open clue's full value to a team and close it
    pub async fn award_points(&self, team_id: TeamId) -> Result<ClosedClue, StateError> {
        self.close_clue(Some(team_id)).await
    }

    /// Close the open clue with no score change
    pub async fn no_winner(&self) -> Result<ClosedClue, StateError> {
        self.close_clue(None).await
    }

    /// Close the modal, marking its question answered for good
    async fn close_clue(&self, awarded_to: Option<TeamId>) -> Result<ClosedClue, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "close a clue", &[GamePhase::Playing])?;

        let mut board = self.board.write().await;
        let board = board.as_mut().ok_or(StateError::NoBoard)?;
        let mut teams = self.teams.write().await;
        let mut active = self.active_clue.write().await;

        let clue = active.as_ref().ok_or(StateError::NoActiveClue)?;
        let question_id = clue.question.id.clone();
        let value = i64::from(clue.question.value);

        if let Some(team_id) = awarded_to {
            if !teams.iter().any(|t| t.id == team_id) {
                return Err(StateError::TeamNotFound(team_id));
            }
        }

        board
            .find_question_mut(&question_id)
            .ok_or_else(|| StateError::QuestionNotFound(question_id.clone()))?
            .mark_answered();

        let points = match awarded_to {
            Some(team_id) => {
                apply_score_delta(&mut teams, team_id, value)?;
                value
            }
            None => 0,
        };

        // Dropping the modal stops its ticker
        *active = None;

        let all_answered = board.all_answered();
        tracing::info!(
            "Closed {} (awarded to {:?}, {} left)",
            question_id,
            awarded_to,
            board.remaining_questions()
        );

        Ok(ClosedClue {
            question_id,
            awarded_to,
            points,
            all_answered,
            teams: teams.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::HINT_FALLBACK;
    use crate::state::test_support::*;

    fn short_clock() -> GameConfig {
        GameConfig {
            clue_seconds: 3,
            ..GameConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_runs_to_zero_and_stops() {
        let state = playing_state(short_clock()).await;
        let id = question_id(&state, 400).await;

        let view = state.open_clue(&id).await.unwrap();
        assert_eq!(view.value, 400);
        assert_eq!(view.countdown.remaining(), 3);
        assert!(view.answer.is_none());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let view = state.get_active_clue().await.unwrap();
        assert_eq!(view.countdown.remaining(), 0);
        assert!(!view.countdown.is_running());
        // expiry does not close the modal
        assert!(view.answer.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_freezes_countdown() {
        let state = playing_state(GameConfig::default()).await;
        let id = question_id(&state, 200).await;
        state.open_clue(&id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let view = state.reveal_answer().await.unwrap();
        assert_eq!(view.countdown.remaining(), 28);
        assert_eq!(view.answer.as_deref(), Some("Who is Rudolph?"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let view = state.reveal_answer().await.unwrap();
        assert_eq!(view.countdown.remaining(), 28);
    }

    #[tokio::test]
    async fn test_only_one_clue_at_a_time() {
        let state = playing_state(GameConfig::default()).await;
        let first = question_id(&state, 200).await;
        let second = question_id(&state, 400).await;

        state.open_clue(&first).await.unwrap();
        assert_eq!(
            state.open_clue(&second).await.unwrap_err(),
            StateError::ClueAlreadyOpen
        );
        assert!(matches!(
            state.open_clue("nope").await,
            Err(StateError::QuestionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_award_points_marks_answered() {
        let state = playing_state(GameConfig::default()).await;
        let id = question_id(&state, 600).await;
        state.open_clue(&id).await.unwrap();

        // unknown team leaves the modal open
        assert_eq!(
            state.award_points(7).await.unwrap_err(),
            StateError::TeamNotFound(7)
        );
        assert!(state.get_active_clue().await.is_some());

        let closed = state.award_points(2).await.unwrap();
        assert_eq!(closed.points, 600);
        assert_eq!(closed.awarded_to, Some(2));
        assert!(!closed.all_answered);
        assert_eq!(closed.teams[1].score, 600);
        assert!(state.get_active_clue().await.is_none());

        assert_eq!(
            state.open_clue(&id).await.unwrap_err(),
            StateError::AlreadyAnswered(id.clone())
        );
    }

    #[tokio::test]
    async fn test_no_winner_changes_no_score() {
        let state = playing_state(GameConfig::default()).await;
        let id = question_id(&state, 1000).await;
        state.open_clue(&id).await.unwrap();

        let closed = state.no_winner().await.unwrap();
        assert_eq!(closed.points, 0);
        assert!(closed.teams.iter().all(|t| t.score == 0));

        let board = state.board.read().await;
        let (_, question) = board.as_ref().unwrap().find_question(&id).unwrap();
        assert!(question.is_answered);
    }

    #[tokio::test]
    async fn test_hint_once_per_clue() {
        let state = playing_state(GameConfig::default()).await;
        let mut rx = state.broadcast.subscribe();
        let id = question_id(&state, 200).await;
        state.open_clue(&id).await.unwrap();

        let view = state.request_hint().await.unwrap();
        assert!(view.hint_pending);
        assert!(!view.can_request_hint);
        assert_eq!(
            state.request_hint().await.unwrap_err(),
            StateError::HintAlreadyRequested
        );

        // without a provider the fallback text arrives
        loop {
            if let ServerMessage::Hint { question_id, text } = rx.recv().await.unwrap() {
                assert_eq!(question_id, id);
                assert_eq!(text, HINT_FALLBACK);
                break;
            }
        }

        let view = state.get_active_clue().await.unwrap();
        assert_eq!(view.hint.as_deref(), Some(HINT_FALLBACK));

        // hidden once revealed
        let view = state.reveal_answer().await.unwrap();
        assert!(view.hint.is_none());
    }

    #[tokio::test]
    async fn test_no_hint_after_reveal() {
        let state = playing_state(GameConfig::default()).await;
        let id = question_id(&state, 200).await;
        state.open_clue(&id).await.unwrap();
        state.reveal_answer().await.unwrap();

        assert_eq!(
            state.request_hint().await.unwrap_err(),
            StateError::AnswerRevealed
        );
    }

    #[tokio::test]
    async fn test_stale_hint_is_dropped() {
        let state = playing_state(GameConfig::default()).await;
        let id = question_id(&state, 200).await;
        state.open_clue(&id).await.unwrap();
        state.no_winner().await.unwrap();

        state.deliver_hint(&id, "late".to_string()).await;
        assert!(state.get_active_clue().await.is_none());
    }
}
