use super::{team::apply_score_delta, AppState, StateError};
use crate::narrator::SpeechSlot;
use crate::protocol::{FinalRoundView, ServerMessage, WagerView};
use crate::timer::{Countdown, Ticker};
use crate::types::*;
use std::collections::BTreeMap;
use std::time::Duration;

/// Read a wager typed into a free-text field.
/// Leading digits count; anything else (including a minus sign) is zero.
pub fn parse_wager(raw: &str) -> u32 {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(u32::MAX)
}

/// The final round: category, clue, answer, scoring. Never goes backwards.
#[derive(Debug)]
pub struct FinalRound {
    pub clue: FinalClue,
    pub step: FinalStep,
    pub countdown: Countdown,
    /// Pending wager per team; zero once applied
    pub wagers: BTreeMap<TeamId, u32>,
    speech: SpeechSlot,
    ticker: Option<Ticker>,
}

impl FinalRound {
    pub fn new(clue: FinalClue, seconds: u32) -> Self {
        Self {
            clue,
            step: FinalStep::Category,
            countdown: Countdown::idle(seconds),
            wagers: BTreeMap::new(),
            speech: SpeechSlot::new(),
            ticker: None,
        }
    }

    fn advance(&mut self, to: FinalStep) -> Result<(), StateError> {
        if self.step.next() != Some(to) {
            return Err(StateError::InvalidFinalStep {
                from: self.step,
                to,
            });
        }
        tracing::info!("Final round {:?} -> {:?}", self.step, to);
        self.step = to;
        Ok(())
    }

    fn require_step(&self, action: &'static str, step: FinalStep) -> Result<(), StateError> {
        if self.step == step {
            Ok(())
        } else {
            Err(StateError::WrongFinalStep {
                action,
                step: self.step,
            })
        }
    }

    pub fn wager(&self, team_id: TeamId) -> u32 {
        self.wagers.get(&team_id).copied().unwrap_or(0)
    }

    pub fn view(&self) -> FinalRoundView {
        FinalRoundView {
            step: self.step,
            category: self.clue.category.clone(),
            clue: (self.step >= FinalStep::Clue).then(|| self.clue.clue.clone()),
            answer: (self.step >= FinalStep::Answer).then(|| self.clue.answer.clone()),
            countdown: self.countdown,
            wagers: self
                .wagers
                .iter()
                .map(|(team_id, amount)| WagerView {
                    team_id: *team_id,
                    amount: *amount,
                })
                .collect(),
            speaking: self.speech.is_busy(),
        }
    }
}

impl AppState {
    pub async fn get_final_round(&self) -> Option<FinalRoundView> {
        self.final_round.read().await.as_ref().map(FinalRound::view)
    }

    /// Category -> Clue: fresh countdown and one narration of the clue
    pub async fn final_reveal_clue(&self) -> Result<FinalRoundView, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "reveal the final clue", &[GamePhase::FinalRound])?;

        let mut final_round = self.final_round.write().await;
        let round = final_round.as_mut().ok_or(StateError::NoFinalRound)?;
        round.advance(FinalStep::Clue)?;

        round.countdown = Countdown::started(game.config.final_round_seconds);
        round.ticker = Some(self.spawn_final_ticker());
        self.narrate(Presenter::FinalRound, &round.speech, round.clue.clue.clone());

        Ok(round.view())
    }

    fn spawn_final_ticker(&self) -> Ticker {
        let state = self.clone();
        Ticker::spawn(Duration::from_secs(1), move || {
            let state = state.clone();
            async move {
                let mut final_round = state.final_round.write().await;
                let Some(round) = final_round.as_mut() else {
                    return false;
                };

                if round.countdown.tick() {
                    state.broadcast_to_all(ServerMessage::Countdown {
                        presenter: Presenter::FinalRound,
                        remaining: round.countdown.remaining(),
                        running: round.countdown.is_running(),
                    });
                }
                round.countdown.is_running()
            }
        })
    }

    /// Clue -> Answer: stops the countdown
    pub async fn final_reveal_answer(&self) -> Result<FinalRoundView, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "reveal the final answer", &[GamePhase::FinalRound])?;

        let mut final_round = self.final_round.write().await;
        let round = final_round.as_mut().ok_or(StateError::NoFinalRound)?;
        round.advance(FinalStep::Answer)?;

        round.countdown.stop();
        round.ticker = None;

        Ok(round.view())
    }

    /// Answer -> Scoring
    pub async fn final_begin_scoring(&self) -> Result<FinalRoundView, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "start final scoring", &[GamePhase::FinalRound])?;

        let mut final_round = self.final_round.write().await;
        let round = final_round.as_mut().ok_or(StateError::NoFinalRound)?;
        round.advance(FinalStep::Scoring)?;

        Ok(round.view())
    }

    /// Read the final clue again, only while it is on screen
    pub async fn final_reread_clue(&self) -> Result<FinalRoundView, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "re-read the final clue", &[GamePhase::FinalRound])?;

        let final_round = self.final_round.read().await;
        let round = final_round.as_ref().ok_or(StateError::NoFinalRound)?;
        round.require_step("re-read the final clue", FinalStep::Clue)?;

        if !self.narrate(Presenter::FinalRound, &round.speech, round.clue.clue.clone()) {
            tracing::debug!("Final clue is still being read");
        }

        Ok(round.view())
    }

    /// Record a team's wager from raw text; returns the amount stored
    pub async fn set_wager(&self, team_id: TeamId, raw: &str) -> Result<u32, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "place a wager", &[GamePhase::FinalRound])?;

        let teams = self.teams.read().await;
        if !teams.iter().any(|t| t.id == team_id) {
            return Err(StateError::TeamNotFound(team_id));
        }

        let mut final_round = self.final_round.write().await;
        let round = final_round.as_mut().ok_or(StateError::NoFinalRound)?;
        round.require_step("place a wager", FinalStep::Scoring)?;

        let amount = parse_wager(raw);
        round.wagers.insert(team_id, amount);
        tracing::debug!("Team {} wagers {}", team_id, amount);

        Ok(amount)
    }

    /// Apply a team's wager (added if correct, subtracted if not) and reset it to zero
    pub async fn resolve_wager(&self, team_id: TeamId, correct: bool) -> Result<Team, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "score a wager", &[GamePhase::FinalRound])?;

        let mut teams = self.teams.write().await;
        if !teams.iter().any(|t| t.id == team_id) {
            return Err(StateError::TeamNotFound(team_id));
        }

        let mut final_round = self.final_round.write().await;
        let round = final_round.as_mut().ok_or(StateError::NoFinalRound)?;
        round.require_step("score a wager", FinalStep::Scoring)?;

        let amount = i64::from(round.wager(team_id));
        round.wagers.insert(team_id, 0);

        let delta = if correct { amount } else { -amount };
        let team = apply_score_delta(&mut teams, team_id, delta)?;
        tracing::info!(
            "{} {} their wager of {}",
            team.name,
            if correct { "won" } else { "lost" },
            amount
        );

        Ok(team)
    }
}
