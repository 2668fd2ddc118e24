use super::{AppState, StateError};
use crate::types::*;

/// Teams by score, highest first. Equal scores keep roster order.
pub fn rank_teams(teams: &[Team]) -> Vec<Team> {
    let mut ranked = teams.to_vec();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

impl AppState {
    pub async fn get_teams(&self) -> Vec<Team> {
        self.teams.read().await.clone()
    }

    pub async fn standings(&self) -> Vec<Team> {
        rank_teams(&self.teams.read().await)
    }

    /// Add a team named after its roster position
    pub async fn add_team(&self) -> Result<Team, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "add teams", &[GamePhase::Setup])?;

        let mut teams = self.teams.write().await;
        if teams.len() >= game.config.max_teams {
            return Err(StateError::RosterLimit {
                min: game.config.min_teams,
                max: game.config.max_teams,
            });
        }

        let id = teams.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let team = Team::new(id, format!("Team {}", teams.len() + 1));
        teams.push(team.clone());

        tracing::info!("Added team {} ({})", team.name, team.id);
        Ok(team)
    }

    pub async fn remove_team(&self, team_id: TeamId) -> Result<Team, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "remove teams", &[GamePhase::Setup])?;

        let mut teams = self.teams.write().await;
        let index = teams
            .iter()
            .position(|t| t.id == team_id)
            .ok_or(StateError::TeamNotFound(team_id))?;

        if teams.len() <= game.config.min_teams {
            return Err(StateError::RosterLimit {
                min: game.config.min_teams,
                max: game.config.max_teams,
            });
        }

        let team = teams.remove(index);
        tracing::info!("Removed team {} ({})", team.name, team.id);
        Ok(team)
    }

    pub async fn rename_team(&self, team_id: TeamId, name: String) -> Result<Team, StateError> {
        let game = self.game.read().await;
        Self::require_phase(&game, "rename teams", &[GamePhase::Setup])?;

        let name = name.trim();
        if name.is_empty() {
            return Err(StateError::EmptyTeamName);
        }

        let mut teams = self.teams.write().await;
        let team = teams
            .iter_mut()
            .find(|t| t.id == team_id)
            .ok_or(StateError::TeamNotFound(team_id))?;
        team.name = name.to_string();

        Ok(team.clone())
    }

    /// Scoreboard +/- control, independent of any open clue
    pub async fn adjust_score(
        &self,
        team_id: TeamId,
        direction: ScoreDirection,
    ) -> Result<Team, StateError> {
        let game = self.game.read().await;
        Self::require_phase(
            &game,
            "adjust scores",
            &[GamePhase::Playing, GamePhase::FinalRound],
        )?;

        let delta = match direction {
            ScoreDirection::Up => game.config.score_step,
            ScoreDirection::Down => -game.config.score_step,
        };

        let mut teams = self.teams.write().await;
        apply_score_delta(&mut teams, team_id, delta)
    }
}

/// Add `delta` to a team's score; scores may go negative
pub(crate) fn apply_score_delta(
    teams: &mut [Team],
    team_id: TeamId,
    delta: i64,
) -> Result<Team, StateError> {
    let team = teams
        .iter_mut()
        .find(|t| t.id == team_id)
        .ok_or(StateError::TeamNotFound(team_id))?;
    team.score += delta;

    tracing::debug!("{} {:+} -> {}", team.name, delta, team.score);
    Ok(team.clone())
}
