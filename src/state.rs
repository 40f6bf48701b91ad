use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    discovery::ClientCredentials,
    events::UserInfo,
    protocol::SummonerProfile,
    selection::ChampionBuildRecommendation,
    stats::{Queue, Role},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub champion_id: u32,
    pub role: Option<Role>,
    pub queue: Option<Queue>,
    pub summoner_id: Option<u64>,
    pub username: String,
    pub icon_id: Option<u64>,
}

impl SessionState {
    pub fn user_info(&self) -> UserInfo {
        UserInfo::new(self.username.clone(), self.icon_id)
    }
}

/// Process-wide companion state. The session monitor is the only writer of
/// the session and credentials; the UI server reads them.
#[derive(Debug, Default)]
pub struct CompanionState {
    session: RwLock<SessionState>,
    credentials: RwLock<Option<ClientCredentials>>,
    latest: RwLock<Option<Arc<ChampionBuildRecommendation>>>,
}

impl CompanionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> SessionState {
        self.session.read().clone()
    }

    pub fn summoner_id(&self) -> Option<u64> {
        self.session.read().summoner_id
    }

    pub fn set_identity(&self, profile: &SummonerProfile) -> UserInfo {
        let mut session = self.session.write();
        session.summoner_id = Some(profile.summoner_id);
        session.username = profile.display_name.clone();
        session.icon_id = Some(profile.profile_icon_id);
        session.user_info()
    }

    /// Resets the session to empty; a logged-out client has no champion
    /// select either.
    pub fn clear_identity(&self) -> UserInfo {
        let mut session = self.session.write();
        *session = SessionState::default();
        session.user_info()
    }

    pub fn set_selection(&self, champion_id: u32, role: Option<Role>, queue: Queue) {
        let mut session = self.session.write();
        session.champion_id = champion_id;
        session.role = role;
        session.queue = Some(queue);
    }

    pub fn clear_selection(&self) {
        let mut session = self.session.write();
        session.champion_id = 0;
        session.role = None;
        session.queue = None;
    }

    pub fn credentials(&self) -> Option<ClientCredentials> {
        self.credentials.read().clone()
    }

    pub fn set_credentials(&self, credentials: Option<ClientCredentials>) {
        *self.credentials.write() = credentials;
    }

    pub fn latest_recommendation(&self) -> Option<Arc<ChampionBuildRecommendation>> {
        self.latest.read().clone()
    }

    pub fn set_latest_recommendation(&self, recommendation: Option<Arc<ChampionBuildRecommendation>>) {
        *self.latest.write() = recommendation;
    }
}

#[cfg(test)]
mod tests {
    use super::{CompanionState, SessionState};
    use crate::{
        protocol::SummonerProfile,
        stats::{Queue, Role},
    };

    #[test]
    fn identity_round_trips_and_clears() {
        let state = CompanionState::new();
        let info = state.set_identity(&SummonerProfile {
            display_name: "Faker".to_owned(),
            profile_icon_id: 4568,
            summoner_id: 42,
        });
        assert_eq!(info.username, "Faker");
        assert_eq!(info.icon_id, "4568");
        assert_eq!(state.summoner_id(), Some(42));

        state.set_selection(157, Some(Role::Mid), Queue::RankedSolo);
        let cleared = state.clear_identity();
        assert!(cleared.username.is_empty());
        assert!(cleared.icon_id.is_empty());
        assert_eq!(state.session(), SessionState::default());
    }

    #[test]
    fn selection_clear_keeps_identity() {
        let state = CompanionState::new();
        state.set_identity(&SummonerProfile {
            display_name: "Faker".to_owned(),
            profile_icon_id: 1,
            summoner_id: 42,
        });
        state.set_selection(157, None, Queue::HowlingAbyssAram);
        assert_eq!(state.session().queue, Some(Queue::HowlingAbyssAram));

        state.clear_selection();
        let session = state.session();
        assert_eq!(session.champion_id, 0);
        assert_eq!(session.summoner_id, Some(42));
    }
}
