//! Assignment engine
//!
//! Routes a new lead to an owner and team:
//! 1. static platform routing (youtube/spotify -> streaming, meta/tiktok
//!    -> social);
//! 2. remaining platforms go to whichever team has fewer open leads;
//! 3. within the team, the active member with the fewest open leads wins,
//!    ties broken by insertion order;
//! 4. with no active member, a configured default owner; with none of
//!    those, `AssignmentUnavailable` - a lead is never created ownerless.
//!
//! The least-loaded read is a point-in-time snapshot. Two concurrent
//! assignments can pick the same owner; the transient imbalance is
//! accepted and corrects with volume, so no lock is taken.

use crate::context::ServiceContext;
use crate::error::{BusinessError, BusinessResult};
use leadflow_core::{Platform, Team};
use leadflow_persistence::{LeadRepo, UserRepo};
use serde::{Deserialize, Serialize};

/// Assignment engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentConfig {
    /// Owner of last resort when a team has no active member
    pub default_owner: Option<String>,
}

/// Result of an assignment decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub owner_id: String,
    pub team: Team,
}

/// Static platform-to-team routing table.
/// Returns None for platforms that load-balance instead.
pub fn routed_team(platform: Platform) -> Option<Team> {
    match platform {
        Platform::Youtube | Platform::Spotify => Some(Team::Streaming),
        Platform::Meta | Platform::Tiktok => Some(Team::Social),
        Platform::Google | Platform::Multiple => None,
    }
}

/// Assignment engine over the current roster and workload
pub struct AssignmentEngine<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AssignmentEngine<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Pick an owner and team for a lead on the given platform
    pub async fn assign(&self, platform: Platform) -> BusinessResult<Assignment> {
        let team = match routed_team(platform) {
            Some(team) => team,
            None => self.less_loaded_team().await?,
        };

        let owner_id = self.least_loaded_member(team).await?;
        Ok(Assignment { owner_id, team })
    }

    /// Two-way balance: the team with fewer open leads (tie -> streaming)
    async fn less_loaded_team(&self) -> BusinessResult<Team> {
        let pool = self.ctx.pool();
        let streaming = LeadRepo::open_count_by_team(pool, Team::Streaming).await?;
        let social = LeadRepo::open_count_by_team(pool, Team::Social).await?;

        Ok(if social < streaming {
            Team::Social
        } else {
            Team::Streaming
        })
    }

    /// Greedy least-loaded pick within a team; insertion order breaks ties
    async fn least_loaded_member(&self, team: Team) -> BusinessResult<String> {
        let pool = self.ctx.pool();
        let members = UserRepo::active_by_team(pool, team).await?;

        if members.is_empty() {
            return self.fallback_owner(team).await;
        }

        let mut best: Option<(String, i64)> = None;
        for member in members {
            let open = LeadRepo::open_count_by_owner(pool, &member.id).await?;
            match &best {
                Some((_, fewest)) if open >= *fewest => {}
                _ => best = Some((member.id, open)),
            }
        }

        // members was non-empty, so best is set
        Ok(best.map(|(id, _)| id).unwrap_or_default())
    }

    async fn fallback_owner(&self, team: Team) -> BusinessResult<String> {
        let Some(default_owner) = &self.ctx.assignment().default_owner else {
            return Err(BusinessError::AssignmentUnavailable(format!(
                "no active member in team {team} and no default owner configured"
            )));
        };

        match UserRepo::get_by_id(self.ctx.pool(), default_owner).await {
            Ok(user) => Ok(user.id),
            Err(_) => Err(BusinessError::AssignmentUnavailable(format!(
                "default owner {default_owner} does not exist"
            ))),
        }
    }
}
