//! Audience resolution: event + strategy -> candidate recipients.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use uuid::Uuid;

use matchday_core::catalog::{AudienceStrategy, NotificationType};
use matchday_core::error::TemplateError;
use matchday_core::types::UserId;

use crate::error::DispatchError;
use crate::event::EventContext;
use crate::store::{AudienceDirectory, PreferenceStore};

pub struct AudienceResolver {
    directory: Arc<dyn AudienceDirectory>,
    preferences: Arc<dyn PreferenceStore>,
}

impl AudienceResolver {
    pub fn new(directory: Arc<dyn AudienceDirectory>, preferences: Arc<dyn PreferenceStore>) -> Self {
        Self {
            directory,
            preferences,
        }
    }

    /// Candidate recipients, deduplicated and in id order.
    ///
    /// Missing or malformed parameters are fatal; an empty audience is not.
    pub async fn resolve(
        &self,
        ntype: &NotificationType,
        event: &EventContext,
    ) -> Result<BTreeSet<UserId>, DispatchError> {
        let users = match ntype.audience {
            AudienceStrategy::FixturePickers => {
                let fixture_id: i64 = param(event, "fixture_id")?;
                self.directory.users_with_active_pick(fixture_id).await?
            }
            AudienceStrategy::LeagueMembers => {
                let league_id: Uuid = param(event, "league_id")?;
                self.directory.league_members(league_id).await?
            }
            AudienceStrategy::LeagueMembersExceptSender => {
                let league_id: Uuid = param(event, "league_id")?;
                let sender = event
                    .actor_user_id
                    .ok_or_else(|| DispatchError::MissingActor(ntype.notification_key.clone()))?;
                let mut members = self.directory.league_members(league_id).await?;
                members.retain(|user| *user != sender);
                members
            }
            AudienceStrategy::PreferenceBroadcast => {
                self.preferences
                    .users_with_enabled(ntype.preference_key())
                    .await?
            }
            AudienceStrategy::EventUser => vec![param::<Uuid>(event, "user_id")?],
        };

        Ok(users.into_iter().collect())
    }
}

fn param<T: FromStr>(event: &EventContext, name: &str) -> Result<T, DispatchError> {
    let raw = event
        .param(name)
        .ok_or_else(|| TemplateError::MissingParameter(name.to_string()))?;
    raw.parse().map_err(|_| DispatchError::InvalidParameter {
        name: name.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;
    use crate::event::NotificationContent;
    use crate::memory::MemoryStore;

    const CATALOG: &str = r#"[
        {
            "notification_key": "chat-message",
            "owner": "social", "status": "active", "source": "chat",
            "audience": "league-members-except-sender",
            "trigger": { "name": "chat.message.created", "event_id_format": "chat:{message_id}" },
            "dedupe": { "scope": "per_user_per_event", "ttl_seconds": 60 },
            "preferences": { "preference_key": "chat", "default": true }
        },
        {
            "notification_key": "goal-scored",
            "owner": "live", "status": "active", "source": "fixtures",
            "audience": "fixture-pickers",
            "trigger": { "name": "fixture.goal", "event_id_format": "goal:{fixture_id}:{minute}" },
            "dedupe": { "scope": "per_user_per_event", "ttl_seconds": 120 },
            "preferences": { "preference_key": "goals", "default": true }
        },
        {
            "notification_key": "gameweek-published",
            "owner": "game", "status": "active", "source": "gameweeks",
            "audience": "preference-broadcast",
            "trigger": { "name": "gameweek.published", "event_id_format": "gw:{gameweek_id}" },
            "dedupe": { "scope": "global", "ttl_seconds": 86400 },
            "preferences": { "preference_key": "gameweek", "default": true }
        }
    ]"#;

    fn setup() -> (Arc<MemoryStore>, AudienceResolver, matchday_core::catalog::Catalog) {
        let store = Arc::new(MemoryStore::new());
        let resolver = AudienceResolver::new(store.clone(), store.clone());
        let catalog = matchday_core::catalog::Catalog::from_json_str(CATALOG).unwrap();
        (store, resolver, catalog)
    }

    fn event() -> EventContext {
        EventContext::new(Utc::now(), NotificationContent::new("t", "b"))
    }

    #[tokio::test]
    async fn chat_excludes_sender() {
        let (store, resolver, catalog) = setup();
        let league = Uuid::new_v4();
        let (sender, a, b) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));
        for user in [sender, a, b] {
            store.add_league_member(league, user);
        }

        let users = resolver
            .resolve(
                catalog.lookup("chat-message").unwrap(),
                &event().with_param("league_id", league).with_actor(sender),
            )
            .await
            .unwrap();
        assert_eq!(users.into_iter().collect::<Vec<_>>(), vec![a, b]);
    }

    #[tokio::test]
    async fn chat_without_actor_is_fatal() {
        let (_store, resolver, catalog) = setup();
        assert_matches!(
            resolver
                .resolve(
                    catalog.lookup("chat-message").unwrap(),
                    &event().with_param("league_id", Uuid::new_v4()),
                )
                .await,
            Err(DispatchError::MissingActor(_))
        );
    }

    #[tokio::test]
    async fn fixture_pickers_need_numeric_fixture() {
        let (store, resolver, catalog) = setup();
        let goal = catalog.lookup("goal-scored").unwrap();
        store.add_pick(4512, Uuid::from_u128(9));

        let users = resolver
            .resolve(goal, &event().with_param("fixture_id", 4512))
            .await
            .unwrap();
        assert_eq!(users.len(), 1);

        assert_matches!(
            resolver
                .resolve(goal, &event().with_param("fixture_id", "abc"))
                .await,
            Err(DispatchError::InvalidParameter { name, .. }) if name == "fixture_id"
        );
        assert_matches!(
            resolver.resolve(goal, &event()).await,
            Err(DispatchError::Template(TemplateError::MissingParameter(p))) if p == "fixture_id"
        );
    }

    #[tokio::test]
    async fn broadcast_selects_opted_in_users() {
        let (store, resolver, catalog) = setup();
        let (yes, no) = (Uuid::from_u128(1), Uuid::from_u128(2));
        store.set_preference(yes, "gameweek", true);
        store.set_preference(no, "gameweek", false);

        let users = resolver
            .resolve(catalog.lookup("gameweek-published").unwrap(), &event())
            .await
            .unwrap();
        assert_eq!(users.into_iter().collect::<Vec<_>>(), vec![yes]);
    }
}
