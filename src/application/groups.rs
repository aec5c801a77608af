//! Group creation and the category list offered by the creation form.

use std::sync::Arc;

use async_trait::async_trait;
use pal_api_types::{GroupCreateRequest, GroupMemberRequest};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::application::posts::domain_to_mutation;
use crate::application::repos::{GroupsApi, Navigator};
use crate::cache::{
    CacheStore, Cursor, FetchError, MutationError, MutationHandle, MutationKey, MutationOptions,
    MutationOrchestrator, Page, PageFetcher, QueryEngine, QueryKey, QueryState, Resource,
    StepProgress,
};
use crate::domain::entities::{CategoryRecord, GroupRecord};
use crate::domain::error::DomainError;
use crate::domain::types::GroupRole;
use crate::domain::users::CurrentUser;

/// Route shown after a group was created.
pub const GROUPS_ROUTE: &str = "/groups";

pub fn categories_key() -> QueryKey {
    QueryKey::new(Resource::Categories)
}

/// Single-flight key of group creation.
pub fn create_group_key() -> MutationKey {
    MutationKey::new("createGroup")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub allow_invitation: bool,
    pub category_id: Option<i64>,
    /// Users invited as pending members.
    pub invitees: Vec<Uuid>,
}

/// Membership rows for a new group: invitees pending, the creator accepted
/// as owner.
pub fn initial_members(
    group_id: i64,
    creator: Uuid,
    invitees: &[Uuid],
) -> Vec<GroupMemberRequest> {
    invitees
        .iter()
        .copied()
        .filter(|user_id| *user_id != creator)
        .chain(std::iter::once(creator))
        .map(|user_id| {
            let is_creator = user_id == creator;
            let role = if is_creator {
                GroupRole::Owner
            } else {
                GroupRole::Member
            };
            GroupMemberRequest {
                user_id,
                post_group_id: group_id,
                is_accepted: is_creator,
                role: role.into(),
            }
        })
        .collect()
}

/// The category list is not paginated; it arrives as one page.
pub struct CategoryFetcher {
    api: Arc<dyn GroupsApi>,
}

#[async_trait]
impl PageFetcher<CategoryRecord> for CategoryFetcher {
    async fn fetch_page(&self, _cursor: Option<Cursor>) -> Result<Page<CategoryRecord>, FetchError> {
        let categories = self.api.list_categories().await?;
        Ok(Page::last(
            categories.into_iter().map(CategoryRecord::from).collect(),
        ))
    }
}

pub struct GroupService {
    api: Arc<dyn GroupsApi>,
    navigator: Arc<dyn Navigator>,
    categories: QueryEngine<CategoryRecord>,
    mutations: Arc<MutationOrchestrator>,
}

impl GroupService {
    pub fn new(
        api: Arc<dyn GroupsApi>,
        navigator: Arc<dyn Navigator>,
        categories: Arc<CacheStore<CategoryRecord>>,
        mutations: Arc<MutationOrchestrator>,
    ) -> Self {
        let categories = QueryEngine::new(categories, Arc::clone(mutations.registry().events()));
        Self {
            api,
            navigator,
            categories,
            mutations,
        }
    }

    pub fn categories_engine(&self) -> &QueryEngine<CategoryRecord> {
        &self.categories
    }

    pub async fn categories(&self) -> QueryState<CategoryRecord> {
        let fetcher = CategoryFetcher {
            api: Arc::clone(&self.api),
        };
        self.categories.query(&categories_key(), &fetcher).await
    }

    /// Create a group, then add its members.
    ///
    /// Navigation to the group list happens once the group exists, even
    /// when adding members fails; that failure is reported as a partial
    /// failure.
    #[instrument(skip_all, fields(invitees = group.invitees.len()))]
    pub async fn create_group(
        &self,
        handle: &MutationHandle,
        user: &CurrentUser,
        group: NewGroup,
        options: MutationOptions<GroupRecord>,
    ) -> Result<GroupRecord, MutationError> {
        let api = Arc::clone(&self.api);
        let navigator = Arc::clone(&self.navigator);
        let creator = user.id;

        self.mutations
            .run(
                handle,
                group,
                move |group| async move {
                    let category_id = validate_group(&group).map_err(domain_to_mutation)?;

                    let mut progress = StepProgress::new(2);
                    let request = GroupCreateRequest {
                        name: group.name,
                        description: group.description,
                        created_by: creator,
                        allow_invitation: group.allow_invitation,
                        category_id,
                    };
                    let created = GroupRecord::from(progress.step(api.create_group(&request)).await?);

                    let members = initial_members(created.id, creator, &group.invitees);
                    let added = progress.step(api.add_members(&members)).await;
                    if let Err(error) = &added {
                        warn!(group_id = created.id, error = %error, "Adding group members failed");
                    }
                    navigator.navigate(GROUPS_ROUTE);
                    added.map(|()| created)
                },
                options,
            )
            .await
    }
}

fn validate_group(group: &NewGroup) -> Result<i64, DomainError> {
    if group.name.trim().is_empty() {
        return Err(DomainError::validation("group name is required"));
    }
    group
        .category_id
        .ok_or_else(|| DomainError::validation("group category is required"))
}

#[cfg(test)]
mod tests {
    use pal_api_types::GroupRoleValue;

    use super::*;

    #[test]
    fn creator_is_accepted_owner_and_invitees_pending() {
        let creator = Uuid::from_u128(1);
        let invitee = Uuid::from_u128(2);
        let members = initial_members(9, creator, &[invitee, creator]);

        assert_eq!(members.len(), 2);
        assert_eq!(members[0].user_id, invitee);
        assert!(!members[0].is_accepted);
        assert_eq!(members[0].role, GroupRoleValue::Member);
        assert_eq!(members[1].user_id, creator);
        assert!(members[1].is_accepted);
        assert_eq!(members[1].role, GroupRoleValue::Owner);
        assert!(members.iter().all(|member| member.post_group_id == 9));
    }

    #[test]
    fn group_requires_name_and_category() {
        let group = NewGroup {
            name: "Night owls".to_string(),
            description: String::new(),
            allow_invitation: false,
            category_id: None,
            invitees: Vec::new(),
        };
        assert!(validate_group(&group).is_err());
        assert_eq!(
            validate_group(&NewGroup {
                category_id: Some(4),
                ..group.clone()
            })
            .expect("valid"),
            4
        );
        assert!(validate_group(&NewGroup {
            name: " ".to_string(),
            category_id: Some(4),
            ..group
        })
        .is_err());
    }
}
