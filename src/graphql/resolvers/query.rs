use crate::graphql::schema::GraphQLContext;
use crate::graphql::types::{QuakeEvent, RecentQuakes};
use async_graphql::{Context, FieldResult, Object, ID};
use chrono::{DateTime, Utc};

/// Root query object for GraphQL
pub struct Query;

#[Object]
impl Query {
    /// Earthquakes from the recent window, refreshing first if stale
    async fn recent_events(&self, ctx: &Context<'_>) -> FieldResult<RecentQuakes> {
        let context = ctx.data::<GraphQLContext>()?;
        let recent = context.feed.list_recent().await?;
        Ok(recent.into())
    }

    /// Get a stored earthquake by ID
    async fn event(&self, ctx: &Context<'_>, id: ID) -> FieldResult<Option<QuakeEvent>> {
        let context = ctx.data::<GraphQLContext>()?;
        match context.feed.get_event(&id).await {
            Ok(event) => Ok(event.map(|e| e.into())),
            Err(e) => Err(e.into()),
        }
    }

    /// Storage time of the freshest event in the window, without refreshing
    async fn last_updated(&self, ctx: &Context<'_>) -> FieldResult<Option<DateTime<Utc>>> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context.feed.read_window().await?.last_updated)
    }
}
