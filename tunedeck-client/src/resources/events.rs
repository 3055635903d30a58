//! Event views derived from the cached event list.

use tunedeck_core::{group_by_type, group_by_year, ApiResult, Event, PaginationParams, TypeGroup, YearGroup};

use super::Resource;

impl Resource<Event> {
    /// Events grouped by calendar year, newest year first.
    pub async fn by_year(&self, params: Option<&PaginationParams>) -> ApiResult<Vec<YearGroup>> {
        let events = self.list(params).await?;
        Ok(group_by_year(&events))
    }

    /// Events grouped by type, each group newest first.
    pub async fn by_type(&self, params: Option<&PaginationParams>) -> ApiResult<Vec<TypeGroup>> {
        let events = self.list(params).await?;
        Ok(group_by_type(&events))
    }
}
