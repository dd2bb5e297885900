use std::collections::HashMap;
use std::sync::Arc;

use riko_core::ProfileData;
use riko_db::RikoDb;

use crate::error::Result;

/// Resolves a batch of user ids to display profiles in one round trip.
/// Missing rows are simply absent from the returned map.
pub struct ProfileResolver {
    db: Arc<RikoDb>,
}

impl ProfileResolver {
    pub fn new(db: Arc<RikoDb>) -> Self {
        Self { db }
    }

    pub async fn resolve(&self, user_ids: &[String]) -> Result<HashMap<String, ProfileData>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = self.db.profiles_by_ids(user_ids).await?;

        Ok(rows
            .into_iter()
            .map(|p| {
                (
                    p.user_id.clone(),
                    ProfileData {
                        user_id: p.user_id,
                        display_name: p.display_name,
                        avatar_url: p.avatar_url,
                        handle: p.handle,
                    },
                )
            })
            .collect())
    }
}
