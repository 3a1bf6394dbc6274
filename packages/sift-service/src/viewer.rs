use sift_domain::scope::{DEPARTMENT_WILDCARD, Role, ViewerScope};
use sift_storage::{db::Db, queries};

use crate::{Error, Result};

/// Expands a user row plus its grant tables into a [`ViewerScope`]. Built per
/// request and never cached; role and grants can change between requests.
pub async fn resolve_viewer(db: &Db, user_id: i64) -> Result<ViewerScope> {
	let Some(user) = queries::load_user(db, user_id).await? else {
		return Err(Error::InvalidRequest { message: format!("Unknown user id {user_id}.") });
	};
	// An unknown role label falls back to the least-privileged role.
	let role = Role::parse(&user.role).unwrap_or(Role::User);
	let allowed_customer_ids = queries::customer_grants(db, user_id).await?.into_iter().collect();
	let mut allowed_departments: std::collections::HashSet<String> =
		queries::department_grants(db, user_id).await?.into_iter().collect();

	if matches!(role, Role::Admin | Role::Manager) {
		allowed_departments.insert(DEPARTMENT_WILDCARD.to_string());
	}

	Ok(ViewerScope {
		user_id,
		role,
		is_external: user.is_external,
		allow_internal: !user.is_external,
		allowed_customer_ids,
		allowed_departments,
	})
}
