use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::source::Sensitivity;

pub const DEPARTMENT_WILDCARD: &str = "*";

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	Admin,
	Manager,
	User,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Admin => "admin",
			Self::Manager => "manager",
			Self::User => "user",
		}
	}

	pub fn parse(label: &str) -> Option<Self> {
		match label {
			"admin" => Some(Self::Admin),
			"manager" => Some(Self::Manager),
			"user" => Some(Self::User),
			_ => None,
		}
	}
}

/// The concrete access envelope for one request. Built per request by the
/// viewer scope resolver and never cached; role and grants can change between
/// requests.
#[derive(Clone, Debug)]
pub struct ViewerScope {
	pub user_id: i64,
	pub role: Role,
	pub is_external: bool,
	pub allow_internal: bool,
	/// Empty for admins, who get global handling instead of an explicit list.
	pub allowed_customer_ids: HashSet<i64>,
	/// May contain [`DEPARTMENT_WILDCARD`].
	pub allowed_departments: HashSet<String>,
}
impl ViewerScope {
	pub fn is_admin(&self) -> bool {
		self.role == Role::Admin
	}

	/// Admins are not bound to a customer list.
	pub fn unrestricted(&self) -> bool {
		self.is_admin()
	}

	pub fn all_departments(&self) -> bool {
		self.allowed_departments.contains(DEPARTMENT_WILDCARD)
	}
}

/// One candidate row's access-relevant fields, borrowed from whatever store
/// row produced it.
#[derive(Clone, Copy, Debug)]
pub struct CandidateRow<'a> {
	pub customer_id: Option<i64>,
	pub sensitivity: Sensitivity,
	pub department: Option<&'a str>,
}

/// Row-level visibility predicate. Runs against every candidate before any
/// ranking; denials are silent.
pub fn can_view(scope: &ViewerScope, row: &CandidateRow<'_>) -> bool {
	if row.sensitivity == Sensitivity::Internal && !scope.allow_internal {
		return false;
	}

	if let Some(customer_id) = row.customer_id
		&& !scope.unrestricted()
		&& !scope.allowed_customer_ids.contains(&customer_id)
	{
		return false;
	}

	if let Some(department) = row.department
		&& !scope.all_departments()
		&& !scope.allowed_departments.contains(department)
	{
		return false;
	}

	true
}

#[cfg(test)]
mod tests {
	use super::*;

	fn scope(role: Role, allow_internal: bool, customers: &[i64], departments: &[&str]) -> ViewerScope {
		ViewerScope {
			user_id: 7,
			role,
			is_external: false,
			allow_internal,
			allowed_customer_ids: customers.iter().copied().collect(),
			allowed_departments: departments.iter().map(|s| s.to_string()).collect(),
		}
	}

	fn row(customer_id: Option<i64>, sensitivity: Sensitivity) -> CandidateRow<'static> {
		CandidateRow { customer_id, sensitivity, department: None }
	}

	#[test]
	fn internal_rows_require_allow_internal() {
		let denied = scope(Role::User, false, &[101], &["*"]);
		let allowed = scope(Role::User, true, &[101], &["*"]);

		assert!(!can_view(&denied, &row(Some(101), Sensitivity::Internal)));
		assert!(can_view(&allowed, &row(Some(101), Sensitivity::Internal)));
	}

	#[test]
	fn internal_denial_beats_customer_match() {
		// Rule precedence: sensitivity first, customer membership second.
		let viewer = scope(Role::Admin, false, &[], &["*"]);

		assert!(!can_view(&viewer, &row(Some(101), Sensitivity::Internal)));
	}

	#[test]
	fn customer_rows_require_grant() {
		let viewer = scope(Role::User, true, &[101], &["*"]);

		assert!(can_view(&viewer, &row(Some(101), Sensitivity::Public)));
		assert!(!can_view(&viewer, &row(Some(999), Sensitivity::Public)));
	}

	#[test]
	fn admins_skip_the_customer_list() {
		let viewer = scope(Role::Admin, true, &[], &["*"]);

		assert!(can_view(&viewer, &row(Some(999), Sensitivity::Public)));
	}

	#[test]
	fn global_rows_are_visible_without_customer_grant() {
		let viewer = scope(Role::User, false, &[101], &["*"]);

		assert!(can_view(&viewer, &row(None, Sensitivity::Public)));
	}

	#[test]
	fn department_tag_must_be_granted_unless_wildcard() {
		let sales_only = scope(Role::User, true, &[101], &["sales"]);
		let wildcard = scope(Role::User, true, &[101], &["*"]);
		let tagged = CandidateRow {
			customer_id: Some(101),
			sensitivity: Sensitivity::Public,
			department: Some("warehouse"),
		};

		assert!(!can_view(&sales_only, &tagged));
		assert!(can_view(&wildcard, &tagged));
	}
}
