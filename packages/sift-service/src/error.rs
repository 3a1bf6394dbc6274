#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessDeniedReason {
	MissingContext,
	GlobalNotAllowed,
	TicketCustomerMismatch,
}
impl AccessDeniedReason {
	pub fn code(self) -> &'static str {
		match self {
			Self::MissingContext => "missing_context",
			Self::GlobalNotAllowed => "global_not_allowed",
			Self::TicketCustomerMismatch => "ticket_customer_mismatch",
		}
	}
}
impl std::fmt::Display for AccessDeniedReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.code())
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Access denied: {reason}.")]
	AccessDenied { reason: AccessDeniedReason },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {0}")]
	Storage(#[from] sift_storage::Error),
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage(sift_storage::Error::Sqlx(err))
	}
}
impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant { message: err.to_string() }
	}
}
