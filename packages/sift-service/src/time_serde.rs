//! RFC 3339 serde helpers for optional timestamps in request/response types.

pub mod rfc3339_option {
	use serde::{Deserialize, Deserializer, Serializer};
	use time::{OffsetDateTime, format_description::well_known::Rfc3339};

	pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(ts) => {
				let text = ts.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

				serializer.serialize_some(&text)
			},
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let text: Option<String> = Option::deserialize(deserializer)?;

		match text {
			Some(text) =>
				OffsetDateTime::parse(&text, &Rfc3339).map(Some).map_err(serde::de::Error::custom),
			None => Ok(None),
		}
	}
}
