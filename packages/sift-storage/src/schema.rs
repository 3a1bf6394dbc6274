pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_rag_sources.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_rag_sources.sql")),
				"tables/002_rag_chunks.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_rag_chunks.sql")),
				"tables/003_rag_chunk_embeddings.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_rag_chunk_embeddings.sql")),
				"tables/004_ingestion_jobs.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_ingestion_jobs.sql")),
				"tables/005_viewer_grants.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_viewer_grants.sql")),
				"tables/006_crm_entities.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_crm_entities.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn schema_expands_every_include() {
		let sql = render_schema();

		assert!(!sql.contains("\\ir "), "unexpanded include left in schema");
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS rag_sources"));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS rag_chunks"));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS rag_chunk_embeddings"));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS ingestion_jobs"));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS app_users"));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS crm_shipments"));
	}
}
