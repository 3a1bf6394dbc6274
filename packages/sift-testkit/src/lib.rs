mod error;

pub use error::{Error, Result};

use std::{collections::HashSet, env, sync::Mutex, thread, time::Duration};

use qdrant_client::Qdrant;
use sqlx::{Connection, Executor, PgConnection};
use tokio::{runtime::Builder, time};
use uuid::Uuid;

const QDRANT_DELETE_ATTEMPTS: u32 = 5;

/// One disposable Postgres database per test. Qdrant collections handed out
/// through [`TestDatabase::collection_name`] are torn down with it when the
/// value drops.
pub struct TestDatabase {
	name: String,
	dsn: String,
	admin_dsn: String,
	collections: Mutex<HashSet<String>>,
}

impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let name = format!("sift_test_{}", Uuid::new_v4().simple());
		let (admin_dsn, mut admin) = connect_admin(base_dsn).await?;

		admin
			.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create test database: {err}.")))?;

		let dsn = swap_database(base_dsn, &name)?;

		Ok(Self { name, dsn, admin_dsn, collections: Mutex::new(HashSet::new()) })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	/// Returns a collection name scoped to this database and tracks it for
	/// teardown.
	pub fn collection_name(&self, prefix: &str) -> String {
		let collection = format!("{prefix}_{}", self.name);

		self.collections.lock().unwrap_or_else(|err| err.into_inner()).insert(collection.clone());

		collection
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		let name = std::mem::take(&mut self.name);
		let admin_dsn = std::mem::take(&mut self.admin_dsn);
		let collections = self
			.collections
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.iter()
			.cloned()
			.collect::<Vec<_>>();
		// Drop can run inside a tokio test runtime, so the teardown gets its
		// own thread and single-threaded runtime.
		let teardown_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test teardown failed to start a runtime: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(teardown(&name, &admin_dsn, &collections)) {
				eprintln!("Test teardown failed: {err}.");
			}
		});
		let _ = teardown_thread.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var("SIFT_PG_DSN").ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("SIFT_QDRANT_URL").ok()
}

async fn teardown(name: &str, admin_dsn: &str, collections: &[String]) -> Result<()> {
	let qdrant_result = drop_collections(collections).await;
	let mut admin = PgConnection::connect(admin_dsn).await.map_err(|err| {
		Error::Message(format!("Failed to connect to the admin database for teardown: {err}."))
	})?;

	// FORCE terminates straggler connections still holding the database open.
	admin
		.execute(format!(r#"DROP DATABASE IF EXISTS "{name}" WITH (FORCE)"#).as_str())
		.await
		.map_err(|err| Error::Message(format!("Failed to drop test database {name:?}: {err}.")))?;

	qdrant_result
}

async fn drop_collections(collections: &[String]) -> Result<()> {
	if collections.is_empty() {
		return Ok(());
	}

	let Some(url) = env_qdrant_url() else {
		eprintln!("Skipping Qdrant teardown; SIFT_QDRANT_URL is not set.");

		return Ok(());
	};
	let client = Qdrant::from_url(&url)
		.build()
		.map_err(|err| Error::Message(format!("Failed to build a Qdrant client: {err}.")))?;

	for collection in collections {
		let mut last_err = None;

		for attempt in 1..=QDRANT_DELETE_ATTEMPTS {
			let deleted =
				time::timeout(Duration::from_secs(10), client.delete_collection(collection.clone()))
					.await;

			match deleted {
				Ok(Ok(_)) => {
					last_err = None;

					break;
				},
				Ok(Err(err)) => last_err = Some(err.to_string()),
				Err(_) => last_err = Some("delete timed out".to_string()),
			}

			time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
		}

		if let Some(err) = last_err {
			return Err(Error::Message(format!(
				"Failed to delete Qdrant collection {collection:?}: {err}."
			)));
		}
	}

	Ok(())
}

/// The configured application role usually cannot drop databases it is
/// connected to, so admin statements run against a maintenance database.
async fn connect_admin(base_dsn: &str) -> Result<(String, PgConnection)> {
	let mut last_err = None;

	for database in ["postgres", "template1"] {
		let dsn = swap_database(base_dsn, database)?;

		match PgConnection::connect(&dsn).await {
			Ok(conn) => return Ok((dsn, conn)),
			Err(err) => last_err = Some(err),
		}
	}

	Err(Error::Message(format!("Failed to connect to an admin database: {last_err:?}.")))
}

/// Replaces the database segment of a Postgres URL, keeping credentials,
/// host, port, and query parameters.
fn swap_database(base_dsn: &str, database: &str) -> Result<String> {
	let (head, query) = match base_dsn.split_once('?') {
		Some((head, query)) => (head, Some(query)),
		None => (base_dsn, None),
	};
	let authority_start = head
		.find("://")
		.map(|idx| idx + 3)
		.ok_or_else(|| Error::Message(format!("SIFT_PG_DSN is not a URL: {base_dsn:?}.")))?;
	let authority_end =
		head[authority_start..].find('/').map(|idx| authority_start + idx).unwrap_or(head.len());
	let mut out = format!("{}/{database}", &head[..authority_end]);

	if let Some(query) = query {
		out.push('?');
		out.push_str(query);
	}

	Ok(out)
}
