use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = sift_api::Args::parse();
	sift_api::run(args).await
}
