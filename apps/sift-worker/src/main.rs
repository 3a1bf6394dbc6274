use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = sift_worker::Args::parse();
	sift_worker::run(args).await
}
