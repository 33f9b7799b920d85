use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = biohack_api::Args::parse();

	biohack_api::run(args).await
}
