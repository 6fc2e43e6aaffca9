use clap::{value_parser, Arg, Command};
use std::error::Error;
use std::path::{Path, PathBuf};

use fileserv::config::{ServerConfig, WorkerMode};
use fileserv::dispatch::{build_strategy, Dispatcher};
use fileserv::logging::{self, info};
use fileserv::serve;
use fileserv::storage::Storage;
use fileserv::validation::Validator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("fileserv")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Flat-directory file server over TCP")
		.args_conflicts_with_subcommands(true)
		.arg(
			Arg::new("workers")
				.value_name("WORKERS")
				.value_parser(value_parser!(usize))
				.help("Worker pool size (default 5)"),
		)
		.arg(
			Arg::new("port")
				.value_name("PORT")
				.value_parser(value_parser!(u16))
				.help("Listen port (default 7777)"),
		)
		.arg(
			Arg::new("mode")
				.short('m')
				.long("mode")
				.value_name("MODE")
				.help("Worker pool type: thread or process"),
		)
		.arg(
			Arg::new("dir")
				.short('d')
				.long("dir")
				.value_name("DIR")
				.help("Storage directory (default ./files)"),
		)
		.arg(Arg::new("host").long("host").value_name("HOST").help("Bind address"))
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.help("Config file (.toml or JSON5)"),
		)
		.subcommand(
			Command::new("worker")
				.about("Process-pool worker (used internally)")
				.hide(true)
				.arg(Arg::new("dir").required(true)),
		)
		.get_matches();

	logging::init_tracing();

	if let Some(sub_matches) = matches.subcommand_matches("worker") {
		let dir = sub_matches.get_one::<String>("dir").ok_or("worker: directory argument required")?;
		return serve::serve_worker(Path::new(dir)).await;
	}

	let mut config = match matches.get_one::<String>("config") {
		Some(path) => ServerConfig::from_file(Path::new(path))?,
		None => ServerConfig::default(),
	};
	config.apply_env()?;

	if let Some(workers) = matches.get_one::<usize>("workers") {
		config.workers = *workers;
	}
	if let Some(port) = matches.get_one::<u16>("port") {
		config.port = *port;
	}
	if let Some(mode) = matches.get_one::<String>("mode") {
		config.mode = mode.parse::<WorkerMode>()?;
	}
	if let Some(dir) = matches.get_one::<String>("dir") {
		config.storage_dir = PathBuf::from(dir);
	}
	if let Some(host) = matches.get_one::<String>("host") {
		config.host = host.clone();
	}
	config.validate()?;

	// Leftovers of uploads interrupted by a previous crash
	Storage::open(&config.storage_dir)?.cleanup_temp_files()?;

	let strategy = build_strategy(&config).await?;
	let dispatcher = Dispatcher::bind(&config, strategy).await?;
	let stats = dispatcher.run().await?;
	info!("Stopped after {} requests", stats.total);

	Ok(())
}

// vim: ts=4
