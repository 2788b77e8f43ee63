use elasticsearch_snapmove::{args::Opt, orchestrator};
use std::process::ExitCode;
use structopt::StructOpt;

#[tokio::main]
async fn main() -> ExitCode {
    let opt = Opt::from_args();
    env_logger::Builder::new()
        .filter_level(opt.log_level())
        .parse_default_env()
        .init();
    log::info!("Elasticsearch snapmove started!");
    let config = match opt.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match orchestrator::run(&config).await {
        Ok(report) => {
            log::info!("run finished: {:?}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
