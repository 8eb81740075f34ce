// src/main.rs

use incbuild::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("incbuild error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    let level = logging::init_logging(args.log_level)?;
    let outcome = run(args, level).await?;
    Ok(outcome.exit_code())
}
