// src/main.rs

use steprunner::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("steprunner: {err:?}");
    }

    if let Err(err) = run(args).await {
        eprintln!("steprunner error: {err}");
        if let Some(detail) = err.detail() {
            eprintln!("{detail}");
        }
        std::process::exit(1);
    }
}
