use env_logger::{Builder, Env};
use std::process::ExitCode;

mod app;

/// 初期化の失敗を報告するログのtarget。
/// RUST_LOGの設定に関わらずErrorレベルは常に出力する。
const EXIT_TARGET: &str = "hello_device::exit";

fn logger_builder(env: Env) -> Builder {
    let mut builder = Builder::new();
    builder.filter_level(log::LevelFilter::Info);
    builder.parse_env(env);
    builder.filter_module(EXIT_TARGET, log::LevelFilter::Error);
    builder
}

fn main() -> ExitCode {
    logger_builder(Env::default()).init();

    match app::App::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!(target: EXIT_TARGET, "{err:#}");
            ExitCode::FAILURE
        }
    }
}
