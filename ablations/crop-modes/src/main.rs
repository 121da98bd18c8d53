//! 对比随机裁剪与质心裁剪: patch 保留的前景比例与裁剪耗时.
//!
//! 数据集位置由 `$SEG_MANIFEST` 与 `$SEG_DATA_ROOT` 指定, 默认位于
//! `$HOME/dataset/localisation`. `$SEG_SEED` 可固定随机种子.

mod profile;
mod result;
mod runner;

use log::{error, LevelFilter};
use simple_logger::SimpleLogger;
use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).env().init() {
        eprintln!("cannot initialise logger: {e}");
    }

    println!("Running ablation studies...");
    let result = match runner::run() {
        Ok(r) => r,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = result.analyze() {
        error!("cannot write report: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
