//! tvsrun - TotalVibeSegmentator 실행 드라이버
//!
//! 메인 엔트리포인트

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use tvsrun::{
    batch::BatchJob,
    cli::{Cli, Commands},
    processor::{run_segmentation, RunOptions, RunRequest, ToolConfig, DEFAULT_SCRIPT},
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = resolve_tool_config(&cli)?;

    match cli.command {
        Commands::Run {
            input_path,
            output_path,
            segment,
            no_copy_tissue_info,
            ..
        } => {
            let options = segment
                .to_options()
                .with_copy_tissue_info(!no_copy_tissue_info);
            print_header("단일 실행", &input_path, &output_path, &options, &config);
            println!("{}", "═".repeat(50).bright_blue());

            let request = RunRequest::new(input_path, output_path, options);
            let outcome = run_segmentation(&config, &request)
                .with_context(|| format!("분할 실행 실패: {:?}", request.input))?;

            if outcome.success() {
                println!("\n{} 완료: {:?}\n", "✅".bright_green(), request.output);
            } else {
                // 외부 도구의 종료 코드는 명령의 종료 코드로 전달하지 않음
                println!(
                    "\n{} 외부 도구가 비정상 종료했습니다 ({}). 로그: {:?}\n",
                    "⚠️".bright_yellow(),
                    outcome.status,
                    outcome.log_path
                );
            }
        }
        Commands::RunAll {
            input_dir,
            output_dir,
            segment,
            glob,
            num_processes,
        } => {
            let options = segment.to_options();
            print_header("폴더 실행", &input_dir, &output_dir, &options, &config);
            println!("  {} 패턴: {}", "🔍".bright_magenta(), glob);
            println!("  {} 동시 실행: {}", "⚡".bright_yellow(), num_processes);
            println!("{}", "═".repeat(50).bright_blue());

            let job = BatchJob::new(input_dir, output_dir)
                .with_pattern(glob)
                .with_workers(num_processes)
                .with_options(options);
            let submitted = job.run(&config).context("배치 실행 실패")?;

            println!(
                "\n{} {}개 파일 처리 종료: {:?}\n",
                "✅".bright_green(),
                submitted.to_string().bright_green(),
                job.output_dir
            );
        }
    }

    Ok(())
}

/// 로깅 초기화 (`--verbose`가 RUST_LOG보다 우선)
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// 외부 도구 위치 결정
///
/// 스크립트와 참조 파일은 지정되지 않으면 실행 파일 옆에서 찾습니다.
/// 하위 프로세스의 작업 폴더가 바뀌므로 모두 절대 경로로 고정합니다.
fn resolve_tool_config(cli: &Cli) -> Result<ToolConfig> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let script = cli
        .script
        .clone()
        .unwrap_or_else(|| exe_dir.join(DEFAULT_SCRIPT));
    let resources = cli.resources.clone().unwrap_or(exe_dir);

    // 경로 구분자가 없는 인터프리터는 PATH에서 찾도록 그대로 둠
    let interpreter = if cli.python.components().count() > 1 {
        std::path::absolute(&cli.python)
            .with_context(|| format!("인터프리터 경로 확인 실패: {:?}", cli.python))?
    } else {
        cli.python.clone()
    };

    Ok(ToolConfig::new(
        interpreter,
        std::path::absolute(&script)
            .with_context(|| format!("스크립트 경로 확인 실패: {:?}", script))?,
        std::path::absolute(&resources)
            .with_context(|| format!("참조 폴더 경로 확인 실패: {:?}", resources))?,
    ))
}

/// 헤더 출력
fn print_header(
    mode: &str,
    input: &Path,
    output: &Path,
    options: &RunOptions,
    config: &ToolConfig,
) {
    println!("\n{}", "═".repeat(50).bright_blue());
    println!(
        "{}",
        " 🧠 TOTALVIBESEGMENTATOR RUNNER".bright_white().bold()
    );
    println!("{}", "═".repeat(50).bright_blue());
    println!("  {} 모드: {}", "⚙️".bright_yellow(), mode);
    println!("  {} 입력: {:?}", "📂".bright_cyan(), input);
    println!("  {} 출력: {:?}", "📄".bright_green(), output);
    println!(
        "  {} 작업: {} (dataset {})",
        "🎯".bright_cyan(),
        options.task,
        options.task.dataset_id()
    );
    println!("  {} 스크립트: {:?}", "🐍".bright_white(), config.script);

    let flags: Vec<&str> = [
        (options.keep_size, "keep_size"),
        (options.fill_holes, "fill_holes"),
        (options.crop, "crop"),
    ]
    .iter()
    .filter(|(on, _)| *on)
    .map(|(_, name)| *name)
    .collect();
    if !flags.is_empty() {
        println!("  {} 옵션: {}", "✨".bright_magenta(), flags.join(", "));
    }

    if options.copy_tissue_info {
        println!("  {} tissues.txt 복사", "🧾".bright_white());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tool_config_explicit() {
        let cli = Cli::try_parse_from([
            "tvsrun",
            "--python",
            "python3",
            "--script",
            "/opt/tvs/run_TotalVibeSegmentator.py",
            "--resources",
            "/opt/tvs",
            "run",
            "a.nii.gz",
            "b.nii.gz",
        ])
        .unwrap();

        let config = resolve_tool_config(&cli).unwrap();
        assert_eq!(config.interpreter, PathBuf::from("python3"));
        assert_eq!(
            config.script,
            PathBuf::from("/opt/tvs/run_TotalVibeSegmentator.py")
        );
        assert_eq!(config.resource_dir, PathBuf::from("/opt/tvs"));
    }

    #[test]
    fn test_resolve_tool_config_relative_interpreter_is_absolutized() {
        let cli = Cli::try_parse_from([
            "tvsrun",
            "--python",
            "venv/bin/python",
            "--script",
            "/opt/tvs/run.py",
            "--resources",
            "/opt/tvs",
            "run",
            "a",
            "b",
        ])
        .unwrap();

        let config = resolve_tool_config(&cli).unwrap();
        assert!(config.interpreter.is_absolute());
        assert!(config.interpreter.ends_with("venv/bin/python"));
    }
}
