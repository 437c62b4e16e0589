//! 단일 실행 모듈
//!
//! 외부 분할 도구의 인자 구성, 하위 프로세스 실행, 로그 파일 기록,
//! 조직 정보 파일 복사를 담당합니다.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, info, warn};

use crate::cli::Task;
use crate::error::{Result, TvsError};

/// 출력 폴더에 놓이는 조직 정보 파일 이름
pub const TISSUE_INFO_FILE: &str = "tissues.txt";

/// 기본 분할 스크립트 이름
pub const DEFAULT_SCRIPT: &str = "run_TotalVibeSegmentator.py";

/// 외부 분할 도구 위치 설정
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// 스크립트를 실행할 인터프리터
    pub interpreter: PathBuf,
    /// 분할 스크립트 경로
    pub script: PathBuf,
    /// tissues_<task>.txt 참조 파일이 있는 폴더
    pub resource_dir: PathBuf,
}

impl ToolConfig {
    /// 새 도구 설정 생성
    pub fn new(
        interpreter: impl Into<PathBuf>,
        script: impl Into<PathBuf>,
        resource_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            resource_dir: resource_dir.into(),
        }
    }

    /// 작업별 조직 정보 참조 파일 경로
    pub fn tissue_reference(&self, task: Task) -> PathBuf {
        self.resource_dir.join(task.tissue_file_name())
    }
}

/// 분할 실행 옵션
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// 분할 작업 종류
    pub task: Task,
    /// 원본 크기 유지
    pub keep_size: bool,
    /// 구멍 메우기
    pub fill_holes: bool,
    /// 관심 영역 자르기
    pub crop: bool,
    /// 실행 후 출력 폴더에 tissues.txt 복사
    pub copy_tissue_info: bool,
}

impl RunOptions {
    /// 기본 옵션 생성
    pub fn new() -> Self {
        Self {
            copy_tissue_info: true,
            ..Default::default()
        }
    }

    /// 작업 종류 설정
    pub fn with_task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }

    /// 원본 크기 유지 설정
    pub fn with_keep_size(mut self, keep_size: bool) -> Self {
        self.keep_size = keep_size;
        self
    }

    /// 구멍 메우기 설정
    pub fn with_fill_holes(mut self, fill_holes: bool) -> Self {
        self.fill_holes = fill_holes;
        self
    }

    /// 관심 영역 자르기 설정
    pub fn with_crop(mut self, crop: bool) -> Self {
        self.crop = crop;
        self
    }

    /// 조직 정보 파일 복사 설정
    pub fn with_copy_tissue_info(mut self, copy_tissue_info: bool) -> Self {
        self.copy_tissue_info = copy_tissue_info;
        self
    }
}

/// 단일 실행 요청
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// 입력 영상 경로
    pub input: PathBuf,
    /// 분할 결과 경로
    pub output: PathBuf,
    /// 실행 옵션
    pub options: RunOptions,
}

impl RunRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, options: RunOptions) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            options,
        }
    }
}

/// 단일 실행 결과
#[derive(Debug)]
pub struct RunOutcome {
    /// 외부 도구 종료 상태
    pub status: ExitStatus,
    /// 실행 로그 파일 경로
    pub log_path: PathBuf,
}

impl RunOutcome {
    /// 외부 도구가 0으로 종료했는지 여부
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// 외부 도구 인자 벡터 구성
///
/// 인터프리터 뒤에 오는 인자들을 반환합니다. 선택 플래그는 항상
/// `--keep_size`, `--fill_holes`, `--crop` 순서로 붙습니다.
/// 경로는 UTF-8이 아니어도 바이트 그대로 전달됩니다.
pub fn build_args(config: &ToolConfig, request: &RunRequest) -> Vec<OsString> {
    let options = &request.options;

    let mut args = vec![
        config.script.clone().into_os_string(),
        OsString::from("--img"),
        request.input.clone().into_os_string(),
        OsString::from("--out_path"),
        request.output.clone().into_os_string(),
        OsString::from("--dataset_id"),
        OsString::from(options.task.dataset_id().to_string()),
    ];

    if options.keep_size {
        args.push(OsString::from("--keep_size"));
    }
    if options.fill_holes {
        args.push(OsString::from("--fill_holes"));
    }
    if options.crop {
        args.push(OsString::from("--crop"));
    }

    args
}

/// 로그에 기록할 전체 명령줄
pub fn command_line(config: &ToolConfig, args: &[OsString]) -> OsString {
    let mut line = config.interpreter.clone().into_os_string();
    for arg in args {
        line.push(" ");
        line.push(arg);
    }
    line
}

/// 출력 파일에 대응하는 로그 파일 경로 (예: `a.nii.gz` -> `a.log`)
pub fn log_path_for(output: &Path) -> PathBuf {
    let mut stem = output.file_name().unwrap_or_default();

    // file_stem은 선행 점을 확장자로 보지 않으므로 숨김 파일 이름은 유지됨
    while let Some(shorter) = Path::new(stem).file_stem() {
        if shorter == stem {
            break;
        }
        stem = shorter;
    }

    let mut name = stem.to_os_string();
    name.push(".log");
    output.with_file_name(name)
}

/// 조직 정보 참조 파일을 `dir/tissues.txt`로 복사 (기존 파일 덮어쓰기)
pub fn copy_tissue_info(config: &ToolConfig, task: Task, dir: &Path) -> Result<PathBuf> {
    let from = config.tissue_reference(task);
    let to = dir.join(TISSUE_INFO_FILE);

    fs::copy(&from, &to).map_err(|source| TvsError::MetadataCopy {
        from: from.clone(),
        to: to.clone(),
        source,
    })?;

    debug!("조직 정보 복사: {:?} -> {:?}", from, to);
    Ok(to)
}

/// 단일 파일 분할 실행
///
/// # Arguments
/// * `config` - 외부 도구 위치 설정
/// * `request` - 입력/출력 경로와 옵션
///
/// # Returns
/// 외부 도구의 종료 상태와 로그 경로. 외부 도구의 비정상 종료는
/// 에러가 아니며 호출자가 `RunOutcome::success`로 확인합니다.
pub fn run_segmentation(config: &ToolConfig, request: &RunRequest) -> Result<RunOutcome> {
    // 작업 폴더가 출력 폴더로 바뀌므로 상대 경로를 먼저 고정
    let resolved = RunRequest {
        input: absolutize(&request.input),
        output: absolutize(&request.output),
        options: request.options.clone(),
    };
    let work_dir = resolved
        .output
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let args = build_args(config, &resolved);
    let command = command_line(config, &args);
    info!("Running: {}", command.to_string_lossy());

    let log_path = log_path_for(&resolved.output);
    let log_error = |source: std::io::Error| TvsError::LogFile {
        path: log_path.clone(),
        source,
    };

    let mut log_file = File::create(&log_path).map_err(log_error)?;
    let mut header = OsString::from("Running: ");
    header.push(&command);
    header.push("\n\n");
    log_file
        .write_all(header.as_encoded_bytes())
        .map_err(log_error)?;
    let err_file = log_file.try_clone().map_err(log_error)?;

    let program = config.interpreter.display().to_string();
    let mut child = Command::new(&config.interpreter)
        .args(&args)
        .current_dir(&work_dir)
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(err_file))
        .spawn()
        .map_err(|source| TvsError::LaunchFailed {
            program: program.clone(),
            source,
        })?;

    let status = child
        .wait()
        .map_err(|source| TvsError::WaitFailed { program, source })?;

    if status.success() {
        debug!("분할 완료: {:?}", resolved.output);
    } else {
        warn!(
            "외부 도구가 비정상 종료했습니다 ({}): {:?}, 로그: {:?}",
            status, resolved.input, log_path
        );
    }

    if resolved.options.copy_tissue_info {
        copy_tissue_info(config, resolved.options.task, &work_dir)?;
    }

    Ok(RunOutcome { status, log_path })
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> ToolConfig {
        ToolConfig::new("python3", "/opt/tvs/run_TotalVibeSegmentator.py", "/opt/tvs")
    }

    #[test]
    fn test_build_args_base() {
        let request = RunRequest::new("in.nii.gz", "out/in.nii.gz", RunOptions::new());
        let args = build_args(&config(), &request);

        assert_eq!(
            args,
            vec![
                "/opt/tvs/run_TotalVibeSegmentator.py",
                "--img",
                "in.nii.gz",
                "--out_path",
                "out/in.nii.gz",
                "--dataset_id",
                "87",
            ]
        );
    }

    #[test]
    fn test_build_args_flags_each_once() {
        let flags = ["--keep_size", "--fill_holes", "--crop"];

        for mask in 0..8u8 {
            let wanted = [mask & 1 != 0, mask & 2 != 0, mask & 4 != 0];
            let options = RunOptions::new()
                .with_keep_size(wanted[0])
                .with_fill_holes(wanted[1])
                .with_crop(wanted[2]);
            let request = RunRequest::new("a", "b", options);
            let args = build_args(&config(), &request);

            for (flag, on) in flags.iter().zip(wanted) {
                let count = args.iter().filter(|a| a == flag).count();
                assert_eq!(count, usize::from(on), "flag {} mask {}", flag, mask);
            }
            // 7개 고정 인자 + 켜진 플래그 수
            assert_eq!(args.len(), 7 + wanted.iter().filter(|w| **w).count());
        }
    }

    #[test]
    fn test_build_args_regions_scenario() {
        let options = RunOptions::new()
            .with_task(Task::Regions)
            .with_keep_size(true)
            .with_crop(true);
        let request = RunRequest::new("scan.nii.gz", "seg/scan.nii.gz", options);
        let args = build_args(&config(), &request);

        let id_pos = args.iter().position(|a| a == "--dataset_id").unwrap();
        assert_eq!(args[id_pos + 1], "278");
        assert!(args.iter().any(|a| a == "--keep_size"));
        assert!(args.iter().any(|a| a == "--crop"));
        assert!(!args.iter().any(|a| a == "--fill_holes"));
        assert_eq!(&args[7..], &["--keep_size", "--crop"]);
    }

    #[test]
    fn test_command_line() {
        let request = RunRequest::new("a.nii.gz", "b.nii.gz", RunOptions::new().with_crop(true));
        let line = command_line(&config(), &build_args(&config(), &request));
        assert_eq!(
            line,
            "python3 /opt/tvs/run_TotalVibeSegmentator.py --img a.nii.gz --out_path b.nii.gz --dataset_id 87 --crop"
        );
    }

    #[test]
    fn test_log_path_for() {
        assert_eq!(
            log_path_for(Path::new("out/a.nii.gz")),
            PathBuf::from("out/a.log")
        );
        assert_eq!(log_path_for(Path::new("b.nii")), PathBuf::from("b.log"));
        assert_eq!(log_path_for(Path::new("dir/plain")), PathBuf::from("dir/plain.log"));
        assert_eq!(log_path_for(Path::new(".hidden")), PathBuf::from(".hidden.log"));
        assert_eq!(
            log_path_for(Path::new(".hidden.tar.gz")),
            PathBuf::from(".hidden.log")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_are_passed_through() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let name = OsStr::from_bytes(b"scan\xff.nii.gz");
        let input = Path::new("in").join(name);
        let output = Path::new("out").join(name);

        let request = RunRequest::new(&input, &output, RunOptions::new());
        let args = build_args(&config(), &request);
        assert_eq!(args[2], input.clone().into_os_string());
        assert_eq!(args[4], output.clone().into_os_string());

        let line = command_line(&config(), &args);
        assert!(line
            .as_bytes()
            .windows(b"out/scan\xff.nii.gz".len())
            .any(|w| w == b"out/scan\xff.nii.gz"));

        assert_eq!(
            log_path_for(&output),
            Path::new("out").join(OsStr::from_bytes(b"scan\xff.log"))
        );
    }

    #[test]
    fn test_run_options_builder() {
        let options = RunOptions::new()
            .with_task(Task::Regions)
            .with_fill_holes(true)
            .with_copy_tissue_info(false);

        assert_eq!(options.task, Task::Regions);
        assert!(options.fill_holes);
        assert!(!options.keep_size);
        assert!(!options.crop);
        assert!(!options.copy_tissue_info);
        assert!(RunOptions::new().copy_tissue_info);
    }

    #[test]
    fn test_copy_tissue_info_overwrites() {
        let resources = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(resources.path().join("tissues_total.txt"), "1 liver\n2 spleen\n").unwrap();
        fs::write(out.path().join(TISSUE_INFO_FILE), "stale").unwrap();

        let config = ToolConfig::new("python3", "script.py", resources.path());
        let copied = copy_tissue_info(&config, Task::Total, out.path()).unwrap();

        assert_eq!(copied, out.path().join(TISSUE_INFO_FILE));
        assert_eq!(fs::read_to_string(copied).unwrap(), "1 liver\n2 spleen\n");
    }

    #[test]
    fn test_copy_tissue_info_missing_source() {
        let resources = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let config = ToolConfig::new("python3", "script.py", resources.path());

        let err = copy_tissue_info(&config, Task::Regions, out.path()).unwrap_err();
        match err {
            TvsError::MetadataCopy { from, source, .. } => {
                assert!(from.ends_with("tissues_regions.txt"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
