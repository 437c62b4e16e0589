//! CLI 인자 파싱 모듈
//!
//! clap을 사용한 명령줄 인자 정의 및 파싱을 담당합니다.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::processor::RunOptions;

/// 분할 작업 종류
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq, Hash)]
pub enum Task {
    /// 전신 조직 분할
    #[default]
    Total,
    /// 신체 영역 분할
    Regions,
}

impl Task {
    /// 외부 도구에 전달되는 데이터셋 ID
    pub fn dataset_id(self) -> u32 {
        match self {
            Task::Total => 87,
            Task::Regions => 278,
        }
    }

    /// 작업별 조직 정보 참조 파일 이름
    pub fn tissue_file_name(self) -> String {
        format!("tissues_{}.txt", self)
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Total => write!(f, "total"),
            Task::Regions => write!(f, "regions"),
        }
    }
}

/// tvsrun CLI 인자 구조체
#[derive(Parser, Debug)]
#[command(
    name = "tvsrun",
    author = "YourName <your@email.com>",
    version,
    about = "TotalVibeSegmentator 실행 드라이버 - 단일 파일 또는 폴더 단위 분할 실행",
    long_about = r#"
TOTALVIBESEGMENTATOR RUNNER
===========================

외부 분할 도구(run_TotalVibeSegmentator.py)를 하위 프로세스로 실행합니다.
각 실행의 표준 출력/에러는 출력 파일 옆의 .log 파일에 기록됩니다.

예제:
  tvsrun run scan.nii.gz out/scan.nii.gz --task regions --crop
  tvsrun run-all ./scans ./segmentations --num-processes 4
  tvsrun --script /opt/tvs/run_TotalVibeSegmentator.py run-all ./in ./out
"#
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 분할 스크립트를 실행할 인터프리터
    #[arg(long, global = true, env = "TVS_PYTHON", default_value = "python3")]
    pub python: PathBuf,

    /// 분할 스크립트 경로 (기본값: 실행 파일 옆의 run_TotalVibeSegmentator.py)
    #[arg(long, global = true, env = "TVS_SCRIPT")]
    pub script: Option<PathBuf>,

    /// tissues_<task>.txt 파일이 있는 폴더 (기본값: 실행 파일 폴더)
    #[arg(long, global = true, env = "TVS_RESOURCES")]
    pub resources: Option<PathBuf>,

    /// 상세 로그 출력
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// 하위 명령
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 단일 파일에 분할 실행
    Run {
        /// 입력 영상 파일
        input_path: PathBuf,

        /// 분할 결과 파일
        output_path: PathBuf,

        #[command(flatten)]
        segment: SegmentArgs,

        /// 출력 폴더에 tissues.txt 복사 (기본값)
        #[arg(long, overrides_with = "no_copy_tissue_info")]
        copy_tissue_info: bool,

        /// tissues.txt 복사 생략
        #[arg(long, overrides_with = "copy_tissue_info")]
        no_copy_tissue_info: bool,
    },

    /// 폴더 내 모든 영상에 분할 실행
    RunAll {
        /// 입력 영상 폴더
        input_dir: PathBuf,

        /// 결과 폴더
        output_dir: PathBuf,

        #[command(flatten)]
        segment: SegmentArgs,

        /// 입력 파일 이름 패턴 (glob 형식)
        #[arg(long, default_value = "*.nii.gz")]
        glob: String,

        /// 동시에 실행할 최대 작업 수
        #[arg(long, default_value_t = 2)]
        num_processes: usize,
    },
}

/// 두 명령이 공유하는 분할 옵션
#[derive(Args, Debug, Clone)]
pub struct SegmentArgs {
    /// 분할 작업 종류
    #[arg(long, value_enum, default_value_t = Task::Total)]
    pub task: Task,

    /// 원본 영상 크기 유지
    #[arg(long)]
    pub keep_size: bool,

    /// 분할 결과의 구멍 메우기
    #[arg(long)]
    pub fill_holes: bool,

    /// 관심 영역으로 자르기
    #[arg(long)]
    pub crop: bool,
}

impl SegmentArgs {
    /// 실행 옵션으로 변환
    pub fn to_options(&self) -> RunOptions {
        RunOptions::new()
            .with_task(self.task)
            .with_keep_size(self.keep_size)
            .with_fill_holes(self.fill_holes)
            .with_crop(self.crop)
    }
}
