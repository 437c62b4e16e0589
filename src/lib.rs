//! tvsrun - TotalVibeSegmentator 실행 드라이버
//!
//! 외부 의료 영상 분할 도구를 하위 프로세스로 실행하는 CLI 도구입니다.
//! 분할 자체는 외부 도구가 수행하며, 이 크레이트는 인자 구성, 로그 파일 배치,
//! 조직 정보 파일 복사, 폴더 단위 병렬 실행을 담당합니다.
//!
//! # 주요 기능
//!
//! - 🧠 **단일 실행**: 파일 하나를 분할하고 `.log` 파일에 출력 기록
//! - 🚀 **배치 실행**: glob 패턴으로 찾은 파일들을 고정 크기 스레드 풀에서 병렬 처리
//! - 🧾 **실패 보고**: 실패한 작업마다 에러 종류, 메시지, 스택 프레임을 JSON으로 출력
//!
//! # 예제
//!
//! ```bash
//! # 단일 파일
//! tvsrun run scan.nii.gz out/scan.nii.gz --task regions --keep-size --crop
//!
//! # 폴더 전체 (동시 4개)
//! tvsrun run-all ./scans ./segmentations --num-processes 4
//! ```

pub mod batch;
pub mod cli;
pub mod error;
pub mod pattern;
pub mod processor;
pub mod report;

// Re-exports for convenient access
pub use batch::BatchJob;
pub use cli::{Cli, Commands, Task};
pub use error::{Result, TvsError};
pub use pattern::PatternMatcher;
pub use processor::{run_segmentation, RunOptions, RunOutcome, RunRequest, ToolConfig};
pub use report::{FailureRecord, Frame};
