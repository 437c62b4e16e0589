//! 에러 타입 정의 모듈
//!
//! tvsrun에서 발생할 수 있는 모든 에러 타입을 정의합니다.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// tvsrun에서 발생할 수 있는 에러 타입
#[derive(Error, Debug)]
pub enum TvsError {
    /// 입력 폴더가 존재하지 않음
    #[error("입력 폴더를 찾을 수 없습니다: {path}")]
    InputNotFound { path: PathBuf },

    /// 입력이 폴더가 아님
    #[error("입력 경로가 폴더가 아닙니다: {path}")]
    NotADirectory { path: PathBuf },

    /// 유효하지 않은 글로브 패턴
    #[error("유효하지 않은 패턴 ({pattern}): {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// 입력 파일 탐색 실패
    #[error("입력 파일 탐색 실패 ({path}): {reason}")]
    DiscoveryFailed { path: PathBuf, reason: String },

    /// 출력 폴더 생성 실패
    #[error("출력 폴더를 만들 수 없습니다 ({path}): {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 로그 파일 열기/쓰기 실패
    #[error("로그 파일 쓰기 실패 ({path}): {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 외부 분할 도구 실행 실패
    #[error("외부 도구를 실행할 수 없습니다 ({program}): {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    /// 자식 프로세스 대기 실패
    #[error("외부 도구 종료 대기 실패 ({program}): {source}")]
    WaitFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    /// 조직 정보 파일 복사 실패
    #[error("조직 정보 파일 복사 실패 ({from} -> {to}): {source}")]
    MetadataCopy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 서로 다른 입력 파일이 같은 결과 파일로 기록됨
    #[error("결과 파일 이름이 겹칩니다 ({path}): {first}, {second}")]
    OutputCollision {
        path: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    /// 워커 수가 0
    #[error("워커 수는 1 이상이어야 합니다: {count}")]
    InvalidWorkerCount { count: usize },

    /// 스레드 풀 초기화 실패
    #[error("스레드 풀 초기화 실패: {reason}")]
    ThreadPoolError { reason: String },
}

impl TvsError {
    /// 실패 레코드에 기록되는 에러 분류 이름
    pub fn kind(&self) -> &'static str {
        match self {
            TvsError::InputNotFound { .. } => "InputNotFound",
            TvsError::NotADirectory { .. } => "NotADirectory",
            TvsError::InvalidPattern { .. } => "InvalidPattern",
            TvsError::DiscoveryFailed { .. } => "DiscoveryFailed",
            TvsError::OutputDir { .. } => "OutputDir",
            TvsError::LogFile { .. } => "LogFile",
            TvsError::LaunchFailed { .. } => "LaunchFailed",
            TvsError::WaitFailed { .. } => "WaitFailed",
            TvsError::MetadataCopy { .. } => "MetadataCopy",
            TvsError::OutputCollision { .. } => "OutputCollision",
            TvsError::InvalidWorkerCount { .. } => "InvalidWorkerCount",
            TvsError::ThreadPoolError { .. } => "ThreadPoolError",
        }
    }
}

/// tvsrun 결과 타입 별칭
pub type Result<T> = std::result::Result<T, TvsError>;
