//! 실패 보고 모듈
//!
//! 배치 작업 하나가 실패했을 때 에러 종류, 메시지, 스택 프레임을
//! 담은 레코드를 만들어 출력합니다.

use colored::Colorize;
use serde::Serialize;
use std::any::Any;
use std::backtrace::Backtrace;
use tracing::{debug, error};

use crate::error::TvsError;
use crate::processor::{RunOutcome, RunRequest};

/// 스택 프레임 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// 소스 파일 경로
    pub filename: String,
    /// 함수 이름
    pub name: String,
    /// 줄 번호
    pub lineno: u32,
}

/// 작업 실패 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// 에러 분류 이름
    #[serde(rename = "type")]
    pub kind: String,
    /// 에러 메시지
    pub message: String,
    /// 실패 지점에서 바깥쪽으로 향하는 프레임 목록
    pub trace: Vec<Frame>,
}

/// 작업 하나의 완료 결과
pub type Completion = std::result::Result<RunOutcome, FailureRecord>;

impl FailureRecord {
    /// 레코드 생성 (스택은 호출 지점에서 캡처)
    pub fn capture(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let backtrace = Backtrace::force_capture();
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: parse_backtrace(&backtrace.to_string()),
        }
    }

    /// tvsrun 에러로부터 레코드 생성
    pub fn from_error(err: &TvsError) -> Self {
        Self::capture(err.kind(), err.to_string())
    }

    /// 임의의 에러로부터 레코드 생성
    ///
    /// `TvsError`이면 그 분류 이름을, 아니면 `Error`를 종류로 씁니다.
    /// 메시지에는 원인 체인이 `: `로 이어져 들어갑니다.
    pub fn from_std_error(err: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(tvs) = err.downcast_ref::<TvsError>() {
            return Self::from_error(tvs);
        }

        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::capture("Error", message)
    }

    /// 패닉 페이로드로부터 레코드 생성
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "알 수 없는 패닉".to_string()
        };
        Self::capture("Panic", message)
    }

    /// 한 줄 JSON 문자열
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// 위치 정보가 없는 프레임의 파일 이름
pub const UNKNOWN_FILE: &str = "<unknown>";

/// `std::backtrace::Backtrace` 출력에서 프레임 추출
///
/// 디버그 정보가 없어 위치가 빠진 프레임은 `<unknown>`, 줄 번호 0으로
/// 남깁니다. 캡처 장치 자체의 프레임(`std::backtrace`, 이 모듈)은 제외합니다.
pub fn parse_backtrace(text: &str) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut pending: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();

        if let Some(location) = line.strip_prefix("at ") {
            let Some(name) = pending.take() else {
                continue;
            };
            let (filename, lineno) =
                parse_location(location).unwrap_or_else(|| (UNKNOWN_FILE.to_string(), 0));
            push_frame(&mut frames, name, filename, lineno);
        } else if let Some((index, name)) = line.split_once(": ") {
            if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
                if let Some(previous) = pending.replace(name.to_string()) {
                    push_frame(&mut frames, previous, UNKNOWN_FILE.to_string(), 0);
                }
            }
        }
    }

    if let Some(last) = pending {
        push_frame(&mut frames, last, UNKNOWN_FILE.to_string(), 0);
    }

    frames
}

fn push_frame(frames: &mut Vec<Frame>, name: String, filename: String, lineno: u32) {
    if !is_capture_frame(&name) {
        frames.push(Frame {
            filename,
            name,
            lineno,
        });
    }
}

/// `file:line:column` 또는 `file:line` 분해
fn parse_location(location: &str) -> Option<(String, u32)> {
    let (rest, last) = location.rsplit_once(':')?;
    let last: u32 = last.parse().ok()?;

    match rest.rsplit_once(':') {
        Some((file, line)) => match line.parse::<u32>() {
            Ok(line) => Some((file.to_string(), line)),
            Err(_) => Some((rest.to_string(), last)),
        },
        None => Some((rest.to_string(), last)),
    }
}

fn is_capture_frame(name: &str) -> bool {
    name.starts_with("std::backtrace") || name.starts_with(concat!(module_path!(), "::"))
}

/// 배치 작업 완료 콜백
///
/// 성공 시에는 디버그 로그만 남기고, 실패 시 레코드를 표준 출력에 씁니다.
pub fn print_completion(request: &RunRequest, completion: &Completion) {
    match completion {
        Ok(outcome) => {
            debug!(
                "작업 완료: {:?} ({}), 로그: {:?}",
                request.input, outcome.status, outcome.log_path
            );
        }
        Err(record) => {
            error!("{:?} 처리 실패: {}", request.input, record.message);
            println!(
                "{} {:?}",
                "❌".bright_red(),
                request.input.file_name().unwrap_or_default()
            );
            println!("{}", record.to_json());
        }
    }
}
