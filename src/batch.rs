//! 배치 실행 모듈
//!
//! 입력 폴더의 파일마다 단일 실행을 만들어 고정 크기 스레드 풀에서
//! 병렬로 처리합니다.

use rayon::ThreadPoolBuilder;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{Result, TvsError};
use crate::pattern::{PatternMatcher, DEFAULT_PATTERN};
use crate::processor::{
    copy_tissue_info, log_path_for, run_segmentation, RunOptions, RunOutcome, RunRequest,
    ToolConfig,
};
use crate::report::{self, Completion, FailureRecord};

/// 기본 동시 실행 수
pub const DEFAULT_WORKERS: usize = 2;

/// 폴더 단위 배치 작업
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// 입력 영상 폴더
    pub input_dir: PathBuf,
    /// 결과 폴더
    pub output_dir: PathBuf,
    /// 입력 파일 글로브 패턴
    pub pattern: String,
    /// 최대 동시 실행 수
    pub workers: usize,
    /// 파일별 실행 옵션 (조직 정보 복사는 배치에서 한 번만 수행)
    pub options: RunOptions,
}

impl BatchJob {
    /// 기본 설정으로 배치 작업 생성
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            workers: DEFAULT_WORKERS,
            options: RunOptions::new(),
        }
    }

    /// 입력 파일 패턴 설정
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// 동시 실행 수 설정
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// 실행 옵션 설정
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// 작업 준비
    ///
    /// 입력 파일을 찾고, 결과 폴더를 만들고, 조직 정보 파일을 한 번 복사한 뒤
    /// 파일별 실행 요청을 반환합니다. 여기서 실패하면 어떤 작업도 제출되지 않습니다.
    ///
    /// 결과는 입력 파일 이름 그대로 결과 폴더 바로 아래에 기록되므로, 하위 폴더를
    /// 탐색하는 패턴에서 결과 파일이나 로그 파일 이름이 겹치면 디스크를 건드리기 전에
    /// `OutputCollision`으로 실패합니다.
    pub fn prepare(&self, config: &ToolConfig) -> Result<Vec<RunRequest>> {
        self.check_workers()?;

        let matcher = PatternMatcher::new(&self.pattern)?;
        let files = matcher.discover(&self.input_dir)?;
        info!(
            "{:?}에서 {}개 파일 발견 (패턴: {})",
            self.input_dir,
            files.len(),
            matcher.as_str()
        );

        let options = self.options.clone().with_copy_tissue_info(false);
        let mut claimed: HashMap<OsString, PathBuf> = HashMap::new();
        let mut requests = Vec::with_capacity(files.len());
        for input in files {
            let Some(name) = input.file_name() else {
                continue;
            };
            let output = self.output_dir.join(name);
            let log_path = log_path_for(&output);

            for path in [&output, &log_path] {
                let Some(key) = path.file_name() else {
                    continue;
                };
                if let Some(first) = claimed.get(key) {
                    return Err(TvsError::OutputCollision {
                        path: path.clone(),
                        first: first.clone(),
                        second: input.clone(),
                    });
                }
                claimed.insert(key.to_os_string(), input.clone());
            }

            requests.push(RunRequest::new(input, output, options.clone()));
        }

        fs::create_dir_all(&self.output_dir).map_err(|source| TvsError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })?;

        copy_tissue_info(config, self.options.task, &self.output_dir)?;

        Ok(requests)
    }

    /// 요청들을 스레드 풀에 제출하고 모두 끝날 때까지 대기
    ///
    /// 동시에 실행되는 `run` 호출은 최대 `workers`개입니다. 각 요청이 끝나면
    /// 성공/실패와 관계없이 `on_complete`가 정확히 한 번 호출되며, 개별 실패는
    /// 다른 요청에 영향을 주지 않습니다.
    ///
    /// # Returns
    /// 제출된 작업 수
    pub fn dispatch<R, C>(&self, requests: Vec<RunRequest>, run: R, on_complete: C) -> Result<usize>
    where
        R: Fn(&RunRequest) -> Result<RunOutcome> + Sync,
        C: Fn(&RunRequest, &Completion) + Sync,
    {
        self.check_workers()?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("tvs-worker-{}", i))
            .build()
            .map_err(|e| TvsError::ThreadPoolError {
                reason: e.to_string(),
            })?;

        let submitted = requests.len();
        info!("작업 {}개 제출 (동시 실행 {}개)", submitted, self.workers);

        let run = &run;
        let on_complete = &on_complete;
        pool.scope(|scope| {
            for request in requests {
                scope.spawn(move |_| {
                    let completion = run_unit(run, &request);
                    let reported =
                        panic::catch_unwind(AssertUnwindSafe(|| on_complete(&request, &completion)));
                    if reported.is_err() {
                        warn!("완료 콜백이 패닉했습니다: {:?}", request.input);
                    }
                });
            }
        });

        info!("배치 완료: {}개 작업", submitted);
        Ok(submitted)
    }

    /// 준비 후 외부 도구로 전체 실행, 실패는 표준 출력에 레코드로 보고
    pub fn run(&self, config: &ToolConfig) -> Result<usize> {
        let requests = self.prepare(config)?;
        self.dispatch(
            requests,
            |request| run_segmentation(config, request),
            report::print_completion,
        )
    }

    fn check_workers(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(TvsError::InvalidWorkerCount {
                count: self.workers,
            });
        }
        Ok(())
    }
}

/// 작업 하나 실행 (에러와 패닉 모두 실패 레코드로 변환)
fn run_unit<R>(run: &R, request: &RunRequest) -> Completion
where
    R: Fn(&RunRequest) -> Result<RunOutcome>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| run(request))) {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(err)) => Err(FailureRecord::from_std_error(&err)),
        Err(payload) => Err(FailureRecord::from_panic(payload.as_ref())),
    }
}
