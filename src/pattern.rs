//! 입력 파일 탐색 모듈
//!
//! glob 패턴으로 입력 폴더의 영상 파일을 찾습니다.

use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, TvsError};

/// 기본 입력 파일 패턴
pub const DEFAULT_PATTERN: &str = "*.nii.gz";

/// 컴파일된 패턴 매처
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: Pattern,
    recursive: bool,
}

impl PatternMatcher {
    /// 새 패턴 매처 생성
    ///
    /// # Arguments
    /// * `pattern` - 입력 폴더 기준 상대 경로에 적용할 글로브 패턴
    ///
    /// # Examples
    /// ```
    /// use tvsrun::pattern::PatternMatcher;
    ///
    /// let matcher = PatternMatcher::new("*.nii.gz").unwrap();
    /// assert!(matcher.matches("scan_01.nii.gz"));
    /// assert!(!matcher.matches("scan_01.nii"));
    /// ```
    pub fn new(pattern: &str) -> Result<Self> {
        let compiled = Pattern::new(pattern).map_err(|e| TvsError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        // 구분자나 `**`가 있을 때만 하위 폴더까지 탐색
        let recursive = pattern.contains('/') || pattern.contains("**");

        Ok(Self {
            pattern: compiled,
            recursive,
        })
    }

    /// 상대 경로가 패턴과 일치하는지 확인
    ///
    /// UTF-8이 아닌 경로는 손실 변환한 이름으로 비교합니다.
    pub fn matches(&self, relative: impl AsRef<Path>) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.pattern
            .matches_with(&relative.as_ref().to_string_lossy(), options)
    }

    /// 하위 폴더까지 탐색하는 패턴인지 여부
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// 패턴 원문
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// 입력 폴더에서 패턴과 일치하는 파일 수집
    ///
    /// 반환 순서는 파일 시스템에 따라 달라집니다.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Err(TvsError::InputNotFound {
                path: dir.to_path_buf(),
            });
        }
        if !dir.is_dir() {
            return Err(TvsError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }

        let walker = if self.recursive {
            WalkDir::new(dir).min_depth(1)
        } else {
            WalkDir::new(dir).min_depth(1).max_depth(1)
        };

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| TvsError::DiscoveryFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;

            if !entry.path().is_file() {
                continue;
            }

            let matched = entry
                .path()
                .strip_prefix(dir)
                .map(|relative| self.matches(relative))
                .unwrap_or(false);

            if matched {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }
}
