//! 프로토콜 설정

use crate::chunk::{normalize_chunk_size, Chunker};
use crate::{DEFAULT_CHALLENGE_LEN, DEFAULT_CHUNK_SIZE, SHORT_LEN_MAX};

/// BCP 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 청크 데이터 크기 (바이트)
    /// [1, 8191] 밖의 값은 8191로 취급
    pub chunk_size: usize,

    /// 챌린지 길이 (바이트)
    pub challenge_len: usize,

    /// 응답 완료 대기 타임아웃 (밀리초)
    pub response_timeout_ms: u64,

    /// 진행 중인 재조립 세션의 유휴 타임아웃 (밀리초, 페리페럴)
    pub session_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            challenge_len: DEFAULT_CHALLENGE_LEN,
            response_timeout_ms: 5000,        // 5초
            session_timeout_ms: 5000,         // 5초
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 정규화된 청크 크기
    pub fn normalized_chunk_size(&self) -> usize {
        normalize_chunk_size(self.chunk_size)
    }

    /// 페이로드 전송에 필요한 프레임 수
    pub fn frames_for(&self, payload_len: usize) -> usize {
        Chunker::new(self.chunk_size).frame_count(payload_len)
    }

    /// 헤더 포함 최대 쓰기 크기
    pub fn max_frame_len(&self) -> usize {
        let chunk_size = self.normalized_chunk_size();
        if chunk_size <= SHORT_LEN_MAX {
            chunk_size + 1
        } else {
            chunk_size + 2
        }
    }

    /// BLE 기본 MTU (23바이트, 20바이트 쓰기)
    pub fn ble_default() -> Self {
        Self::default()
    }

    /// BLE 확장 MTU (247바이트, 244바이트 쓰기)
    pub fn extended_mtu() -> Self {
        Self {
            chunk_size: 242,
            challenge_len: DEFAULT_CHALLENGE_LEN,
            response_timeout_ms: 3000,
            session_timeout_ms: 5000,
        }
    }

    /// 최대 청크 (MTU 제한이 없는 링크용)
    pub fn max_chunk() -> Self {
        Self {
            chunk_size: crate::MAX_CHUNK_SIZE,
            challenge_len: DEFAULT_CHALLENGE_LEN,
            response_timeout_ms: 3000,
            session_timeout_ms: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_sizes() {
        let config = Config::ble_default();
        assert_eq!(config.max_frame_len(), 20);
        assert_eq!(config.frames_for(0), 1);
        assert_eq!(config.frames_for(19), 1);
        assert_eq!(config.frames_for(20), 2);

        assert_eq!(Config::extended_mtu().max_frame_len(), 244);
        assert_eq!(Config::max_chunk().max_frame_len(), crate::MAX_FRAME_LEN);
    }

    #[test]
    fn test_out_of_range_chunk_size() {
        let config = Config {
            chunk_size: 0,
            ..Config::default()
        };
        assert_eq!(config.normalized_chunk_size(), crate::MAX_CHUNK_SIZE);
        assert_eq!(config.frames_for(20_000), 3);
        assert_eq!(config.frames_for(0), 1);
    }

    #[test]
    fn test_frames_for_matches_chunker() {
        let config = Config::extended_mtu();
        let chunker = Chunker::new(config.chunk_size);
        for len in [0usize, 1, 241, 242, 243, 10_000] {
            assert_eq!(config.frames_for(len), chunker.frame_count(len));
            assert_eq!(config.frames_for(len), chunker.make_chunks(&vec![0u8; len]).len());
        }
    }
}
