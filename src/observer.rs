//! 재조립 관찰 훅
//!
//! `Dechunker`는 로그를 직접 찍지 않고 주입된 `DechunkObserver`에 이벤트를 넘긴다.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::chunk::ChunkFlag;
use crate::Error;

/// 청크 수락 이벤트
#[derive(Debug, Clone, Copy)]
pub struct ChunkEvent {
    /// 청크 플래그
    pub flag: ChunkFlag,

    /// 이 청크의 데이터 길이
    pub data_len: usize,

    /// 수락 후 버퍼 길이
    pub buffered_len: usize,

    /// 현재 세션에서 수락한 청크 수
    pub chunks_added: usize,
}

/// 메시지 완료 보고
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    /// 사용된 청크 수
    pub chunks: usize,

    /// 완료된 메시지 크기
    pub bytes: usize,

    /// 첫 청크부터 완료까지 걸린 시간
    pub elapsed: Duration,
}

/// 재조립 이벤트 관찰자
pub trait DechunkObserver: Send + Sync {
    /// 검증을 통과한 청크
    fn on_chunk(&self, _event: &ChunkEvent) {}

    /// Last/Only 수락으로 메시지 완료
    fn on_complete(&self, _completion: &Completion) {}

    /// 검증 실패 (세션은 폐기 대상)
    fn on_failure(&self, _error: &Error, _frame_len: usize) {}

    /// First 없이 도착한 Middle/Last (기존 버퍼에 그대로 이어 붙음)
    fn on_orphan(&self, _flag: ChunkFlag, _data_len: usize) {}
}

/// 아무것도 하지 않는 관찰자
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DechunkObserver for NoopObserver {}

/// `tracing` 로그 관찰자 (기본값)
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DechunkObserver for TracingObserver {
    fn on_chunk(&self, event: &ChunkEvent) {
        if event.flag.starts_session() {
            debug!(
                "dechunker 버퍼 생성: {} bytes ({})",
                event.data_len, event.flag
            );
        } else {
            debug!(
                "dechunker 버퍼 확장: {}+{}={} bytes, {} chunks ({})",
                event.data_len,
                event.buffered_len - event.data_len,
                event.buffered_len,
                event.chunks_added,
                event.flag
            );
        }
    }

    fn on_complete(&self, completion: &Completion) {
        info!(
            "dechunker 완료: {} chunk(s), {} bytes, {:.3}s",
            completion.chunks,
            completion.bytes,
            completion.elapsed.as_secs_f64()
        );
    }

    fn on_failure(&self, error: &Error, frame_len: usize) {
        warn!("dechunker 실패: {} (frame {} bytes)", error, frame_len);
    }

    fn on_orphan(&self, flag: ChunkFlag, data_len: usize) {
        warn!(
            "세션 시작 없이 청크 도착: {} ({} bytes), 기존 버퍼에 추가",
            flag, data_len
        );
    }
}
