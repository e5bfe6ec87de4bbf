//! 재조립기 (수신측)
//!
//! - 한 번에 하나의 메시지만 조립
//! - 프레임 순서는 전송 계층을 전적으로 신뢰 (시퀀스 번호 없음)
//! - First/Only 수락 시 버퍼 리셋, Last/Only 수락 시 완료

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};

use crate::chunk::Chunk;
use crate::observer::{ChunkEvent, Completion, DechunkObserver, TracingObserver};
use crate::Result;

/// 청크 추가 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// 청크 정상, 다음 청크 필요
    Continuing,

    /// 메시지 완료
    Completed(Bytes),
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        matches!(self, Progress::Completed(_))
    }
}

/// 청크 재조립기
///
/// 실패(`Err`) 이후의 버퍼 내용은 의미가 없다. 호출자는 세션(그리고 연결)을
/// 폐기해야 하며, 다음 메시지는 `reset()` 또는 새 인스턴스로 시작한다.
pub struct Dechunker {
    /// 누적 버퍼
    buffer: BytesMut,

    /// 현재 세션에서 수락한 청크 수
    chunks_added: usize,

    /// 세션 시작 시간 (지연 측정용)
    started_at: Instant,

    /// First/Only 이후 Last/Only 전까지 true (진단용)
    in_session: bool,

    observer: Arc<dyn DechunkObserver>,
}

impl Dechunker {
    /// `tracing` 로그 관찰자로 생성
    pub fn new() -> Self {
        Self::with_observer(Arc::new(TracingObserver))
    }

    pub fn with_observer(observer: Arc<dyn DechunkObserver>) -> Self {
        Self {
            buffer: BytesMut::new(),
            chunks_added: 0,
            started_at: Instant::now(),
            in_session: false,
            observer,
        }
    }

    /// 청크 하나 추가
    ///
    /// 검증에 실패하면 `Error::TooFewBytes` 또는 `Error::LengthMismatch`.
    /// First 없이 도착한 Middle/Last는 거부하지 않고 현재 버퍼에 이어 붙인다.
    pub fn add_chunk(&mut self, bytes: &[u8]) -> Result<Progress> {
        let (header, data) = match Chunk::parse(bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.observer.on_failure(&e, bytes.len());
                self.in_session = false;
                return Err(e);
            }
        };
        let flag = header.flag();

        if flag.starts_session() {
            self.started_at = Instant::now();
            self.buffer.clear();
            self.buffer.extend_from_slice(data);
            self.chunks_added = 1;
            self.in_session = true;
        } else {
            if !self.in_session {
                self.observer.on_orphan(flag, data.len());
            }
            self.buffer.extend_from_slice(data);
            self.chunks_added += 1;
        }

        self.observer.on_chunk(&ChunkEvent {
            flag,
            data_len: data.len(),
            buffered_len: self.buffer.len(),
            chunks_added: self.chunks_added,
        });

        if !flag.ends_session() {
            return Ok(Progress::Continuing);
        }

        self.in_session = false;
        self.observer.on_complete(&Completion {
            chunks: self.chunks_added,
            bytes: self.buffer.len(),
            elapsed: self.started_at.elapsed(),
        });
        Ok(Progress::Completed(Bytes::copy_from_slice(&self.buffer)))
    }

    /// 세션 상태 초기화
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.chunks_added = 0;
        self.started_at = Instant::now();
        self.in_session = false;
    }

    /// 현재 버퍼 길이
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn chunks_added(&self) -> usize {
        self.chunks_added
    }

    pub fn is_in_session(&self) -> bool {
        self.in_session
    }
}

impl Default for Dechunker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dechunker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dechunker")
            .field("buffered_len", &self.buffer.len())
            .field("chunks_added", &self.chunks_added)
            .field("in_session", &self.in_session)
            .finish_non_exhaustive()
    }
}
