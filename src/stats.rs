//! 재조립 통계

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::chunk::ChunkFlag;
use crate::observer::{ChunkEvent, Completion, DechunkObserver, TracingObserver};
use crate::Error;

/// 재조립 통계
#[derive(Debug, Clone)]
pub struct DechunkStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 수락된 청크 수
    pub chunks_accepted: u64,

    /// 수락된 데이터 바이트
    pub bytes_accepted: u64,

    /// 완료된 메시지 수
    pub messages_completed: u64,

    /// 바이트 부족 실패 수
    pub too_few_bytes: u64,

    /// 길이 불일치 실패 수
    pub length_mismatches: u64,

    /// 세션 시작 없이 도착한 청크 수
    pub orphan_chunks: u64,

    /// 마지막 메시지 조립 시간
    pub last_latency: Option<Duration>,

    /// 조립 시간 합계
    total_latency: Duration,
}

impl DechunkStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            chunks_accepted: 0,
            bytes_accepted: 0,
            messages_completed: 0,
            too_few_bytes: 0,
            length_mismatches: 0,
            orphan_chunks: 0,
            last_latency: None,
            total_latency: Duration::ZERO,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 전체 실패 수
    pub fn failures(&self) -> u64 {
        self.too_few_bytes + self.length_mismatches
    }

    /// 평균 조립 시간
    pub fn average_latency(&self) -> Option<Duration> {
        if self.messages_completed == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            self.total_latency.as_secs_f64() / self.messages_completed as f64,
        ))
    }

    /// 청크당 평균 데이터 크기
    pub fn average_chunk_size(&self) -> f64 {
        if self.chunks_accepted == 0 {
            return 0.0;
        }
        self.bytes_accepted as f64 / self.chunks_accepted as f64
    }

    fn record_chunk(&mut self, event: &ChunkEvent) {
        self.chunks_accepted += 1;
        self.bytes_accepted += event.data_len as u64;
    }

    fn record_completion(&mut self, completion: &Completion) {
        self.messages_completed += 1;
        self.last_latency = Some(completion.elapsed);
        self.total_latency += completion.elapsed;
    }

    fn record_failure(&mut self, error: &Error) {
        match error {
            Error::TooFewBytes { .. } => self.too_few_bytes += 1,
            Error::LengthMismatch { .. } => self.length_mismatches += 1,
            _ => {}
        }
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Messages: {} | Chunks: {} | Bytes: {} | Failures: {} | Orphans: {} | Avg latency: {:.3}ms",
            self.elapsed().as_secs_f64(),
            self.messages_completed,
            self.chunks_accepted,
            self.bytes_accepted,
            self.failures(),
            self.orphan_chunks,
            self.average_latency()
                .map(|d| d.as_secs_f64() * 1000.0)
                .unwrap_or(0.0),
        )
    }
}

impl Default for DechunkStats {
    fn default() -> Self {
        Self::new()
    }
}

/// 통계를 기록하고 `tracing` 로그로도 넘기는 관찰자
///
/// 여러 `Dechunker`가 `Arc`로 공유할 수 있다.
#[derive(Debug, Default)]
pub struct StatsObserver {
    stats: Mutex<DechunkStats>,
    log: TracingObserver,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 현재 통계 복사본
    pub fn snapshot(&self) -> DechunkStats {
        self.stats.lock().clone()
    }
}

impl DechunkObserver for StatsObserver {
    fn on_chunk(&self, event: &ChunkEvent) {
        self.stats.lock().record_chunk(event);
        self.log.on_chunk(event);
    }

    fn on_complete(&self, completion: &Completion) {
        self.stats.lock().record_completion(completion);
        self.log.on_complete(completion);
    }

    fn on_failure(&self, error: &Error, frame_len: usize) {
        self.stats.lock().record_failure(error);
        self.log.on_failure(error, frame_len);
    }

    fn on_orphan(&self, flag: ChunkFlag, data_len: usize) {
        self.stats.lock().orphan_chunks += 1;
        self.log.on_orphan(flag, data_len);
    }
}
