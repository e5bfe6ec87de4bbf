//! # BCP (BLE Chunk Protocol)
//!
//! 작은 MTU 링크(BLE characteristic 등)를 위한 청크 분할/재조립 프로토콜
//!
//! ## 핵심 특징
//! - **자기 기술 프레임**: 1~2 바이트 헤더에 플래그와 길이 포함
//! - **무상태 분할기**: `Chunker`는 순수 함수, 어디서든 동시 호출 가능
//! - **단일 세션 재조립기**: `Dechunker`는 순서대로 도착한 프레임만 신뢰
//! - **관찰 훅**: 로깅/통계는 주입 가능한 `DechunkObserver`로 분리
//!
//! ## 프레임 포맷
//! ```text
//! byte0: [flag:2][ext:1][len_hi:5]   ext=0 -> len = len_hi (0..=31)
//! byte1: [len_lo:8]                  ext=1 -> len = len_hi << 8 | len_lo (0..=8191)
//! data : len 바이트
//! ```

pub mod central;
pub mod chunk;
pub mod config;
pub mod dechunker;
pub mod error;
pub mod link;
pub mod observer;
pub mod peripheral;
pub mod stats;

pub use central::{Central, Exchange};
pub use chunk::{make_chunks, normalize_chunk_size, Chunk, ChunkFlag, ChunkHeader, Chunker};
pub use config::Config;
pub use dechunker::{Dechunker, Progress};
pub use error::{Error, Result};
pub use link::{Link, MemoryLink, UdpLink};
pub use observer::{ChunkEvent, Completion, DechunkObserver, NoopObserver, TracingObserver};
pub use peripheral::{EchoResponder, Peripheral, Responder};
pub use stats::{DechunkStats, StatsObserver};

/// 청크 하나에 담을 수 있는 최대 데이터 길이 (13비트)
pub const MAX_CHUNK_SIZE: usize = 0x1fff;

/// 1바이트 헤더로 표현 가능한 최대 데이터 길이 (5비트)
pub const SHORT_LEN_MAX: usize = 0x1f;

/// 헤더 포함 최대 프레임 길이
pub const MAX_FRAME_LEN: usize = MAX_CHUNK_SIZE + 2;

/// 기본 청크 크기 (BLE 기본 MTU 23 - ATT 3 = 20바이트 쓰기, 헤더 1바이트 제외)
pub const DEFAULT_CHUNK_SIZE: usize = 19;

/// 기본 챌린지 길이 (바이트)
pub const DEFAULT_CHALLENGE_LEN: usize = 16;
