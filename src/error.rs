//! 에러 타입 정의

use thiserror::Error;

/// BCP 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 헤더 바이트가 없거나, 2바이트 헤더를 선언했지만 1바이트만 도착
    #[error("바이트 부족: {got} bytes")]
    TooFewBytes { got: usize },

    /// 선언된 길이와 실제 데이터 길이 불일치
    #[error("길이 불일치: declared {declared}, actual {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// 13비트 길이 필드로 표현할 수 없는 청크 데이터
    #[error("청크가 너무 큼: {len} bytes (최대 8191)")]
    ChunkTooLarge { len: usize },

    #[error("응답 타임아웃: {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("채널 에러")]
    ChannelError,

    #[error("연결 종료")]
    ConnectionClosed,
}

impl Error {
    /// 프레임 자체의 결함인지 (재조립 실패)
    pub fn is_frame_fault(&self) -> bool {
        matches!(self, Error::TooFewBytes { .. } | Error::LengthMismatch { .. })
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
