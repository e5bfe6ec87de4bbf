//! 청크 프레임 정의와 분할기
//!
//! - Chunk: 헤더(1~2 바이트) + 데이터 조각
//! - Chunker: 페이로드를 순서 있는 청크 목록으로 분할 (무상태)

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result, MAX_CHUNK_SIZE, SHORT_LEN_MAX};

/// 확장 길이 비트 (byte0 bit 5)
const EXT_BIT: u8 = 0x20;

/// 길이 필드 마스크 (byte0 bits 4-0)
const LEN_MASK: u8 = 0x1f;

/// 청크 위치 플래그 (byte0 bits 7-6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChunkFlag {
    /// 중간 청크
    Middle = 0,

    /// 다중 청크 시퀀스의 첫 청크
    First = 1,

    /// 다중 청크 시퀀스의 마지막 청크
    Last = 2,

    /// 단일 청크 메시지
    Only = 3,
}

impl ChunkFlag {
    /// 2비트 값에서 플래그 복원 (상위 비트는 무시)
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => ChunkFlag::Middle,
            1 => ChunkFlag::First,
            2 => ChunkFlag::Last,
            _ => ChunkFlag::Only,
        }
    }

    /// 시퀀스 내 위치로 플래그 결정
    pub fn for_position(index: usize, total: usize) -> Self {
        let is_first = index == 0;
        let is_last = index + 1 >= total;
        match (is_first, is_last) {
            (true, true) => ChunkFlag::Only,
            (true, false) => ChunkFlag::First,
            (false, false) => ChunkFlag::Middle,
            (false, true) => ChunkFlag::Last,
        }
    }

    /// 새 세션을 시작하는 플래그인지 (First, Only)
    pub fn starts_session(self) -> bool {
        matches!(self, ChunkFlag::First | ChunkFlag::Only)
    }

    /// 세션을 끝내는 플래그인지 (Last, Only)
    pub fn ends_session(self) -> bool {
        matches!(self, ChunkFlag::Last | ChunkFlag::Only)
    }
}

impl fmt::Display for ChunkFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChunkFlag::First => "F",
            ChunkFlag::Middle => "M",
            ChunkFlag::Last => "L",
            ChunkFlag::Only => "O",
        };
        f.write_str(s)
    }
}

/// 청크 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// 위치 플래그
    flag: ChunkFlag,

    /// 뒤따르는 데이터 길이 (0 ~ 8191)
    data_len: usize,
}

impl ChunkHeader {
    /// 새 헤더 생성 (13비트로 표현할 수 없는 길이는 거부)
    pub fn new(flag: ChunkFlag, data_len: usize) -> Result<Self> {
        if data_len > MAX_CHUNK_SIZE {
            return Err(Error::ChunkTooLarge { len: data_len });
        }
        Ok(Self { flag, data_len })
    }

    pub fn flag(&self) -> ChunkFlag {
        self.flag
    }

    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// 인코딩된 헤더 길이 (1 또는 2)
    pub fn encoded_len(&self) -> usize {
        if self.data_len <= SHORT_LEN_MAX {
            1
        } else {
            2
        }
    }

    /// 헤더를 버퍼에 기록
    pub fn encode_into(&self, dst: &mut BytesMut) {
        let flag_bits = (self.flag as u8) << 6;
        if self.data_len <= SHORT_LEN_MAX {
            dst.put_u8(flag_bits | self.data_len as u8);
        } else {
            dst.put_u8(flag_bits | EXT_BIT | ((self.data_len >> 8) as u8 & LEN_MASK));
            dst.put_u8((self.data_len & 0xff) as u8);
        }
    }

    /// 프레임 앞부분에서 헤더 해석
    ///
    /// 헤더와 헤더 길이를 반환한다. 선언 길이와 실제 데이터 길이 비교는
    /// 호출자(`Chunk::parse`)의 몫.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let byte0 = *bytes.first().ok_or(Error::TooFewBytes { got: 0 })?;
        let flag = ChunkFlag::from_bits(byte0 >> 6);

        if byte0 & EXT_BIT == 0 {
            let data_len = (byte0 & LEN_MASK) as usize;
            return Ok((Self { flag, data_len }, 1));
        }

        if bytes.len() < 2 {
            return Err(Error::TooFewBytes { got: bytes.len() });
        }
        let data_len = (((byte0 & LEN_MASK) as usize) << 8) | bytes[1] as usize;
        Ok((Self { flag, data_len }, 2))
    }
}

/// 청크 (전송 단위, 쓰기 한 번에 하나)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    header: ChunkHeader,
    data: Bytes,
}

impl Chunk {
    /// 새 청크 생성
    ///
    /// 데이터가 8191바이트를 넘으면 `Error::ChunkTooLarge`.
    pub fn new(flag: ChunkFlag, data: Bytes) -> Result<Self> {
        let header = ChunkHeader::new(flag, data.len())?;
        Ok(Self { header, data })
    }

    /// 분할기 전용: 길이가 이미 `chunk_size` 이하로 잘린 조각
    fn sliced(flag: ChunkFlag, data: Bytes) -> Self {
        Self {
            header: ChunkHeader {
                flag,
                data_len: data.len(),
            },
            data,
        }
    }

    pub fn header(&self) -> &ChunkHeader {
        &self.header
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn flag(&self) -> ChunkFlag {
        self.header.flag
    }

    /// 와이어 크기 (헤더 + 데이터)
    pub fn wire_len(&self) -> usize {
        self.header.encoded_len() + self.data.len()
    }

    /// 청크를 바이트로 직렬화
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.header.encode_into(&mut buf);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// 바이트에서 청크 역직렬화 및 검증
    ///
    /// 검증 순서: 빈 프레임 -> 헤더 해석 -> 2바이트 헤더 길이 -> 선언 길이 일치
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (header, data) = Self::parse(bytes)?;
        Ok(Self {
            header,
            data: Bytes::copy_from_slice(data),
        })
    }

    /// 복사 없이 헤더와 데이터 구간만 검증해서 반환
    pub fn parse(bytes: &[u8]) -> Result<(ChunkHeader, &[u8])> {
        let (header, header_len) = ChunkHeader::decode(bytes)?;
        let data = &bytes[header_len..];

        if header.data_len != data.len() {
            return Err(Error::LengthMismatch {
                declared: header.data_len,
                actual: data.len(),
            });
        }

        Ok((header, data))
    }
}

/// 청크 크기 정규화
///
/// [1, 8191] 범위 밖의 값(음수, 0, 표현 불가 값 포함)은 8191로 대체된다.
pub fn normalize_chunk_size<T: TryInto<usize>>(chunk_size: T) -> usize {
    match chunk_size.try_into() {
        Ok(n) if (1..=MAX_CHUNK_SIZE).contains(&n) => n,
        _ => MAX_CHUNK_SIZE,
    }
}

/// 청크 분할기 (송신측)
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    pub fn new<T: TryInto<usize>>(chunk_size: T) -> Self {
        Self {
            chunk_size: normalize_chunk_size(chunk_size),
        }
    }

    /// 정규화된 청크 크기
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 페이로드 길이에 대한 프레임 수 (빈 페이로드도 1개)
    pub fn frame_count(&self, payload_len: usize) -> usize {
        payload_len.div_ceil(self.chunk_size).max(1)
    }

    /// 데이터를 청크들로 분할
    pub fn split_into_chunks(&self, data: &[u8]) -> Vec<Chunk> {
        if data.is_empty() {
            return vec![Chunk::sliced(ChunkFlag::Only, Bytes::new())];
        }

        let total = self.frame_count(data.len());
        data.chunks(self.chunk_size)
            .enumerate()
            .map(|(idx, slice)| {
                Chunk::sliced(
                    ChunkFlag::for_position(idx, total),
                    Bytes::copy_from_slice(slice),
                )
            })
            .collect()
    }

    /// 데이터를 인코딩된 프레임들로 분할
    pub fn make_chunks(&self, data: &[u8]) -> Vec<Bytes> {
        self.split_into_chunks(data)
            .iter()
            .map(Chunk::to_bytes)
            .collect()
    }
}

/// 페이로드를 `chunk_size` 단위 프레임으로 분할
pub fn make_chunks<T: TryInto<usize>>(payload: &[u8], chunk_size: T) -> Vec<Bytes> {
    Chunker::new(chunk_size).make_chunks(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_of(frames: &[Bytes]) -> Vec<u8> {
        frames
            .iter()
            .flat_map(|f| Chunk::from_bytes(f).unwrap().data().to_vec())
            .collect()
    }

    fn flags_of(frames: &[Bytes]) -> Vec<ChunkFlag> {
        frames
            .iter()
            .map(|f| Chunk::from_bytes(f).unwrap().flag())
            .collect()
    }

    #[test]
    fn test_37_bytes_at_20() {
        let payload = vec![0xAAu8; 37];
        let frames = make_chunks(&payload, 20);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0][0], 0x54);
        assert_eq!(frames[0].len(), 21);
        assert!(frames[0][1..].iter().all(|&b| b == 0xAA));
        assert_eq!(frames[1][0], 0x91);
        assert_eq!(frames[1].len(), 18);
        assert!(frames[1][1..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_single_frame_is_only() {
        let payload: Vec<u8> = (0..19).collect();
        let frames = make_chunks(&payload, 19);

        assert_eq!(frames.len(), 1);
        assert_eq!(flags_of(&frames), vec![ChunkFlag::Only]);
        assert_eq!(frames[0][0], 0xC0 | 19);
        assert_eq!(data_of(&frames), payload);
    }

    #[test]
    fn test_multi_frame_flags() {
        let payload: Vec<u8> = (0..=255).cycle().take(100).collect();
        let frames = make_chunks(&payload, 19);

        assert_eq!(frames.len(), 6);
        let flags = flags_of(&frames);
        assert_eq!(flags[0], ChunkFlag::First);
        assert!(flags[1..5].iter().all(|&f| f == ChunkFlag::Middle));
        assert_eq!(flags[5], ChunkFlag::Last);
        assert_eq!(data_of(&frames), payload);
    }

    #[test]
    fn test_round_trip_across_sizes() {
        let payload: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        for size in [1usize, 2, 19, 31, 32, 33, 242, 999, 1000, 1001, MAX_CHUNK_SIZE] {
            let frames = make_chunks(&payload, size);
            assert_eq!(frames.len(), payload.len().div_ceil(size), "size {}", size);
            assert_eq!(data_of(&frames), payload, "size {}", size);
        }
    }

    #[test]
    fn test_chunk_size_clamping() {
        let payload = vec![7u8; 20_000];
        let reference = make_chunks(&payload, MAX_CHUNK_SIZE);

        assert_eq!(make_chunks(&payload, 0usize), reference);
        assert_eq!(make_chunks(&payload, -5i32), reference);
        assert_eq!(make_chunks(&payload, i64::MIN), reference);
        assert_eq!(make_chunks(&payload, 8192u32), reference);
        assert_eq!(make_chunks(&payload, 100_000u64), reference);
        assert_eq!(reference.len(), 3);
    }

    #[test]
    fn test_normalize_chunk_size() {
        assert_eq!(normalize_chunk_size(1u8), 1);
        assert_eq!(normalize_chunk_size(8191u16), 8191);
        assert_eq!(normalize_chunk_size(0i32), MAX_CHUNK_SIZE);
        assert_eq!(normalize_chunk_size(-1i64), MAX_CHUNK_SIZE);
        assert_eq!(normalize_chunk_size(8192usize), MAX_CHUNK_SIZE);
    }

    #[test]
    fn test_header_width_boundary() {
        let short = Chunk::new(ChunkFlag::Middle, Bytes::from(vec![0u8; 31])).unwrap();
        assert_eq!(short.header().encoded_len(), 1);
        assert_eq!(short.to_bytes()[0], 31);

        let long = Chunk::new(ChunkFlag::Middle, Bytes::from(vec![0u8; 32])).unwrap();
        assert_eq!(long.header().encoded_len(), 2);
        assert_eq!(&long.to_bytes()[..2], &[0x20, 32]);

        let max = Chunk::new(ChunkFlag::Only, Bytes::from(vec![0u8; MAX_CHUNK_SIZE])).unwrap();
        let bytes = max.to_bytes();
        assert_eq!(&bytes[..2], &[0xC0 | 0x20 | 0x1f, 0xff]);
        assert_eq!(bytes.len(), MAX_CHUNK_SIZE + 2);
        assert_eq!(Chunk::from_bytes(&bytes).unwrap(), max);
    }

    #[test]
    fn test_oversized_chunk_is_rejected() {
        let result = Chunk::new(ChunkFlag::Only, Bytes::from(vec![0u8; MAX_CHUNK_SIZE + 1]));
        assert!(matches!(
            result,
            Err(Error::ChunkTooLarge { len }) if len == MAX_CHUNK_SIZE + 1
        ));
        assert!(matches!(
            ChunkHeader::new(ChunkFlag::First, 0x2000),
            Err(Error::ChunkTooLarge { len: 0x2000 })
        ));

        // 수락된 헤더는 항상 선언 길이 그대로 다시 읽힌다
        let header = ChunkHeader::new(ChunkFlag::Last, MAX_CHUNK_SIZE).unwrap();
        let mut buf = BytesMut::new();
        header.encode_into(&mut buf);
        assert_eq!(ChunkHeader::decode(&buf).unwrap(), (header, 2));
    }

    #[test]
    fn test_empty_payload_emits_single_only() {
        let frames = make_chunks(&[], 19);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &[0xC0]);
    }

    #[test]
    fn test_from_bytes_failures() {
        assert!(matches!(
            Chunk::from_bytes(&[]),
            Err(Error::TooFewBytes { got: 0 })
        ));
        assert!(matches!(
            Chunk::from_bytes(&[0x20]),
            Err(Error::TooFewBytes { got: 1 })
        ));
        assert!(matches!(
            Chunk::from_bytes(&[0xC3, 1, 2]),
            Err(Error::LengthMismatch { declared: 3, actual: 2 })
        ));
        assert!(matches!(
            Chunk::from_bytes(&[0x60, 0x00, 9]),
            Err(Error::LengthMismatch { declared: 0, actual: 1 })
        ));
    }

    #[test]
    fn test_flag_bits_are_total() {
        assert_eq!(ChunkFlag::from_bits(0), ChunkFlag::Middle);
        assert_eq!(ChunkFlag::from_bits(1), ChunkFlag::First);
        assert_eq!(ChunkFlag::from_bits(2), ChunkFlag::Last);
        assert_eq!(ChunkFlag::from_bits(3), ChunkFlag::Only);
        assert_eq!(ChunkFlag::from_bits(0xff), ChunkFlag::Only);
        assert_eq!(ChunkFlag::Only.to_string(), "O");
    }
}
