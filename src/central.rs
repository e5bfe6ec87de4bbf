//! 센트럴 (요청측)
//!
//! - 랜덤 챌린지 생성 및 청크 전송
//! - 응답 청크 수신 및 재조립
//! - 재조립 실패나 타임아웃은 교환 전체를 중단 (재시도 없음)

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::RngCore;
use tracing::{debug, info, warn};

use crate::chunk::Chunker;
use crate::dechunker::{Dechunker, Progress};
use crate::link::Link;
use crate::observer::{DechunkObserver, TracingObserver};
use crate::{Config, Error, Result};

/// 완료된 챌린지/응답 교환
#[derive(Debug, Clone)]
pub struct Exchange {
    /// 보낸 챌린지
    pub challenge: Bytes,

    /// 재조립된 응답
    pub response: Bytes,

    /// 챌린지 전송부터 응답 완료까지
    pub elapsed: Duration,

    /// 응답에 사용된 청크 수
    pub chunks_received: usize,
}

/// 센트럴
pub struct Central<L: Link> {
    config: Config,
    link: L,
    chunker: Chunker,
    observer: Arc<dyn DechunkObserver>,
}

impl<L: Link> Central<L> {
    pub fn new(config: Config, link: L) -> Self {
        Self::with_observer(config, link, Arc::new(TracingObserver))
    }

    pub fn with_observer(config: Config, link: L, observer: Arc<dyn DechunkObserver>) -> Self {
        Self {
            chunker: Chunker::new(config.chunk_size),
            config,
            link,
            observer,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// `challenge_len` 바이트 랜덤 챌린지 생성
    pub fn generate_challenge(&self) -> Bytes {
        let mut challenge = vec![0u8; self.config.challenge_len];
        rand::thread_rng().fill_bytes(&mut challenge);
        Bytes::from(challenge)
    }

    /// 랜덤 챌린지로 교환 수행
    pub async fn exchange(&mut self) -> Result<Exchange> {
        let challenge = self.generate_challenge();
        self.exchange_with(challenge).await
    }

    /// 주어진 챌린지로 교환 수행
    ///
    /// 응답마다 새 `Dechunker`를 쓰므로 이전 교환의 버퍼가 섞이지 않는다.
    pub async fn exchange_with(&mut self, challenge: Bytes) -> Result<Exchange> {
        let start = Instant::now();
        debug!("챌린지:{}", format_hex(&challenge));

        let frames = self.chunker.make_chunks(&challenge);
        for frame in &frames {
            self.link.send(frame).await?;
        }
        debug!("챌린지 전송: {} bytes, {} chunk(s)", challenge.len(), frames.len());

        let mut dechunker = Dechunker::with_observer(self.observer.clone());
        let timeout = Duration::from_millis(self.config.response_timeout_ms);

        let outcome = tokio::time::timeout(timeout, receive_response(&self.link, &mut dechunker)).await;
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("응답 수신 실패, 교환 중단: {}", e);
                return Err(e);
            }
            Err(_) => {
                warn!(
                    "응답 타임아웃: {} chunk(s) 수신 후 중단",
                    dechunker.chunks_added()
                );
                return Err(Error::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
        };

        let elapsed = start.elapsed();
        info!(
            "응답 수신: {} bytes, {} chunk(s), {:.2}ms",
            response.len(),
            dechunker.chunks_added(),
            elapsed.as_secs_f64() * 1000.0
        );

        Ok(Exchange {
            challenge,
            response,
            elapsed,
            chunks_received: dechunker.chunks_added(),
        })
    }
}

async fn receive_response<L: Link>(link: &L, dechunker: &mut Dechunker) -> Result<Bytes> {
    loop {
        let frame = link.recv().await?;
        debug!("청크 수신: {} bytes", frame.len());
        if let Progress::Completed(response) = dechunker.add_chunk(&frame)? {
            return Ok(response);
        }
    }
}

/// 바이트를 공백 구분 16진수 문자열로 변환 (" 0a ff ...")
pub fn format_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!(" {:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::make_chunks;
    use crate::link::MemoryLink;
    use crate::observer::NoopObserver;
    use crate::stats::StatsObserver;

    fn central(link: MemoryLink, timeout_ms: u64) -> Central<MemoryLink> {
        let config = Config {
            response_timeout_ms: timeout_ms,
            ..Config::default()
        };
        Central::with_observer(config, link, Arc::new(NoopObserver))
    }

    #[tokio::test]
    async fn test_exchange_reassembles_response() {
        let (ours, theirs) = MemoryLink::pair(64);
        let mut central = central(ours, 1000);

        let peer = tokio::spawn(async move {
            let challenge = theirs.recv().await.unwrap();
            assert_eq!(challenge[0], 0xC0 | 16);
            let response: Vec<u8> = (0..50).collect();
            for frame in make_chunks(&response, 19) {
                theirs.send(&frame).await.unwrap();
            }
            theirs
        });

        let exchange = central.exchange().await.unwrap();
        assert_eq!(exchange.challenge.len(), 16);
        assert_eq!(exchange.response, Bytes::from((0..50).collect::<Vec<u8>>()));
        assert_eq!(exchange.chunks_received, 3);
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_aborts_on_bad_frame() {
        let (ours, theirs) = MemoryLink::pair(64);
        let observer = Arc::new(StatsObserver::new());
        let config = Config::default();
        let mut central = Central::with_observer(config, ours, observer.clone());

        theirs.send(&[0x41, 1]).await.unwrap();
        theirs.send(&[0x05, 1, 2]).await.unwrap();

        let result = central.exchange_with(Bytes::from_static(b"abc")).await;
        assert!(matches!(
            result,
            Err(Error::LengthMismatch { declared: 5, actual: 2 })
        ));
        assert_eq!(observer.snapshot().length_mismatches, 1);
        assert_eq!(theirs.recv().await.unwrap().as_ref(), &[0xC3, b'a', b'b', b'c']);
    }

    #[tokio::test]
    async fn test_exchange_times_out() {
        let (ours, theirs) = MemoryLink::pair(64);
        let mut central = central(ours, 50);

        // First만 보내고 Last는 보내지 않음
        let frames = make_chunks(&[0u8; 40], 19);
        theirs.send(&frames[0]).await.unwrap();

        let result = central.exchange().await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_exchange_link_closed() {
        let (ours, theirs) = MemoryLink::pair(64);
        let mut central = central(ours, 1000);
        drop(theirs);

        assert!(matches!(
            central.exchange().await,
            Err(Error::ChannelError)
        ));
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x00, 0x0a, 0xff]), " 00 0a ff");
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn test_generate_challenge_length() {
        let (ours, _theirs) = MemoryLink::pair(1);
        let config = Config {
            challenge_len: 32,
            ..Config::default()
        };
        let central = Central::new(config, ours);
        assert_eq!(central.generate_challenge().len(), 32);
    }
}
