//! 페리페럴 (응답측)
//!
//! - 피어별 챌린지 재조립
//! - 응답 생성 후 청크 단위 전송
//! - 실패한 피어 세션은 즉시 폐기

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::chunk::Chunker;
use crate::dechunker::{Dechunker, Progress};
use crate::stats::{DechunkStats, StatsObserver};
use crate::{Config, Result, MAX_FRAME_LEN};

/// 챌린지에 대한 응답 생성기
pub trait Responder: Send + Sync {
    fn respond(&self, challenge: &[u8]) -> Bytes;
}

impl<F> Responder for F
where
    F: Fn(&[u8]) -> Bytes + Send + Sync,
{
    fn respond(&self, challenge: &[u8]) -> Bytes {
        self(challenge)
    }
}

/// 챌린지를 반복해서 `response_len` 바이트 응답을 만드는 응답기
#[derive(Debug, Clone, Copy)]
pub struct EchoResponder {
    pub response_len: usize,
}

impl EchoResponder {
    pub fn new(response_len: usize) -> Self {
        Self { response_len }
    }
}

impl Responder for EchoResponder {
    fn respond(&self, challenge: &[u8]) -> Bytes {
        if challenge.is_empty() {
            return Bytes::new();
        }
        challenge
            .iter()
            .copied()
            .cycle()
            .take(self.response_len)
            .collect::<Vec<u8>>()
            .into()
    }
}

/// 피어별 재조립 상태
struct PeerSession {
    dechunker: Dechunker,
    last_activity: Instant,
}

/// 페리페럴
pub struct Peripheral {
    config: Config,
    socket: UdpSocket,
    chunker: Chunker,
    responder: Arc<dyn Responder>,

    /// 피어 주소 -> 진행 중인 챌린지 재조립
    sessions: DashMap<SocketAddr, PeerSession>,

    observer: Arc<StatsObserver>,
    running: AtomicBool,
    responses_sent: AtomicU64,
}

impl Peripheral {
    /// 소켓 바인드
    pub async fn bind(
        config: Config,
        bind_addr: SocketAddr,
        responder: Arc<dyn Responder>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        info!("BCP Peripheral started on {}", socket.local_addr()?);

        Ok(Self {
            chunker: Chunker::new(config.chunk_size),
            config,
            socket,
            responder,
            sessions: DashMap::new(),
            observer: Arc::new(StatsObserver::new()),
            running: AtomicBool::new(true),
            responses_sent: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 수신 루프 (`stop()` 호출 시 종료)
    pub async fn run(&self) -> Result<()> {
        let mut buf = vec![0u8; MAX_FRAME_LEN + 1];

        while self.running.load(Ordering::SeqCst) {
            match tokio::time::timeout(
                Duration::from_millis(100),
                self.socket.recv_from(&mut buf),
            )
            .await
            {
                Ok(Ok((len, addr))) => {
                    self.handle_frame(&buf[..len], addr).await;
                }
                Ok(Err(e)) => {
                    warn!("수신 에러: {}", e);
                }
                Err(_) => {
                    // 타임아웃, 계속
                }
            }

            self.prune_sessions();
        }

        info!("BCP Peripheral stopped: {}", self.observer.snapshot().summary());
        Ok(())
    }

    async fn handle_frame(&self, frame: &[u8], addr: SocketAddr) {
        // DashMap 가드는 await 전에 놓는다
        let progress = {
            let mut session = self.sessions.entry(addr).or_insert_with(|| PeerSession {
                dechunker: Dechunker::with_observer(self.observer.clone()),
                last_activity: Instant::now(),
            });
            session.last_activity = Instant::now();
            session.dechunker.add_chunk(frame)
        };

        match progress {
            Ok(Progress::Continuing) => {}
            Ok(Progress::Completed(challenge)) => {
                self.sessions.remove(&addr);
                if let Err(e) = self.respond(&challenge, addr).await {
                    warn!("응답 전송 실패: {} ({})", addr, e);
                }
            }
            Err(e) => {
                warn!("피어 세션 중단: {} ({})", addr, e);
                self.sessions.remove(&addr);
            }
        }
    }

    async fn respond(&self, challenge: &[u8], addr: SocketAddr) -> Result<()> {
        let response = self.responder.respond(challenge);
        let frames = self.chunker.make_chunks(&response);

        for frame in &frames {
            self.socket.send_to(frame, addr).await?;
        }

        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        debug!(
            "응답 전송: {} -> {} bytes, {} chunk(s)",
            addr,
            response.len(),
            frames.len()
        );
        Ok(())
    }

    /// 유휴 세션 정리
    fn prune_sessions(&self) {
        let timeout = Duration::from_millis(self.config.session_timeout_ms);
        self.sessions.retain(|addr, session| {
            if session.last_activity.elapsed() > timeout {
                warn!(
                    "피어 세션 타임아웃: {} ({} chunk(s) 수신)",
                    addr,
                    session.dechunker.chunks_added()
                );
                false
            } else {
                true
            }
        });
    }

    /// 정지
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 실행 중 여부
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 진행 중인 피어 세션 수
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// 보낸 응답 수
    pub fn responses_sent(&self) -> u64 {
        self.responses_sent.load(Ordering::Relaxed)
    }

    /// 재조립 통계
    pub fn stats(&self) -> DechunkStats {
        self.observer.snapshot()
    }
}
