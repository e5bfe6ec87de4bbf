//! 프레임 전송 링크
//!
//! BLE characteristic 쌍을 대신하는 전송 추상화. 쓰기 한 번에 프레임 하나,
//! 도착 순서는 송신 순서와 같다고 가정한다.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::{Error, Result, MAX_FRAME_LEN};

/// 프레임 단위 양방향 링크
#[allow(async_fn_in_trait)]
pub trait Link {
    /// 프레임 하나 쓰기
    async fn send(&self, frame: &[u8]) -> Result<()>;

    /// 프레임 하나 수신
    async fn recv(&self) -> Result<Bytes>;
}

/// UDP 링크 (데이터그램 하나 = 프레임 하나)
pub struct UdpLink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpLink {
    /// 로컬 주소에 바인드하고 상대 주소로 연결
    pub async fn connect(bind_addr: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(peer).await?;
        info!("UDP 링크 연결: {} -> {}", socket.local_addr()?, peer);
        Ok(Self { socket, peer })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Link for UdpLink {
    async fn send(&self, frame: &[u8]) -> Result<()> {
        self.socket.send(frame).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Bytes> {
        // 최대 프레임보다 1바이트 크게 받아서 초과 데이터그램은 길이 불일치로 걸러진다
        let mut buf = vec![0u8; MAX_FRAME_LEN + 1];
        let len = self.socket.recv(&mut buf).await?;
        buf.truncate(len);
        Ok(Bytes::from(buf))
    }
}

/// 프로세스 내부 링크 (테스트 및 시뮬레이션용)
pub struct MemoryLink {
    tx: mpsc::Sender<Bytes>,
    rx: Mutex<mpsc::Receiver<Bytes>>,
}

impl MemoryLink {
    /// 서로 연결된 링크 한 쌍 생성
    pub fn pair(capacity: usize) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(capacity);
        let (b_tx, b_rx) = mpsc::channel(capacity);
        (
            Self {
                tx: a_tx,
                rx: Mutex::new(b_rx),
            },
            Self {
                tx: b_tx,
                rx: Mutex::new(a_rx),
            },
        )
    }
}

impl Link for MemoryLink {
    async fn send(&self, frame: &[u8]) -> Result<()> {
        self.tx
            .send(Bytes::copy_from_slice(frame))
            .await
            .map_err(|_| Error::ChannelError)
    }

    async fn recv(&self) -> Result<Bytes> {
        self.rx.lock().await.recv().await.ok_or(Error::ConnectionClosed)
    }
}
