//! BCP 센트럴 - 챌린지 전송 후 청크 응답 재조립
//!
//! 사용법:
//!   cargo run --release --bin bcp-central -- [OPTIONS]
//!
//! 예시:
//!   # 기본 (BLE 기본 MTU, 16바이트 챌린지)
//!   cargo run --release --bin bcp-central -- --peer 127.0.0.1:9100
//!
//!   # 확장 MTU + 응답 저장
//!   cargo run --release --bin bcp-central -- -p 127.0.0.1:9100 --chunk-size 242 -o response.bin

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use bcp::central::format_hex;
use bcp::{Central, Config, StatsObserver, UdpLink};

/// 센트럴 설정
struct CentralConfig {
    bind_addr: SocketAddr,
    peer_addr: SocketAddr,
    output_path: Option<PathBuf>,
    count: usize,
    config: Config,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            peer_addr: SocketAddr::from(([127, 0, 0, 1], 9100)),
            output_path: None,
            count: 1,
            config: Config::default(),
        }
    }
}

fn parse_args() -> Result<CentralConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = CentralConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--bind" | "-b" => {
                config.bind_addr = parse_value(value, "유효한 주소 필요")?;
                i += 1;
            }
            "--peer" | "-p" => {
                config.peer_addr = parse_value(value, "유효한 주소 필요")?;
                i += 1;
            }
            "--output" | "-o" => {
                config.output_path = value.map(PathBuf::from);
                i += 1;
            }
            "--chunk-size" => {
                // 범위 밖 값(음수 포함)은 8191로 정규화된다
                let size: i64 = parse_value(value, "유효한 숫자 필요")?;
                config.config.chunk_size = bcp::normalize_chunk_size(size);
                i += 1;
            }
            "--challenge-len" => {
                config.config.challenge_len = parse_value(value, "유효한 숫자 필요")?;
                i += 1;
            }
            "--timeout" | "-t" => {
                config.config.response_timeout_ms = parse_value(value, "유효한 숫자 필요")?;
                i += 1;
            }
            "--count" | "-n" => {
                config.count = parse_value(value, "유효한 숫자 필요")?;
                i += 1;
            }
            "--help" | "-h" => {
                println!(
                    r#"BCP Central - BLE Chunk Protocol 센트럴

랜덤 챌린지를 보내고 청크로 나뉜 응답을 재조립
- 재조립 실패 또는 타임아웃 시 즉시 중단 (재시도 없음)

사용법:
  cargo run --release --bin bcp-central -- [OPTIONS]

옵션:
  -b, --bind <ADDR>         로컬 바인드 주소 (기본: 0.0.0.0:0)
  -p, --peer <ADDR>         페리페럴 주소 (기본: 127.0.0.1:9100)
  -o, --output <PATH>       마지막 응답 저장 경로
  --chunk-size <SIZE>       챌린지 청크 크기 (기본: 19, 1~8191)
  --challenge-len <BYTES>   챌린지 길이 (기본: 16)
  -t, --timeout <MS>        응답 타임아웃 (기본: 5000)
  -n, --count <N>           교환 횟수 (기본: 1)
  -h, --help                이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            other => {
                return Err(format!("알 수 없는 옵션: {}", other));
            }
        }
        i += 1;
    }

    Ok(config)
}

fn parse_value<T: std::str::FromStr>(value: Option<&String>, message: &str) -> Result<T, String> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| message.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let central_config = parse_args()?;

    info!("BCP Central starting...");
    info!("Peer address: {}", central_config.peer_addr);
    info!("Chunk size: {} bytes", central_config.config.chunk_size);
    info!("Challenge length: {} bytes", central_config.config.challenge_len);

    let link = UdpLink::connect(central_config.bind_addr, central_config.peer_addr).await?;
    let observer = Arc::new(StatsObserver::new());
    let mut central = Central::with_observer(central_config.config.clone(), link, observer.clone());

    let mut last_response = None;
    for round in 1..=central_config.count {
        match central.exchange().await {
            Ok(exchange) => {
                info!("[{}] challenge:{}", round, format_hex(&exchange.challenge));
                info!(
                    "[{}] response ({} bytes, {} chunks, {:.2}ms):{}",
                    round,
                    exchange.response.len(),
                    exchange.chunks_received,
                    exchange.elapsed.as_secs_f64() * 1000.0,
                    format_hex(&exchange.response)
                );
                last_response = Some(exchange.response);
            }
            Err(e) => {
                // 실패한 세션은 복구하지 않는다
                error!("[{}] exchange failed, disconnecting: {}", round, e);
                break;
            }
        }
    }

    info!("{}", observer.snapshot().summary());

    if let (Some(path), Some(response)) = (&central_config.output_path, &last_response) {
        std::fs::write(path, response)?;
        info!("Response saved to {:?}", path);
    }

    Ok(())
}
