//! BCP 페리페럴 - 챌린지 재조립 후 청크 응답 전송
//!
//! 사용법:
//!   cargo run --release --bin bcp-peripheral -- [OPTIONS]
//!
//! 예시:
//!   # 기본 (19바이트 청크, 128바이트 응답)
//!   cargo run --release --bin bcp-peripheral -- --bind 0.0.0.0:9100
//!
//!   # 확장 MTU
//!   cargo run --release --bin bcp-peripheral -- --chunk-size 242 --response-len 1024

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use bcp::{Config, EchoResponder, Peripheral};

/// 페리페럴 설정
struct PeripheralConfig {
    bind_addr: SocketAddr,
    response_len: usize,
    config: Config,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9100)),
            response_len: 128,
            config: Config::default(),
        }
    }
}

fn parse_args() -> Result<PeripheralConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = PeripheralConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--bind" | "-b" => {
                config.bind_addr = parse_value(value, "유효한 주소 필요")?;
                i += 1;
            }
            "--chunk-size" => {
                let size: i64 = parse_value(value, "유효한 숫자 필요")?;
                config.config.chunk_size = bcp::normalize_chunk_size(size);
                i += 1;
            }
            "--response-len" => {
                config.response_len = parse_value(value, "유효한 숫자 필요")?;
                i += 1;
            }
            "--session-timeout" => {
                config.config.session_timeout_ms = parse_value(value, "유효한 숫자 필요")?;
                i += 1;
            }
            "--help" | "-h" => {
                println!(
                    r#"BCP Peripheral - BLE Chunk Protocol 페리페럴

챌린지를 재조립하고 응답을 청크로 나눠 전송
- 피어별 재조립 세션, 실패 시 해당 세션만 폐기

사용법:
  cargo run --release --bin bcp-peripheral -- [OPTIONS]

옵션:
  -b, --bind <ADDR>          바인드 주소 (기본: 0.0.0.0:9100)
  --chunk-size <SIZE>        응답 청크 크기 (기본: 19, 1~8191)
  --response-len <BYTES>     응답 길이 (기본: 128)
  --session-timeout <MS>     미완성 세션 유휴 타임아웃 (기본: 5000)
  -h, --help                 이 도움말 출력
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

    let peripheral_config = parse_args()?;

    info!("BCP Peripheral starting...");
    info!("Bind address: {}", peripheral_config.bind_addr);
    info!("Chunk size: {} bytes", peripheral_config.config.chunk_size);
    info!("Response length: {} bytes", peripheral_config.response_len);

    let responder = Arc::new(EchoResponder::new(peripheral_config.response_len));
    let peripheral = Arc::new(
        Peripheral::bind(peripheral_config.config, peripheral_config.bind_addr, responder).await?,
    );

    // Ctrl-C 시 정지
    let stopper = peripheral.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            stopper.stop();
        }
    });

    peripheral.run().await?;
    info!("Responses sent: {}", peripheral.responses_sent());
    Ok(())
}
