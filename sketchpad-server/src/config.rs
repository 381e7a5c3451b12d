//! Command-line and environment configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

/// Default port for the sketchpad server.
pub const DEFAULT_PORT: u16 = 3000;
/// Default burst capacity for rate limiting (messages).
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 100;
/// Default sustained rate for rate limiting (messages per second).
///
/// Cursor moves arrive at pointer rate, so this is well above a typical
/// request budget.
pub const DEFAULT_RATE_LIMIT_SUSTAINED: u32 = 60;

/// Development server ports that are allowed as CORS origins by default.
const DEV_PORTS: [u16; 3] = [3000, 5173, 8080];

/// Per-connection token bucket settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum number of frames accepted in a burst.
    pub burst: u32,
    /// Frames per second refilled into the bucket.
    pub sustained: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: DEFAULT_RATE_LIMIT_BURST,
            sustained: DEFAULT_RATE_LIMIT_SUSTAINED,
        }
    }
}

/// Sketchpad server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "sketchpad", version, about = "Collaborative drawing authority")]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "SKETCHPAD_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Port to bind.
    #[arg(long, env = "SKETCHPAD_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory with a web client to serve for unmatched paths.
    #[arg(long, env = "SKETCHPAD_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// WebSocket frames accepted in a burst per connection.
    #[arg(long, env = "WS_RATE_LIMIT_BURST", default_value_t = DEFAULT_RATE_LIMIT_BURST)]
    pub rate_limit_burst: u32,

    /// WebSocket frames per second per connection, sustained.
    #[arg(long, env = "WS_RATE_LIMIT_SUSTAINED", default_value_t = DEFAULT_RATE_LIMIT_SUSTAINED)]
    pub rate_limit_sustained: u32,

    /// Allowed CORS origins, comma separated. Defaults to localhost origins.
    #[arg(long = "cors-origin", env = "SKETCHPAD_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Socket address to bind.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Rate limit settings for WebSocket connections.
    #[must_use]
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            burst: self.rate_limit_burst,
            sustained: self.rate_limit_sustained,
        }
    }

    /// Origins allowed by CORS.
    ///
    /// Without explicit origins this is localhost and 127.0.0.1 on the
    /// configured port plus common dev server ports.
    #[must_use]
    pub fn allowed_origins(&self) -> Vec<String> {
        let explicit: Vec<String> = self
            .cors_origins
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if !explicit.is_empty() {
            return explicit;
        }

        let mut ports = vec![self.port];
        ports.extend(DEV_PORTS.iter().filter(|p| **p != self.port));
        ports
            .into_iter()
            .flat_map(|port| {
                [
                    format!("http://localhost:{port}"),
                    format!("http://127.0.0.1:{port}"),
                ]
            })
            .collect()
    }
}
