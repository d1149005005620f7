//! 日志初始化：`RUST_LOG` 覆盖默认过滤规则。

use std::io::IsTerminal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Request spans at debug, provider client chatter silenced.
const DEFAULT_FILTER: &str = "info,tower_http=debug,hyper=warn,reqwest=warn";

pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(std::io::stdout().is_terminal());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
