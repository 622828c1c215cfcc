use std::time::Duration;

pub const PD_ENDPOINTS_ENV: &str = "OBJECTDB_PD_ENDPOINTS";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TikvConfig {
    pub pd_endpoints: Vec<String>,
}

impl TikvConfig {
    pub fn new(pd_endpoints: Vec<String>) -> Self {
        Self { pd_endpoints }
    }

    /// 从 `OBJECTDB_PD_ENDPOINTS` 读取，逗号分隔
    pub fn from_env() -> Option<Self> {
        std::env::var(PD_ENDPOINTS_ENV)
            .ok()
            .map(|value| Self::parse(&value))
            .filter(|config| !config.pd_endpoints.is_empty())
    }

    fn parse(value: &str) -> Self {
        Self {
            pd_endpoints: value
                .split(',')
                .map(str::trim)
                .filter(|endpoint| !endpoint.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// 最终一致性等待参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        }
    }
}
