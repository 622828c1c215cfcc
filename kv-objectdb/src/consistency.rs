//! 最终一致性等待。仅用于让测试断言确定化，生产逻辑不应依赖。

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use crate::{Entity, config::WaitConfig, db::ObjectDb, error::Error, store::StoreClient};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// 真实时间
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// 虚拟时间：`sleep` 只推进时钟，不真正等待
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    state: Arc<Mutex<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    elapsed: Duration,
    sleeps: usize,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Arc::default(),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed += duration;
    }

    pub fn elapsed(&self) -> Duration {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed
    }

    pub fn sleeps(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sleeps
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.elapsed += duration;
        state.sleeps += 1;
    }
}

/// 轮询 `predicate` 直到为真；累计耗时超过 `timeout` 后返回 `Error::Timeout`。
/// 谓词自身的错误直接返回。
pub async fn await_until<C, F, Fut>(
    clock: &C,
    timeout: Duration,
    poll_interval: Duration,
    mut predicate: F,
) -> Result<(), Error>
where
    C: Clock,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, Error>>,
{
    let start = clock.now();
    loop {
        if predicate().await? {
            return Ok(());
        }
        let elapsed = clock.now().saturating_duration_since(start);
        if elapsed > timeout {
            log::warn!("condition not met after {:?}", elapsed);
            return Err(Error::Timeout(timeout));
        }
        clock.sleep(poll_interval).await;
    }
}

/// 等到 `T` 至少有一条记录对查询可见
pub async fn wait_for_eventual_save<T, S, C>(
    db: &ObjectDb<S>,
    clock: &C,
    config: WaitConfig,
) -> Result<(), Error>
where
    T: Entity,
    S: StoreClient,
    C: Clock,
{
    await_until(clock, config.timeout, config.poll_interval, move || async move {
        Ok(db.find_one::<T>().await?.is_some())
    })
    .await
}

/// 等到 `T` 的记录对查询全部不可见
pub async fn wait_for_eventual_delete<T, S, C>(
    db: &ObjectDb<S>,
    clock: &C,
    config: WaitConfig,
) -> Result<(), Error>
where
    T: Entity,
    S: StoreClient,
    C: Clock,
{
    await_until(clock, config.timeout, config.poll_interval, move || async move {
        Ok(db.find_one::<T>().await?.is_none())
    })
    .await
}
