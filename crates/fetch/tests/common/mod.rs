#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use marketgate_fetch::{
    AttemptRecord, AttemptTarget, FetchContext, FetchRequest, Manager, ManagerBuilder, Markets,
    Provider, ProviderError, RequestHint, Trace,
};

#[derive(Clone, Debug)]
pub struct BarsRequest {
    pub symbol: String,
    pub market: Option<&'static str>,
}

impl BarsRequest {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            market: None,
        }
    }

    pub fn on(symbol: &str, market: &'static str) -> Self {
        Self {
            symbol: symbol.to_string(),
            market: Some(market),
        }
    }

    pub fn key(&self) -> String {
        self.cache_key()
    }
}

impl FetchRequest for BarsRequest {
    fn cache_key(&self) -> String {
        format!("bars:{}", self.symbol)
    }

    fn hint(&self) -> RequestHint<'_> {
        RequestHint {
            market: self.market,
            symbol: Some(self.symbol.as_str()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bars {
    pub provider: String,
    pub symbol: String,
    /// Incremented on every successful call to the provider.
    pub version: u64,
}

/// Provider double that counts calls and answers with a configurable outcome.
pub struct FakeProvider {
    name: &'static str,
    outcome: Mutex<Result<(), ProviderError>>,
    delay: Duration,
    markets: Markets,
    with_trace: bool,
    calls: AtomicUsize,
    cancelled: AtomicUsize,
    version: AtomicU64,
}

impl FakeProvider {
    pub fn ok(name: &'static str) -> Self {
        Self {
            name,
            outcome: Mutex::new(Ok(())),
            delay: Duration::ZERO,
            markets: Markets::any(),
            with_trace: true,
            calls: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
            version: AtomicU64::new(0),
        }
    }

    pub fn failing(name: &'static str, error: ProviderError) -> Self {
        let provider = Self::ok(name);
        provider.set_outcome(Err(error));
        provider
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_markets(mut self, markets: Markets) -> Self {
        self.markets = markets;
        self
    }

    pub fn without_trace(mut self) -> Self {
        self.with_trace = false;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn set_outcome(&self, outcome: Result<(), ProviderError>) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that stopped because their context was cancelled.
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider<BarsRequest, Bars> for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn supported_markets(&self) -> Markets {
        self.markets
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        request: &BarsRequest,
    ) -> (Result<Bars, ProviderError>, Option<Trace>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let trace = Trace::new(self.name);
        let target = AttemptTarget::get(format!(
            "https://{}.test/bars/{}",
            self.name.to_lowercase(),
            request.symbol
        ));
        let started = Instant::now();

        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = ctx.done() => {
                    self.cancelled.fetch_add(1, Ordering::SeqCst);
                    trace.add_attempt(AttemptRecord::error(target, "canceled", started.elapsed()));
                    trace.finish();
                    return (Err(ProviderError::Canceled), Some(trace));
                }
            }
        }

        let outcome = self.outcome.lock().unwrap().clone();
        let result = match outcome {
            Ok(()) => {
                trace.add_attempt(AttemptRecord::response(target, 200, 256, started.elapsed()));
                Ok(Bars {
                    provider: self.name.to_string(),
                    symbol: request.symbol.clone(),
                    version: self.version.fetch_add(1, Ordering::SeqCst) + 1,
                })
            }
            Err(error) => {
                trace.add_attempt(AttemptRecord::response(target, 503, 0, started.elapsed()));
                Err(error)
            }
        };
        trace.finish();

        (result, self.with_trace.then_some(trace))
    }
}

pub fn builder() -> ManagerBuilder<BarsRequest, Bars> {
    Manager::builder()
}

/// Poll `check` every few milliseconds until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
