use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use http::Extensions;
use reqwest::{Client, Request, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use tracing::{debug, error, warn};

/// 599 is not a real HTTP status; it's the synthetic response this retry
/// wrapper hands back once all attempts are exhausted, so callers always see
/// a `Response` rather than having to special-case a transport error.
const SYNTHETIC_EXHAUSTED_STATUS: u16 = 599;
const MAX_ATTEMPTS: u32 = 4;
const BASELINE_BACKOFF: Duration = Duration::from_millis(350);

pub fn create_client(maybe_bearer_token: Option<String>) -> ClientWithMiddleware {
    let reqwest_client = Client::builder().build().expect("reqwest client builds");

    let limiter = RateLimiter::direct(Quota::per_second(NonZeroU32::new(2).unwrap()));

    let mut client_builder = ClientBuilder::new(reqwest_client)
        .with(RetryWithRateLimitMiddleware { limiter: Arc::new(limiter) })
        .with(ErrorLoggingMiddleware);

    if let Some(token) = maybe_bearer_token {
        client_builder = client_builder.with(AuthenticatedHeaderMiddleware::new(token));
    }

    client_builder.build()
}

struct AuthenticatedHeaderMiddleware {
    bearer_token: String,
}

impl AuthenticatedHeaderMiddleware {
    pub fn new(bearer_token: String) -> Self {
        Self { bearer_token }
    }
}

#[async_trait::async_trait]
impl Middleware for AuthenticatedHeaderMiddleware {
    async fn handle(&self, mut req: Request, extensions: &mut Extensions, next: Next<'_>) -> reqwest_middleware::Result<Response> {
        req.headers_mut().insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", self.bearer_token).parse().unwrap(),
        );
        next.run(req, extensions).await
    }
}

/// Implements the retry contract directly (spec §6/§7) rather than
/// `reqwest-retry`'s generic `ExponentialBackoff` policy: up to 4 attempts
/// total, a 429 waits `retryAfter + 0.35s`, any other retryable failure
/// waits a flat 0.35s, and exhausting all attempts returns a synthetic 599
/// instead of propagating a transport error.
struct RetryWithRateLimitMiddleware {
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl RetryWithRateLimitMiddleware {
    fn is_retryable(resp: &Result<Response, reqwest_middleware::Error>) -> bool {
        match resp {
            Ok(r) => r.status().is_server_error() || r.status() == StatusCode::TOO_MANY_REQUESTS,
            Err(_) => true,
        }
    }

    fn retry_after(resp: &Response) -> Option<Duration> {
        resp.headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok())
            .map(Duration::from_secs_f64)
    }
}

#[async_trait::async_trait]
impl Middleware for RetryWithRateLimitMiddleware {
    async fn handle(&self, req: Request, extensions: &mut Extensions, next: Next<'_>) -> reqwest_middleware::Result<Response> {
        let mut attempt = 1;
        let mut current = req;

        loop {
            self.limiter.until_ready().await;

            // stash a clone for the next attempt before handing `current` to `next`
            let replay = current.try_clone();
            let result = next.clone().run(current, extensions).await;

            let retryable = Self::is_retryable(&result);
            if !retryable {
                return result;
            }
            if attempt >= MAX_ATTEMPTS {
                return match result {
                    Ok(resp) => Ok(resp),
                    Err(e) => Ok(synthetic_exhausted_response(&e)),
                };
            }

            let Some(next_req) = replay else {
                // body can't be replayed (e.g. a stream) — surface what we have
                return result;
            };

            let wait = match &result {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    Self::retry_after(resp).unwrap_or(Duration::ZERO) + BASELINE_BACKOFF
                }
                _ => BASELINE_BACKOFF,
            };
            warn!("attempt {attempt}/{MAX_ATTEMPTS} retryable failure, waiting {wait:?} before retry");
            tokio::time::sleep(wait).await;

            attempt += 1;
            current = next_req;
        }
    }
}

/// Turns a transport-level retry exhaustion into a synthetic 599 response so
/// `StClient` only ever has to branch on status codes, never on transport errors.
fn synthetic_exhausted_response(cause: &reqwest_middleware::Error) -> Response {
    let body = format!("retries exhausted: {cause}");
    let http_resp = http::Response::builder()
        .status(SYNTHETIC_EXHAUSTED_STATUS)
        .body(body)
        .expect("status/body are always valid");
    Response::from(http_resp)
}

pub struct ErrorLoggingMiddleware;

#[async_trait::async_trait]
impl Middleware for ErrorLoggingMiddleware {
    async fn handle(&self, req: Request, extensions: &mut Extensions, next: Next<'_>) -> reqwest_middleware::Result<Response> {
        let start = Instant::now();
        let method = req.method().clone();
        let url = req.url().clone();

        let result = next.run(req, extensions).await;
        let duration = start.elapsed();

        match &result {
            Ok(resp) if !resp.status().is_success() => {
                let status = resp.status();
                match status {
                    StatusCode::TOO_MANY_REQUESTS => {
                        debug!("request rate-limited: {method} {url} - {status}, duration {duration:?}");
                    }
                    _ => error!("request failed: {method} {url} - {status}, duration {duration:?}"),
                }
            }
            Err(e) => error!("request error: {method} {url} - {e}, duration {duration:?}"),
            _ => debug!("request succeeded: {method} {url} - duration {duration:?}"),
        }

        result
    }
}
