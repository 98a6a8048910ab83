/// Plain-text `/metrics` endpoint serving the latest snapshot on request
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::info;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::aggregator::ConditionsAggregator;
use crate::models::CurrentConditions;

/// Render a snapshot as `name value` lines
///
/// A measurement group that has never been received produces no lines.
pub fn render_metrics(conditions: &CurrentConditions) -> String {
    let mut out = String::new();

    if conditions.temp_humidity_at.is_some() {
        let _ = writeln!(out, "temperature {:.6}", conditions.temp_f);
        let _ = writeln!(out, "humidity {:.6}", conditions.humidity_pct);
    }
    if conditions.wind_rain_at.is_some() {
        let _ = writeln!(out, "rain_in {:.6}", conditions.rain_in_delta);
        let _ = writeln!(out, "wind_direction {:.6}", conditions.wind_dir_deg);
        let _ = writeln!(out, "wind_speed {:.6}", conditions.wind_speed_kmh);
    }
    if conditions.timestamp.is_some() {
        let _ = writeln!(out, "battery_ok {}", conditions.battery_ok);
    }

    out
}

async fn metrics_handler(State(aggregator): State<Arc<ConditionsAggregator>>) -> impl IntoResponse {
    let body = render_metrics(&aggregator.snapshot());
    ([(header::CONTENT_TYPE, "text/plain")], body)
}

async fn log_request(ConnectInfo(remote): ConnectInfo<SocketAddr>, req: Request, next: Next) -> Response {
    let agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    info!("{} {} {}", req.uri(), remote, agent);
    next.run(req).await
}

pub fn router(aggregator: Arc<ConditionsAggregator>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(log_request))
        .with_state(aggregator)
}

/// Bind the metrics listener up front so a bad address fails startup
pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP Listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Serve `/metrics` on `listener` until the task is dropped
pub async fn serve(listener: TcpListener, aggregator: Arc<ConditionsAggregator>) -> std::io::Result<()> {
    axum::serve(
        listener,
        router(aggregator).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MeasurementEvent, TempHumidity};
    use crate::utils::test_support::ManualClock;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::StatusCode;
    use time::macros::datetime;
    use tower::ServiceExt;

    fn test_router(aggregator: Arc<ConditionsAggregator>) -> Router {
        router(aggregator).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(uri)
            .header(header::USER_AGENT, "prometheus/2.45")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn renders_nothing_before_first_event() {
        assert_eq!(render_metrics(&CurrentConditions::default()), "");
    }

    #[test]
    fn renders_received_groups() {
        let t = datetime!(2025-08-03 21:52:39 UTC);
        let conditions = CurrentConditions {
            timestamp: Some(t),
            temp_f: 69.1,
            humidity_pct: 97.0,
            battery_ok: 1,
            wind_speed_kmh: 0.0,
            wind_dir_deg: 157.5,
            rain_in_delta: 0.25,
            temp_humidity_at: Some(t),
            wind_rain_at: Some(t),
        };

        let text = render_metrics(&conditions);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "temperature 69.100000",
                "humidity 97.000000",
                "rain_in 0.250000",
                "wind_direction 157.500000",
                "wind_speed 0.000000",
                "battery_ok 1",
            ]
        );
    }

    #[test]
    fn omits_wind_and_rain_until_received() {
        let t = datetime!(2025-08-03 21:51:44 UTC);
        let conditions = CurrentConditions {
            timestamp: Some(t),
            temp_f: 50.0,
            humidity_pct: 40.0,
            battery_ok: 0,
            temp_humidity_at: Some(t),
            ..Default::default()
        };

        let text = render_metrics(&conditions);
        assert!(text.contains("temperature 50.000000"));
        assert!(!text.contains("rain_in"));
        assert!(text.contains("battery_ok 0"));
    }

    #[tokio::test]
    async fn metrics_route_serves_current_snapshot() {
        let t = datetime!(2025-08-03 21:51:44 UTC);
        let aggregator = Arc::new(ConditionsAggregator::new(Arc::new(ManualClock::new(t))));
        aggregator.apply(MeasurementEvent::TempHumidity(TempHumidity {
            timestamp: t,
            temp_f: 69.1,
            humidity_pct: 97.0,
            battery_ok: 1,
        }));

        let response = test_router(aggregator)
            .oneshot(get_request("/metrics"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("temperature 69.100000"));
        assert!(text.contains("humidity 97.000000"));
        assert!(!text.contains("wind_speed"));
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let t = datetime!(2025-08-03 21:51:44 UTC);
        let aggregator = Arc::new(ConditionsAggregator::new(Arc::new(ManualClock::new(t))));

        let response = test_router(aggregator)
            .oneshot(get_request("/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bind_reports_address_in_use() {
        let first = bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
        let taken = first.local_addr().unwrap();
        assert!(bind(taken).await.is_err());
    }
}
