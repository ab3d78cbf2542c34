use aumdash::core::config::AppConfig;
use aumdash::{AppCommand, ViewArgs};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::info;

// Adds automatic logging to test
mod test_utils {
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn mount_chart(
        server: &MockServer,
        symbol: &str,
        interval: &str,
        meta: serde_json::Value,
        closes: &[Option<f64>],
    ) {
        let timestamps: Vec<i64> = (0..closes.len() as i64)
            .map(|i| 1_719_842_400 + i * 60)
            .collect();
        let body = json!({
            "chart": {
                "result": [{
                    "meta": meta,
                    "timestamp": timestamps,
                    "indicators": {"quote": [{"close": closes}]}
                }]
            }
        });
        Mock::given(method("GET"))
            .and(path(format!("/v8/finance/chart/{symbol}")))
            .and(query_param("interval", interval))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    pub async fn mount_fundamentals(server: &MockServer, symbol: &str, stats: serde_json::Value) {
        let body = json!({
            "quoteSummary": {
                "result": [{"defaultKeyStatistics": stats}],
                "error": null
            }
        });
        Mock::given(method("GET"))
            .and(path(format!("/v10/finance/quoteSummary/{symbol}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    /// Three funds, each resolving through a different path.
    pub async fn create_mock_server() -> MockServer {
        let server = MockServer::start().await;

        mount_chart(&server, "LRGC", "1d", json!({"regularMarketPrice": 40.0}), &[]).await;

        mount_chart(&server, "HIDV", "1d", json!({"currency": "USD"}), &[]).await;
        mount_chart(
            &server,
            "HIDV",
            "1m",
            json!({}),
            &[Some(30.0), Some(31.0), None],
        )
        .await;
        mount_fundamentals(
            &server,
            "HIDV",
            json!({"sharesOutstanding": {"raw": 2000, "fmt": "2k"}}),
        )
        .await;

        mount_chart(&server, "ILOW", "1d", json!({"lastPrice": 25.0}), &[]).await;
        mount_fundamentals(
            &server,
            "ILOW",
            json!({"totalAssets": {"raw": 50_000.0, "fmt": "50k"}}),
        )
        .await;

        server
    }

    pub fn write_config(dir: &TempDir, tickers: &str, base_url: &str, overrides: &str) -> PathBuf {
        fs::write(dir.path().join("overrides.csv"), overrides).expect("Failed to write overrides");
        let config_path = dir.path().join("config.yaml");
        let config_content = format!(
            r#"
            tickers: {tickers}
            overrides_path: overrides.csv
            providers:
              yahoo:
                base_url: {base_url}
                cookie_url: null
                timeout_secs: 5
            data_path: {}
        "#,
            dir.path().join("data").display()
        );
        fs::write(&config_path, config_content).expect("Failed to write config file");
        config_path
    }
}

fn summary_args(json: bool) -> AppCommand {
    AppCommand::Summary(ViewArgs {
        json,
        ..ViewArgs::default()
    })
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let mock_server = test_utils::create_mock_server().await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = test_utils::write_config(
        &dir,
        "[LRGC, HIDV, ILOW]",
        &mock_server.uri(),
        "ticker,shares_outstanding\nlrgc,1000\n",
    );

    let config = AppConfig::load_from_path(&config_path).expect("Failed to load config");
    let session = aumdash::cli::Session::from_config(&config).expect("Failed to build session");
    let report = session.refresh(false).await;
    info!(?report, "Valuation report");

    let aums: Vec<Option<f64>> = report.rows.iter().map(|r| r.aum).collect();
    assert_eq!(aums, vec![Some(40_000.0), Some(62_000.0), Some(50_000.0)]);
    assert_eq!(report.rows[1].price, Some(31.0));
    assert_eq!(report.rows[2].shares, Some(2000));
    assert_eq!(report.portfolio_total, 152_000.0);
    assert_eq!(report.tracked_count, 3);
    assert!(report.tickers_missing_shares.is_empty());
    drop(session);

    for json in [true, false] {
        let result =
            aumdash::run_command(summary_args(json), Some(config_path.to_str().unwrap())).await;
        assert!(
            result.is_ok(),
            "Main function failed with: {:?}",
            result.err()
        );
    }
}

#[test_log::test(tokio::test)]
async fn test_malformed_overrides_fall_back_to_provider_data() {
    let mock_server = test_utils::create_mock_server().await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = test_utils::write_config(
        &dir,
        "[LRGC, ILOW]",
        &mock_server.uri(),
        "ticker,shares_outstanding\nLRGC,lots\n",
    );

    let config = AppConfig::load_from_path(&config_path).unwrap();
    let session = aumdash::cli::Session::from_config(&config).unwrap();
    let report = session.refresh(false).await;

    assert_eq!(report.rows[0].price, Some(40.0));
    assert_eq!(report.rows[0].aum, None);
    assert_eq!(report.portfolio_total, 50_000.0);
    let missing: Vec<&str> = report
        .tickers_missing_shares
        .iter()
        .map(|t| t.as_str())
        .collect();
    assert_eq!(missing, vec!["LRGC"]);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["rows"][0]["aum"], serde_json::Value::Null);
}

#[test_log::test(tokio::test)]
async fn test_unreachable_provider_still_reports_every_ticker() {
    let mock_server = wiremock::MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config_path = test_utils::write_config(
        &dir,
        "[LRGC, HIDV]",
        &mock_server.uri(),
        "ticker,shares_outstanding\nHIDV,500\n",
    );

    let config = AppConfig::load_from_path(&config_path).unwrap();
    let session = aumdash::cli::Session::from_config(&config).unwrap();
    let report = session.refresh(false).await;

    assert_eq!(report.rows.len(), 2);
    assert!(report.rows.iter().all(|r| r.price.is_none() && r.aum.is_none()));
    assert_eq!(report.rows[1].shares, Some(500));
    assert_eq!(report.portfolio_total, 0.0);
}

#[test_log::test(tokio::test)]
async fn test_empty_universe_fails() {
    let dir = TempDir::new().unwrap();
    let config_path =
        test_utils::write_config(&dir, "[]", "http://127.0.0.1:9", "ticker,shares_outstanding\n");

    let result = aumdash::run_command(summary_args(false), Some(config_path.to_str().unwrap())).await;
    assert!(result.is_err());
}

#[test_log::test(tokio::test)]
async fn test_invalid_ticker_fails() {
    let dir = TempDir::new().unwrap();
    let config_path = test_utils::write_config(
        &dir,
        "[\"NOT A TICKER\"]",
        "http://127.0.0.1:9",
        "ticker,shares_outstanding\n",
    );

    let result = aumdash::run_command(summary_args(true), Some(config_path.to_str().unwrap())).await;
    assert!(result.is_err());
}

#[test_log::test(tokio::test)]
async fn test_template_command_writes_every_ticker() {
    let dir = TempDir::new().unwrap();
    let config_path = test_utils::write_config(
        &dir,
        "[LRGC, HIDV, lrgc]",
        "http://127.0.0.1:9",
        "ticker,shares_outstanding\n",
    );
    let output: PathBuf = dir.path().join("template.csv");

    let result = aumdash::run_command(
        AppCommand::Template {
            output: Some(output.clone()),
        },
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Template failed with: {:?}", result.err());

    let content = fs::read_to_string(&output).unwrap();
    assert_eq!(content, "ticker,shares_outstanding\nLRGC,0\nHIDV,0\n");
}
