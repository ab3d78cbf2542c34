use super::ui;
use crate::core::ValuationReport;
use comfy_table::Cell;
use std::path::Path;

const DISCLAIMER: &str = "Estimates only: AUM = price x shares outstanding. \
Shares come from the overrides file or provider fundamentals and may lag the \
fund's own disclosures.";

pub const AS_OF_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

impl ValuationReport {
    pub fn display_as_table(&self, title: &str, overrides_path: &Path) -> String {
        let mut table = ui::new_styled_table();

        table.set_header(vec![
            ui::header_cell("Ticker"),
            ui::header_cell("Price"),
            ui::header_cell("Shares Outstanding"),
            ui::header_cell("Estimated AUM"),
            ui::header_cell("Source"),
        ]);

        for row in &self.rows {
            let source = match (&row.price_source, &row.shares_source) {
                (Some(price), Some(shares)) => format!("{price}; {shares}"),
                (Some(price), None) => price.to_string(),
                (None, Some(shares)) => shares.to_string(),
                (None, None) => ui::ABSENT.to_string(),
            };

            table.add_row(vec![
                Cell::new(row.ticker.as_str()),
                ui::format_optional_cell(row.price, |p| ui::format_money(p, 2)),
                ui::format_optional_cell(row.shares, ui::format_count),
                ui::format_optional_cell(row.aum, |v| ui::format_money(v, 0)),
                Cell::new(ui::style_text(&source, ui::StyleType::Subtle)),
            ]);
        }

        let mut output = format!("{}\n\n", ui::style_text(title, ui::StyleType::Title));

        output.push_str(&format!(
            "{} {}\n",
            ui::style_text("Total Estimated AUM:", ui::StyleType::TotalLabel),
            ui::style_text(
                &ui::format_money(self.portfolio_total, 0),
                ui::StyleType::TotalValue
            )
        ));
        output.push_str(&format!(
            "{}\n\n",
            ui::style_text(
                &format!(
                    "Tracked ETFs: {} • As of {}",
                    self.tracked_count,
                    self.generated_at.format(AS_OF_FORMAT)
                ),
                ui::StyleType::Subtle
            )
        ));

        output.push_str(&table.to_string());

        if !self.tickers_missing_shares.is_empty() {
            let missing: Vec<&str> = self
                .tickers_missing_shares
                .iter()
                .map(|t| t.as_str())
                .collect();
            output.push_str(&format!(
                "\n\n{}",
                ui::style_text(
                    &format!(
                        "Missing shares outstanding for: {}. Add them to {} to include them in the total.",
                        missing.join(", "),
                        overrides_path.display()
                    ),
                    ui::StyleType::Warning
                )
            ));
        }

        output.push_str(&format!(
            "\n\n{}",
            ui::style_text(DISCLAIMER, ui::StyleType::Subtle)
        ));

        output
    }
}

#[cfg(test)]
mod tests {
    use crate::core::resolver::{PriceSource, SharesSource};
    use crate::core::{Valuation, ValuationRow};
    use chrono::{DateTime, Utc};
    use std::path::Path;

    fn report(missing: bool) -> crate::core::ValuationReport {
        let mut rows = vec![ValuationRow {
            ticker: "LRGC".parse().unwrap(),
            price: Some(38.5),
            shares: Some(1_250_000),
            aum: Some(48_125_000.0),
            price_source: Some(PriceSource::Quote("regularMarketPrice")),
            shares_source: Some(SharesSource::Override),
        }];
        if missing {
            rows.push(ValuationRow {
                ticker: "ILOW".parse().unwrap(),
                price: Some(20.0),
                shares: None,
                aum: None,
                price_source: Some(PriceSource::IntradayBar),
                shares_source: None,
            });
        }
        let missing_shares = rows
            .iter()
            .filter(|r| r.shares.is_none())
            .map(|r| r.ticker.clone())
            .collect();
        let at = DateTime::parse_from_rfc3339("2024-07-01T14:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Valuation {
            rows,
            total: 48_125_000.0,
            missing_shares,
        }
        .into_report(at, chrono_tz::America::New_York)
    }

    #[test]
    fn test_table_contains_rows_total_and_timestamp() {
        let output = console::strip_ansi_codes(
            &report(false).display_as_table("My ETFs", Path::new("shares.csv")),
        )
        .to_string();

        assert!(output.contains("My ETFs"));
        assert!(output.contains("$48,125,000"));
        assert!(output.contains("$38.50"));
        assert!(output.contains("1,250,000"));
        assert!(output.contains("Tracked ETFs: 1"));
        assert!(output.contains("2024-07-01 10:30:00 EDT"));
        assert!(!output.contains("Missing shares"));
        assert!(output.contains("Estimates only"));
    }

    #[test]
    fn test_table_warns_about_missing_shares() {
        let output = console::strip_ansi_codes(
            &report(true).display_as_table("My ETFs", Path::new("shares.csv")),
        )
        .to_string();

        assert!(output.contains("Missing shares outstanding for: ILOW"));
        assert!(output.contains("shares.csv"));
        assert!(output.contains("–"));
        assert!(output.contains("last 1m bar"));
    }
}
