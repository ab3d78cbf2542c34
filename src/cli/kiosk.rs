use super::dashboard::AS_OF_FORMAT;
use super::ui;
use crate::core::ValuationReport;

const VERTICAL_PADDING: usize = 3;

impl ValuationReport {
    /// Big-number view: only the centered total and a caption.
    pub fn display_as_kiosk(&self, width: usize) -> String {
        let total = ui::style_text(
            &ui::format_money(self.portfolio_total, 0),
            ui::StyleType::TotalValue,
        );
        let caption = ui::style_text(
            &format!(
                "As of {} • {} ETFs",
                self.generated_at.format(AS_OF_FORMAT),
                self.tracked_count
            ),
            ui::StyleType::Subtle,
        );

        let padding = "\n".repeat(VERTICAL_PADDING);
        format!(
            "{padding}{}\n\n{}{padding}",
            ui::center(&total, width),
            ui::center(&caption, width)
        )
    }
}
