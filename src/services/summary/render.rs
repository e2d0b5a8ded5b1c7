//! Summary Report Rendering
//!
//! Dark-theme HTML rendering of a [`SummaryReport`] for delivery through
//! the notification channel. The aggregator only guarantees the
//! structured data; this is presentation.

use super::aggregator::SummaryReport;

const STYLE: &str = "
body { background-color: #0f1724; color: #e6eef8; \
font-family: -apple-system,'Segoe UI',Roboto,Arial; padding: 20px; }
.card { background: #111827; border-radius: 12px; padding: 18px; }
h1 { margin: 0 0 10px 0; font-size: 20px; }
.meta { color: #9fb3d6; font-size: 13px; margin-bottom: 12px; }
table { width: 100%; border-collapse: collapse; margin-top: 12px; }
th { text-align: left; padding: 10px; font-size: 13px; color: #cfe6ff; \
border-bottom: 1px solid rgba(255,255,255,0.06); }
td { padding: 10px; font-size: 13px; \
border-bottom: 1px dashed rgba(255,255,255,0.03); }
.ok { background: rgba(16,185,129,0.12); color: #a7f3d0; \
padding: 4px 10px; border-radius: 999px; font-weight: 600; }
.err { background: rgba(239,68,68,0.12); color: #fecaca; \
padding: 4px 10px; border-radius: 999px; font-weight: 600; }
.footer { margin-top: 14px; color: #93b0d6; font-size: 12px; }
";

/// Render a report as a standalone HTML document.
pub fn render_html(report: &SummaryReport) -> String {
    let mut rows_html = String::new();
    for row in &report.rows {
        let badge = if row.is_success() {
            "<span class='ok'>OK</span>"
        } else {
            "<span class='err'>ERROR</span>"
        };
        let status = row
            .status
            .as_deref()
            .unwrap_or_else(|| row.outcome_label())
            .replace('\n', " ");
        rows_html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            row.timestamp.format("%Y-%m-%d %H:%M:%S"),
            escape(&row.display_name),
            escape(status.trim()),
            badge,
        ));
    }
    if report.rows.is_empty() {
        rows_html.push_str(
            "<tr><td colspan='4' style='color:#9fb3d6;padding:12px;'>\
             No activity recorded in this window.</td></tr>",
        );
    }

    format!(
        "<html><head><meta charset=\"utf-8\"><style>{style}</style></head><body>\n\
         <div class=\"card\">\n\
         <h1>Monitoring summary</h1>\n\
         <div class=\"meta\">Window {start} &mdash; {end} &middot; \
         Accounts: {accounts} &middot; Attempts: {attempts} &middot; \
         Errors: {errors}</div>\n\
         <table>\n\
         <thead><tr><th>Time</th><th>Account</th><th>Status</th>\
         <th>Result</th></tr></thead>\n\
         <tbody>\n{rows}</tbody>\n\
         </table>\n\
         <div class=\"footer\">Sent by portal-sentinel &middot; {end}</div>\n\
         </div>\n\
         </body></html>",
        style = STYLE,
        start = report.window_start.format("%Y-%m-%d %H:%M:%S"),
        end = report.window_end.format("%Y-%m-%d %H:%M:%S"),
        accounts = report.totals.accounts,
        attempts = report.totals.attempts,
        errors = report.totals.errors,
        rows = rows_html,
    )
}

impl super::aggregator::SummaryRow {
    /// Human-readable label when no status text was extracted.
    pub fn outcome_label(&self) -> &'static str {
        use crate::models::account::AttemptOutcome::*;
        match self.outcome {
            Success => "OK",
            NavigationFailed => "navigation failed",
            CaptureFailed => "challenge capture failed",
            RecognitionFailed => "challenge recognition failed",
            InteractionFailed => "portal interaction failed",
            ServerRejectedChallenge => "challenge rejected by server",
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
