use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;

use super::mailer::EmailMessage;
use crate::domain::{Withdrawal, ACCOUNT_NOT_FOUND_REASON, INSUFFICIENT_BALANCE_REASON};

const STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
.container { max-width: 600px; margin: 0 auto; padding: 20px; }
.content { padding: 20px; background-color: #f8f9fa; }
.info-box { background-color: white; padding: 15px; margin: 10px 0; border-radius: 5px; }
.footer { text-align: center; padding: 20px; font-size: 12px; color: #666; }";

/// Renders the customer-facing withdrawal e-mails. Dates are shown in the
/// service's configured offset.
#[derive(Debug, Clone)]
pub struct EmailTemplates {
    offset: FixedOffset,
    brand: String,
}

impl EmailTemplates {
    pub fn new(offset: FixedOffset, brand: impl Into<String>) -> Self {
        Self {
            offset,
            brand: brand.into(),
        }
    }

    pub fn success(&self, withdrawal: &Withdrawal, to: &str) -> EmailMessage {
        let body = format!(
            "<p>Hello,</p>\n<p>Your PIX withdrawal was processed successfully.</p>\n{details}\n\
             <p>The amount will be credited to the account linked to the PIX key above.</p>",
            details = self.details(withdrawal, "Amount withdrawn"),
        );
        EmailMessage {
            to: to.to_string(),
            subject: format!("PIX withdrawal confirmed - {}", self.brand),
            html: self.page("PIX withdrawal completed", "#28a745", &body),
        }
    }

    pub fn denied(&self, withdrawal: &Withdrawal, to: &str, reason: Option<&str>) -> EmailMessage {
        let body = format!(
            "<p>Hello,</p>\n<p>Unfortunately your PIX withdrawal could not be processed.</p>\n\
             <div class='info-box' style='background-color: #f8d7da; color: #721c24;'>\
             <h3>Reason</h3><p><strong>{reason}</strong></p></div>\n{details}\n\
             <p>Please check your available balance and try again.</p>",
            reason = escape(&reason_text(reason)),
            details = self.details(withdrawal, "Amount requested"),
        );
        EmailMessage {
            to: to.to_string(),
            subject: format!("PIX withdrawal denied - {}", self.brand),
            html: self.page("PIX withdrawal denied", "#dc3545", &body),
        }
    }

    pub fn scheduled(&self, withdrawal: &Withdrawal, to: &str) -> EmailMessage {
        let when = withdrawal
            .scheduled_for
            .map(|at| self.local(at))
            .unwrap_or_default();
        let body = format!(
            "<p>Hello,</p>\n<p>Your PIX withdrawal was scheduled.</p>\n\
             <div class='info-box' style='background-color: #e3f2fd; color: #1976d2;'>\
             <h3>Scheduled for</h3><p><strong>{when}</strong></p></div>\n{details}\n\
             <p>It will be processed automatically at the scheduled time and you will be notified again.</p>",
            details = self.details(withdrawal, "Amount to withdraw"),
        );
        EmailMessage {
            to: to.to_string(),
            subject: format!("PIX withdrawal scheduled - {}", self.brand),
            html: self.page("PIX withdrawal scheduled", "#007bff", &body),
        }
    }

    fn details(&self, withdrawal: &Withdrawal, amount_label: &str) -> String {
        format!(
            "<div class='info-box'><h3>Details</h3>\
             <p><strong>Requested at:</strong> {created}</p>\
             <p><strong>{amount_label}:</strong> {amount}</p>\
             <p><strong>PIX key ({key_type}):</strong> {key}</p>\
             <p><strong>Transaction ID:</strong> {id}</p></div>",
            created = self.local(withdrawal.created_at),
            amount = format_brl(withdrawal.amount),
            key_type = withdrawal.payment_key.key_type,
            key = escape(&withdrawal.payment_key.value),
            id = withdrawal.id,
        )
    }

    fn page(&self, title: &str, color: &str, body: &str) -> String {
        format!(
            "<html>\n<head>\n<meta charset='UTF-8'>\n<title>{title}</title>\n<style>\n{STYLE}\n</style>\n</head>\n\
             <body>\n<div class='container'>\n\
             <div style='background-color: {color}; color: white; padding: 20px; text-align: center;'><h1>{title}</h1></div>\n\
             <div class='content'>\n{body}\n<p>If you have any questions, please contact us.</p>\n</div>\n\
             <div class='footer'><p>This is an automated message, please do not reply.</p><p>{brand}</p></div>\n\
             </div>\n</body>\n</html>\n",
            brand = escape(&self.brand),
        )
    }

    fn local(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format("%d/%m/%Y %H:%M:%S").to_string()
    }
}

fn reason_text(reason: Option<&str>) -> String {
    match reason {
        Some(INSUFFICIENT_BALANCE_REASON) => "Insufficient balance to complete the withdrawal".to_string(),
        Some(ACCOUNT_NOT_FOUND_REASON) => "Account not found".to_string(),
        Some(other) => other.to_string(),
        None => "Unspecified error".to_string(),
    }
}

/// `1234.5` -> `R$ 1.234,50`
fn format_brl(amount: Decimal) -> String {
    let fixed = format!("{:.2}", amount.round_dp(2));
    let (sign, fixed) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (units, cents) = fixed.split_once('.').unwrap_or((fixed, "00"));

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    format!("R$ {sign}{grouped},{cents}")
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
