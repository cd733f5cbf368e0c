//! Fixed-width receipt renderer.
//!
//! Pure rendering: invoice + line items + payment in, bytes out. Layout
//! targets 42-column thermal paper.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Default paper width in characters (80mm thermal roll).
pub const DEFAULT_WIDTH: usize = 42;

#[derive(Debug, Clone)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone)]
pub struct ReceiptPayment {
    pub method: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct ReceiptData {
    pub invoice_number: String,
    pub issued_at: DateTime<Utc>,
    pub order_type: String,
    pub table_name: Option<String>,
    pub lines: Vec<ReceiptLine>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub payment: Option<ReceiptPayment>,
}

pub struct ReceiptRenderer {
    width: usize,
}

impl ReceiptRenderer {
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    /// Renders the receipt to bytes: header, line items, totals block,
    /// payment line, footer.
    pub fn render(&self, data: &ReceiptData) -> Vec<u8> {
        let mut out = String::new();

        out.push_str(&self.center("RECEIPT"));
        out.push('\n');
        out.push_str(&self.center(&data.invoice_number));
        out.push('\n');
        out.push_str(&self.center(&data.issued_at.format("%Y-%m-%d %H:%M").to_string()));
        out.push('\n');

        let seating = match &data.table_name {
            Some(name) => name.clone(),
            None => data.order_type.clone(),
        };
        out.push_str(&self.center(&seating));
        out.push('\n');
        out.push_str(&self.separator('='));
        out.push('\n');

        for line in &data.lines {
            let left = format!("{} x {}", line.quantity, line.name);
            let right = format!("{:.2}", line.line_total);
            out.push_str(&self.two_columns(&left, &right));
            out.push('\n');
            if line.quantity > 1 {
                out.push_str(&format!("    @ {:.2}\n", line.unit_price));
            }
        }

        out.push_str(&self.separator('-'));
        out.push('\n');
        out.push_str(&self.two_columns("Subtotal", &format!("{:.2}", data.subtotal)));
        out.push('\n');
        if data.discount > Decimal::ZERO {
            out.push_str(&self.two_columns("Discount", &format!("-{:.2}", data.discount)));
            out.push('\n');
        }
        out.push_str(&self.two_columns("TOTAL", &format!("{:.2}", data.total)));
        out.push('\n');

        if let Some(payment) = &data.payment {
            out.push_str(&self.two_columns(
                &format!("Paid ({})", payment.method),
                &format!("{:.2}", payment.amount),
            ));
            out.push('\n');
        }

        out.push_str(&self.separator('='));
        out.push('\n');
        out.push_str(&self.center("Thank you!"));
        out.push('\n');

        out.into_bytes()
    }

    fn center(&self, text: &str) -> String {
        let text = self.truncate(text);
        let padding = self.width.saturating_sub(text.chars().count()) / 2;
        format!("{}{}", " ".repeat(padding), text)
    }

    fn separator(&self, ch: char) -> String {
        ch.to_string().repeat(self.width)
    }

    /// Left text, right-aligned value. The left side is truncated to
    /// keep the amount column intact.
    fn two_columns(&self, left: &str, right: &str) -> String {
        let right_len = right.chars().count();
        let max_left = self.width.saturating_sub(right_len + 1);
        let left: String = left.chars().take(max_left).collect();
        let gap = self.width - left.chars().count() - right_len;
        format!("{}{}{}", left, " ".repeat(gap), right)
    }

    fn truncate(&self, text: &str) -> String {
        text.chars().take(self.width).collect()
    }
}

impl Default for ReceiptRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> ReceiptData {
        ReceiptData {
            invoice_number: "INV-AB12CD34EF".to_string(),
            issued_at: Utc::now(),
            order_type: "Takeaway".to_string(),
            table_name: Some("Table 5".to_string()),
            lines: vec![
                ReceiptLine {
                    name: "Pho Bo".to_string(),
                    quantity: 2,
                    unit_price: dec!(12.50),
                    line_total: dec!(25.00),
                },
                ReceiptLine {
                    name: "Spring Rolls".to_string(),
                    quantity: 1,
                    unit_price: dec!(6.00),
                    line_total: dec!(6.00),
                },
            ],
            subtotal: dec!(31.00),
            discount: dec!(3.10),
            total: dec!(27.90),
            payment: Some(ReceiptPayment {
                method: "Cash".to_string(),
                amount: dec!(27.90),
            }),
        }
    }

    #[test]
    fn renders_all_sections() {
        let bytes = ReceiptRenderer::default().render(&sample());
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("RECEIPT"));
        assert!(text.contains("INV-AB12CD34EF"));
        assert!(text.contains("Table 5"));
        assert!(text.contains("2 x Pho Bo"));
        assert!(text.contains("25.00"));
        assert!(text.contains("Subtotal"));
        assert!(text.contains("-3.10"));
        assert!(text.contains("27.90"));
        assert!(text.contains("Paid (Cash)"));
        assert!(text.contains("Thank you!"));
    }

    #[test]
    fn zero_discount_is_omitted() {
        let mut data = sample();
        data.discount = Decimal::ZERO;
        data.total = data.subtotal;
        let text = String::from_utf8(ReceiptRenderer::default().render(&data)).unwrap();
        assert!(!text.contains("Discount"));
    }

    #[test]
    fn no_table_falls_back_to_order_type() {
        let mut data = sample();
        data.table_name = None;
        let text = String::from_utf8(ReceiptRenderer::default().render(&data)).unwrap();
        assert!(text.contains("Takeaway"));
    }

    #[test]
    fn lines_respect_paper_width() {
        let data = sample();
        let text = String::from_utf8(ReceiptRenderer::new(32).render(&data)).unwrap();
        for line in text.lines() {
            assert!(line.chars().count() <= 32, "line too wide: {:?}", line);
        }
    }

    #[test]
    fn long_item_names_are_truncated_not_wrapped() {
        let mut data = sample();
        data.lines[0].name = "An unreasonably long dish name that keeps going".to_string();
        let text = String::from_utf8(ReceiptRenderer::default().render(&data)).unwrap();
        for line in text.lines() {
            assert!(line.chars().count() <= DEFAULT_WIDTH);
        }
        // The amount column survives truncation.
        assert!(text.contains("25.00"));
    }
}
