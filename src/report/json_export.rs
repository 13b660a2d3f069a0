use crate::domain::{ExtractedInvoice, ReportKind};
use crate::utils::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct JsonExport<'a> {
    report: ReportKind,
    generated_at: String,
    invoices: &'a [ExtractedInvoice],
}

/// Every extracted invoice with its line items and validation issues, pretty printed.
pub fn to_json(kind: ReportKind, invoices: &[ExtractedInvoice]) -> Result<Vec<u8>> {
    let export = JsonExport {
        report: kind,
        generated_at: chrono::Local::now().to_rfc3339(),
        invoices,
    };
    Ok(serde_json::to_vec_pretty(&export)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Invoice, Issue, LineItem, TextSource};

    #[test]
    fn test_to_json() {
        let invoices = vec![ExtractedInvoice {
            invoice: Invoice::new("a.pdf"),
            items: vec![LineItem {
                name: "Phở bò".into(),
                quantity: "2".into(),
                unit_price: "50.000".into(),
                amount: "100.000".into(),
                tax_rate: None,
            }],
            issues: vec![Issue::warning("Ký hiệu", "Thiếu ký hiệu")],
            source: TextSource::Embedded,
        }];
        let bytes = to_json(ReportKind::Summary, &invoices).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["report"], "summary");
        assert_eq!(value["invoices"][0]["invoice"]["file_name"], "a.pdf");
        assert_eq!(value["invoices"][0]["items"][0]["name"], "Phở bò");
        assert_eq!(value["invoices"][0]["issues"][0]["field"], "Ký hiệu");
    }
}
