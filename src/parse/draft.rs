use crate::domain::{Amounts, Category, Invoice, TaxRate};
use crate::parse::money::{format_money, parse_money, report_number};
use crate::parse::text::clean_string_value;

/// Invoice fields as raw strings while extraction rules are still running.
///
/// Rules overwrite and compare the textual values (e.g. "0" vs empty), so
/// amounts stay strings until [`FieldDraft::into_invoice`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDraft {
    pub date: String,
    pub number: String,
    pub seller: String,
    pub seller_tax_code: String,
    pub serial: String,
    pub lookup_code: String,
    pub lookup_link: String,
    pub authority_code: String,
    pub service_fee: String,
    pub before_tax: String,
    pub tax_0: String,
    pub tax_5: String,
    pub tax_8: String,
    pub tax_10: String,
    pub tax_other: String,
    pub tax_total: String,
    pub after_tax: String,
    pub category: Option<Category>,
}

impl FieldDraft {
    pub fn rate(&self, rate: TaxRate) -> &str {
        match rate {
            TaxRate::Zero => &self.tax_0,
            TaxRate::Five => &self.tax_5,
            TaxRate::Eight => &self.tax_8,
            TaxRate::Ten => &self.tax_10,
        }
    }

    pub fn rate_mut(&mut self, rate: TaxRate) -> &mut String {
        match rate {
            TaxRate::Zero => &mut self.tax_0,
            TaxRate::Five => &mut self.tax_5,
            TaxRate::Eight => &mut self.tax_8,
            TaxRate::Ten => &mut self.tax_10,
        }
    }

    /// Money value of a field, zero when empty or unparseable.
    pub fn money(value: &str) -> i64 {
        parse_money(value).unwrap_or(0)
    }

    pub fn set_money(field: &mut String, value: i64) {
        *field = format_money(value);
    }

    /// Sum of the 0/5/8/10 buckets and "Thuế khác".
    pub fn bucket_sum(&self) -> i64 {
        TaxRate::ALL
            .iter()
            .map(|rate| Self::money(self.rate(*rate)))
            .sum::<i64>()
            + Self::money(&self.tax_other)
    }

    pub fn into_invoice(self, file_name: &str) -> Invoice {
        let amount = |value: &str| report_number(&clean_string_value(value));
        Invoice {
            file_name: file_name.to_string(),
            date: clean_string_value(&self.date),
            number: clean_string_value(&self.number),
            seller: clean_string_value(&self.seller),
            category: self.category,
            seller_tax_code: clean_string_value(&self.seller_tax_code),
            serial: clean_string_value(&self.serial),
            lookup_code: clean_string_value(&self.lookup_code),
            lookup_link: clean_string_value(&self.lookup_link),
            authority_code: clean_string_value(&self.authority_code),
            service_fee: clean_string_value(&self.service_fee),
            amounts: Amounts {
                before_tax: amount(&self.before_tax),
                tax_0: amount(&self.tax_0),
                tax_5: amount(&self.tax_5),
                tax_8: amount(&self.tax_8),
                tax_10: amount(&self.tax_10),
                tax_other: amount(&self.tax_other),
                tax_total: amount(&self.tax_total),
                after_tax: amount(&self.after_tax),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_invoice_parses_amounts() {
        let draft = FieldDraft {
            seller: "  CÔNG TY\tABC ".into(),
            before_tax: "1.000.000".into(),
            tax_8: "80.000".into(),
            tax_total: "80.000".into(),
            after_tax: "1,080,000".into(),
            ..FieldDraft::default()
        };
        let invoice = draft.into_invoice("a.pdf");
        assert_eq!(invoice.seller, "CÔNG TY ABC");
        assert_eq!(invoice.amounts.before_tax, Some(1_000_000));
        assert_eq!(invoice.amounts.tax_8, Some(80_000));
        assert_eq!(invoice.amounts.tax_10, None);
        assert_eq!(invoice.amounts.after_tax, Some(1_080_000));
    }

    #[test]
    fn test_into_invoice_rounds_vietnamese_decimals() {
        let draft = FieldDraft {
            before_tax: "16.289,50".into(),
            tax_8: "1.303,09".into(),
            after_tax: "17.592,59".into(),
            ..FieldDraft::default()
        };
        let invoice = draft.into_invoice("a.pdf");
        assert_eq!(invoice.amounts.after_tax, Some(17_593));
        assert_eq!(invoice.amounts.before_tax, Some(16_290));
        assert_eq!(invoice.amounts.tax_8, Some(1_303));

        let report = crate::report::build_report(
            crate::domain::ReportKind::Summary,
            &[crate::domain::ExtractedInvoice {
                invoice,
                items: Vec::new(),
                issues: Vec::new(),
                source: crate::domain::TextSource::Embedded,
            }],
            &crate::report::Submitter::default(),
        );
        let after = report.column_index("Số tiền sau").unwrap();
        assert_eq!(report.rows[0][after].plain(), "17593");
    }

    #[test]
    fn test_bucket_sum() {
        let mut draft = FieldDraft::default();
        *draft.rate_mut(TaxRate::Eight) = "8.000".into();
        draft.tax_other = "1.000".into();
        assert_eq!(draft.bucket_sum(), 9_000);
    }
}
