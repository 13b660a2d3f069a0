use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Marker written into every field when no text could be recovered from a PDF.
pub const UNRECOGNIZED: &str = "không nhận diện được";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    Embedded,
    Ocr,
    Sidecar,
    None,
}

impl fmt::Display for TextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextSource::Embedded => "embedded",
            TextSource::Ocr => "ocr",
            TextSource::Sidecar => "sidecar",
            TextSource::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropRegion {
    /// Top-right 30% x 15% of the first page, where the invoice number sits.
    InvoiceNumber,
    /// Full-width top 25% of the first page, where the seller tax code sits.
    SellerTaxCode,
}

/// OCR text of a high resolution crop of the first page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropText {
    pub region: CropRegion,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub file_name: String,
    pub path: PathBuf,
    pub text: String,
    pub source: TextSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub crops: Vec<CropText>,
}

impl SourceDocument {
    pub fn new(file_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            path: path.into(),
            text: String::new(),
            source: TextSource::None,
            crops: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>, source: TextSource) -> Self {
        self.text = text.into();
        self.source = source;
        self
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxRate {
    Zero,
    Five,
    Eight,
    Ten,
}

impl TaxRate {
    pub const ALL: [TaxRate; 4] = [TaxRate::Zero, TaxRate::Five, TaxRate::Eight, TaxRate::Ten];

    pub fn percent(self) -> u32 {
        match self {
            TaxRate::Zero => 0,
            TaxRate::Five => 5,
            TaxRate::Eight => 8,
            TaxRate::Ten => 10,
        }
    }

    pub fn from_percent(percent: i64) -> Option<Self> {
        match percent {
            0 => Some(TaxRate::Zero),
            5 => Some(TaxRate::Five),
            8 => Some(TaxRate::Eight),
            10 => Some(TaxRate::Ten),
            _ => None,
        }
    }

    /// Column header used by the summary and business layouts.
    pub fn column(self) -> &'static str {
        match self {
            TaxRate::Zero => "Thuế 0%",
            TaxRate::Five => "Thuế 5%",
            TaxRate::Eight => "Thuế 8%",
            TaxRate::Ten => "Thuế 10%",
        }
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// Money amounts in whole đồng.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amounts {
    pub before_tax: Option<i64>,
    pub tax_0: Option<i64>,
    pub tax_5: Option<i64>,
    pub tax_8: Option<i64>,
    pub tax_10: Option<i64>,
    pub tax_other: Option<i64>,
    pub tax_total: Option<i64>,
    pub after_tax: Option<i64>,
}

impl Amounts {
    pub fn by_rate(&self, rate: TaxRate) -> Option<i64> {
        match rate {
            TaxRate::Zero => self.tax_0,
            TaxRate::Five => self.tax_5,
            TaxRate::Eight => self.tax_8,
            TaxRate::Ten => self.tax_10,
        }
    }

    pub fn by_rate_mut(&mut self, rate: TaxRate) -> &mut Option<i64> {
        match rate {
            TaxRate::Zero => &mut self.tax_0,
            TaxRate::Five => &mut self.tax_5,
            TaxRate::Eight => &mut self.tax_8,
            TaxRate::Ten => &mut self.tax_10,
        }
    }

    /// Rates whose bucket is filled, in ascending order.
    pub fn rates_present(&self) -> Vec<TaxRate> {
        TaxRate::ALL
            .into_iter()
            .filter(|rate| self.by_rate(*rate).is_some())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Food,
    Lodging,
    Flowers,
    PhoneCard,
    Fuel,
    Gift,
    Travel,
    Other,
    Custom(String),
}

impl Category {
    pub const KNOWN: [Category; 8] = [
        Category::Food,
        Category::Lodging,
        Category::Flowers,
        Category::PhoneCard,
        Category::Fuel,
        Category::Gift,
        Category::Travel,
        Category::Other,
    ];

    pub fn label(&self) -> &str {
        match self {
            Category::Food => "Dịch vụ ăn uống",
            Category::Lodging => "Dịch vụ phòng nghỉ",
            Category::Flowers => "Hoa tươi",
            Category::PhoneCard => "Thẻ cào điện thoại",
            Category::Fuel => "Xăng xe",
            Category::Gift => "Quà tặng",
            Category::Travel => "Dịch vụ du lịch",
            Category::Other => "Khác",
            Category::Custom(label) => label,
        }
    }

    /// Maps a known label back to its category, anything else becomes `Custom`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Self::KNOWN
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(label) || c.label() == label)
            .unwrap_or_else(|| Category::Custom(label.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub file_name: String,
    pub date: String,
    pub number: String,
    pub seller: String,
    pub category: Option<Category>,
    pub seller_tax_code: String,
    pub serial: String,
    pub lookup_code: String,
    pub lookup_link: String,
    pub authority_code: String,
    pub service_fee: String,
    pub amounts: Amounts,
}

impl Invoice {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    /// Invoice whose every text field carries the unrecognized marker.
    /// The category is left to classification.
    pub fn unrecognized(file_name: impl Into<String>) -> Self {
        let marker = UNRECOGNIZED.to_string();
        Self {
            file_name: file_name.into(),
            date: marker.clone(),
            number: marker.clone(),
            seller: marker.clone(),
            category: None,
            seller_tax_code: marker.clone(),
            serial: marker.clone(),
            lookup_code: marker.clone(),
            lookup_link: marker.clone(),
            authority_code: marker.clone(),
            service_fee: marker,
            amounts: Amounts::default(),
        }
    }

    pub fn category_label(&self) -> &str {
        self.category.as_ref().map(Category::label).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: String,
    pub unit_price: String,
    pub amount: String,
    pub tax_rate: Option<TaxRate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub field: String,
    pub severity: IssueSeverity,
    pub message: String,
}

impl Issue {
    pub fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            severity: IssueSeverity::Error,
            message: message.into(),
        }
    }

    pub fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            severity: IssueSeverity::Warning,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedInvoice {
    pub invoice: Invoice,
    pub items: Vec<LineItem>,
    pub issues: Vec<Issue>,
    pub source: TextSource,
}

impl ExtractedInvoice {
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Summary,
    Accounting,
    Business,
}

impl ReportKind {
    pub fn needs_team(self) -> bool {
        matches!(self, ReportKind::Accounting | ReportKind::Business)
    }
}

impl std::str::FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "summary" => Ok(ReportKind::Summary),
            "accounting" | "kế toán" => Ok(ReportKind::Accounting),
            "business" | "kinh doanh" => Ok(ReportKind::Business),
            other => Err(format!(
                "unknown report '{}', expected summary, accounting or business",
                other
            )),
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportKind::Summary => "summary",
            ReportKind::Accounting => "accounting",
            ReportKind::Business => "business",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Cell {
    Text(String),
    Money(i64),
    Empty,
}

impl Cell {
    pub fn text(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }

    pub fn money(value: Option<i64>) -> Self {
        value.map(Cell::Money).unwrap_or(Cell::Empty)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Money(_) => false,
        }
    }

    /// Plain rendering used by CSV export; money is written without separators.
    pub fn plain(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Money(n) => n.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub kind: ReportKind,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

impl Report {
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| *h == header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_label() {
        assert_eq!(Category::from_label("Xăng xe"), Category::Fuel);
        assert_eq!(Category::from_label(" Khác "), Category::Other);
        assert_eq!(
            Category::from_label("Văn phòng phẩm"),
            Category::Custom("Văn phòng phẩm".to_string())
        );
    }

    #[test]
    fn test_rates_present_in_order() {
        let amounts = Amounts {
            tax_10: Some(100),
            tax_5: Some(50),
            ..Amounts::default()
        };
        assert_eq!(amounts.rates_present(), vec![TaxRate::Five, TaxRate::Ten]);
    }

    #[test]
    fn test_report_kind_parse() {
        assert_eq!("Accounting".parse::<ReportKind>(), Ok(ReportKind::Accounting));
        assert_eq!("kinh doanh".parse::<ReportKind>(), Ok(ReportKind::Business));
        assert!("weekly".parse::<ReportKind>().is_err());
    }
}
