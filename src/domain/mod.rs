// Domain layer: invoice model and the ports the pipeline is wired through.

pub mod model;
pub mod ports;

pub use model::{
    Amounts, Category, Cell, CropRegion, CropText, ExtractedInvoice, Invoice, Issue,
    IssueSeverity, LineItem, Report, ReportKind, SourceDocument, TaxRate, TextSource,
    UNRECOGNIZED,
};
pub use ports::{
    CategoryMode, ConfigProvider, OutputFormat, Pipeline, Storage, TextExtractor,
    TransformResult,
};
