use crate::{AppError, SpendEntry};
use chrono::NaiveDateTime;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use std::fmt::Display;
use std::path::{Path, PathBuf};

pub const REPORT_TITLE: &str = "Here is the final spend money";

/// Subdirectory of the documents folder that receives the reports.
pub const REPORT_DIR_NAME: &str = "MyAppPDFs";

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const WRAP_WIDTH: usize = 90;

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub output_dir: PathBuf,
    /// Hand the written file to a viewer afterwards.
    pub open_viewer: bool,
    /// Viewer program; the platform default when unset.
    pub viewer: Option<String>,
}

/// `<documents>/MyAppPDFs`, if the platform has a documents folder.
pub fn default_output_dir() -> Result<PathBuf, AppError> {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|dir| dir.join(REPORT_DIR_NAME)))
        .ok_or(AppError::StorageUnavailable)
}

pub fn report_file_name(timestamp: NaiveDateTime) -> String {
    format!("spend_report_{}.pdf", timestamp.format("%Y%m%d_%H%M%S"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    lines: Vec<String>,
    total: u64,
}

impl Report {
    /// Lines keep the order the entries came in.
    pub fn from_entries(entries: &[SpendEntry]) -> Result<Self, AppError> {
        let mut lines = Vec::with_capacity(entries.len());
        let mut total: u64 = 0;
        for entry in entries {
            let amount = entry.amount_value()?;
            total = total.checked_add(amount).ok_or(AppError::TotalOverflow)?;
            lines.push(format!(
                "Date: {}, Amount: {}, Cause: {}",
                entry.date, entry.amount, entry.cause
            ));
        }
        Ok(Report { lines, total })
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn total_line(&self) -> String {
        format!("Total Amount: {}", self.total)
    }

    fn paginate(&self) -> Vec<Vec<PlacedLine>> {
        let mut layout = PageLayout::new();
        layout.place(REPORT_TITLE.to_string(), LineStyle::Title, 0.0);
        for line in &self.lines {
            for wrapped in textwrap::wrap(line, WRAP_WIDTH) {
                layout.place(wrapped.into_owned(), LineStyle::Body, 0.0);
            }
        }
        layout.place(self.total_line(), LineStyle::Total, 4.0);
        layout.pages
    }

    pub fn render_pdf(&self) -> Result<Vec<u8>, AppError> {
        let pages = self.paginate();
        let (doc, first_page, first_layer) =
            PdfDocument::new(REPORT_TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|err| AppError::Pdf(err.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|err| AppError::Pdf(err.to_string()))?;

        let mut first = Some((first_page, first_layer));
        for (index, lines) in pages.iter().enumerate() {
            let (page, layer) = match first.take() {
                Some(indices) => indices,
                None => doc.add_page(
                    Mm(PAGE_WIDTH),
                    Mm(PAGE_HEIGHT),
                    format!("Layer {}", index + 1),
                ),
            };
            let layer = doc.get_page(page).get_layer(layer);
            for line in lines {
                let font: &IndirectFontRef = match line.style {
                    LineStyle::Body => &regular,
                    LineStyle::Title | LineStyle::Total => &bold,
                };
                layer.use_text(
                    line.text.as_str(),
                    line.style.font_size(),
                    Mm(MARGIN),
                    Mm(line.y),
                    font,
                );
            }
        }

        doc.save_to_bytes()
            .map_err(|err| AppError::Pdf(err.to_string()))
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{REPORT_TITLE}")?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        writeln!(f, "{}", self.total_line())
    }
}

/// Renders `report` and writes it into `dir`, returning the written path.
pub async fn write_report(
    report: &Report,
    dir: &Path,
    timestamp: NaiveDateTime,
) -> Result<PathBuf, AppError> {
    let bytes = report.render_pdf()?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| AppError::Io {
            source,
            context: format!("Failed to create directory to save PDF: {}", dir.display()),
        })?;

    let path = dir.join(report_file_name(timestamp));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|source| AppError::Io {
            source,
            context: format!("Failed to write PDF: {}", path.display()),
        })?;

    tracing::info!(path = %path.display(), lines = report.lines.len(), "report written");
    Ok(path)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum LineStyle {
    Title,
    Body,
    Total,
}

impl LineStyle {
    fn font_size(self) -> f32 {
        match self {
            LineStyle::Title => 14.0,
            LineStyle::Body => 11.0,
            LineStyle::Total => 12.0,
        }
    }

    fn advance(self) -> f32 {
        match self {
            LineStyle::Title => 10.0,
            LineStyle::Body | LineStyle::Total => 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PlacedLine {
    text: String,
    style: LineStyle,
    y: f32,
}

struct PageLayout {
    pages: Vec<Vec<PlacedLine>>,
    y: f32,
}

impl PageLayout {
    fn new() -> Self {
        PageLayout {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn place(&mut self, text: String, style: LineStyle, gap: f32) {
        self.y -= gap;
        if self.y < MARGIN {
            self.pages.push(Vec::new());
            self.y = PAGE_HEIGHT - MARGIN;
        }
        let y = self.y;
        if let Some(page) = self.pages.last_mut() {
            page.push(PlacedLine { text, style, y });
        }
        self.y -= style.advance();
    }
}
