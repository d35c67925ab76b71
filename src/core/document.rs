// PDF assembly.
//
// Building happens in two steps. `compose` turns a `ReportContext` into a flat
// list of blocks; `render_pdf` lays the blocks out top-to-bottom on A4 pages,
// starting a new page whenever the next block does not fit.
use crate::core::chart::DPI;
use crate::domain::model::ReportContext;
use crate::utils::error::RenderError;
use image::DynamicImage;
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Pt, Rect, Rgb,
};

/// A4 in points.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
pub const MARGIN: f32 = 36.0;
pub const PRINTABLE_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

pub const MAX_GROUP_ROWS: usize = 20;
pub const ABSENT: &str = "N/A";
pub const STATS_HEADING: &str = "Summary statistics";
pub const GROUPS_HEADING: &str = "Group summary (top groups)";
pub const NO_STATS: &str = "No numeric summary available.";
pub const NO_GROUPS: &str = "No grouping data available.";

const STATS_COL_WIDTH: f32 = 150.0;
const CELL_FONT_SIZE: f32 = 10.0;
const ROW_HEIGHT: f32 = 18.0;
const CELL_PADDING: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphStyle {
    Title,
    Subtitle,
    Normal,
    Heading2,
    Heading3,
}

impl ParagraphStyle {
    fn font_size(&self) -> f32 {
        match self {
            ParagraphStyle::Title => 24.0,
            ParagraphStyle::Subtitle | ParagraphStyle::Heading3 => 12.0,
            ParagraphStyle::Normal => 10.0,
            ParagraphStyle::Heading2 => 14.0,
        }
    }

    fn leading(&self) -> f32 {
        self.font_size() * 1.2
    }

    fn bold(&self) -> bool {
        matches!(
            self,
            ParagraphStyle::Title | ParagraphStyle::Heading2 | ParagraphStyle::Heading3
        )
    }

    fn centered(&self) -> bool {
        matches!(self, ParagraphStyle::Title | ParagraphStyle::Subtitle)
    }

    /// (space before, space after)
    fn spacing(&self) -> (f32, f32) {
        match self {
            ParagraphStyle::Title => (0.0, 12.0),
            ParagraphStyle::Subtitle => (0.0, 6.0),
            ParagraphStyle::Normal => (0.0, 0.0),
            ParagraphStyle::Heading2 => (10.0, 6.0),
            ParagraphStyle::Heading3 => (8.0, 6.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    /// First row is the header.
    pub rows: Vec<Vec<String>>,
    pub col_widths: Vec<f32>,
    /// Right-align body cells after the first column.
    pub align_values_right: bool,
}

#[derive(Debug, Clone)]
pub struct ImageBlock {
    pub image: DynamicImage,
    /// Drawn size in points.
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub enum Block {
    Paragraph { text: String, style: ParagraphStyle },
    Spacer(f32),
    Table(TableBlock),
    Image(ImageBlock),
}

/// A decoded chart ready to embed, keyed by its logical name.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub name: String,
    pub image: DynamicImage,
}

/// `timeseries_plot` -> `Timeseries Plot`.
pub fn heading_for(name: &str) -> String {
    name.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_metric(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| ABSENT.to_string())
}

/// Decode a chart image. Undecodable data is logged and skipped.
pub fn decode_chart(name: &str, bytes: &[u8]) -> Option<EmbeddedImage> {
    match image::load_from_memory(bytes) {
        Ok(image) => Some(EmbeddedImage {
            name: name.to_string(),
            image,
        }),
        Err(e) => {
            tracing::warn!("Skipping chart '{}': cannot decode image ({})", name, e);
            None
        }
    }
}

/// Scale an image drawn at the chart DPI down to fit the printable area.
fn fit_image(image: &DynamicImage) -> (f32, f32) {
    let natural_w = image.width() as f32 * 72.0 / DPI as f32;
    let natural_h = image.height() as f32 * 72.0 / DPI as f32;
    // Leave room for the subsection heading above the image.
    let max_h = PAGE_HEIGHT - 2.0 * MARGIN - 40.0;
    let scale = (PRINTABLE_WIDTH / natural_w).min(max_h / natural_h).min(1.0);
    (natural_w * scale, natural_h * scale)
}

fn stats_table(ctx: &ReportContext) -> TableBlock {
    let mut rows = vec![vec!["Metric".to_string(), "Value".to_string()]];
    rows.extend(
        ctx.stats
            .iter()
            .map(|(metric, value)| vec![metric.label().to_string(), format_metric(value)]),
    );
    TableBlock {
        rows,
        col_widths: vec![STATS_COL_WIDTH, STATS_COL_WIDTH],
        align_values_right: true,
    }
}

fn group_table(ctx: &ReportContext) -> TableBlock {
    let mut rows = vec![ctx.grouped.header().to_vec()];
    rows.extend(ctx.grouped.rows.iter().take(MAX_GROUP_ROWS).map(|row| {
        vec![
            row.key.clone(),
            row.count.to_string(),
            format_metric(row.mean),
            format!("{:.2}", row.sum),
        ]
    }));

    let mut col_widths: Vec<f32> = (0..4)
        .map(|col| {
            rows.iter()
                .map(|r| text_width(&r[col], CELL_FONT_SIZE, false))
                .fold(0.0_f32, f32::max)
                + 2.0 * CELL_PADDING
        })
        .collect();
    let total: f32 = col_widths.iter().sum();
    if total > PRINTABLE_WIDTH {
        let shrink = PRINTABLE_WIDTH / total;
        col_widths.iter_mut().for_each(|w| *w *= shrink);
    }

    TableBlock {
        rows,
        col_widths,
        align_values_right: false,
    }
}

/// Lay out the report in reading order.
pub fn compose(ctx: &ReportContext, images: &[EmbeddedImage]) -> Vec<Block> {
    let para = |text: String, style: ParagraphStyle| Block::Paragraph { text, style };

    let mut blocks = vec![
        para(ctx.title.clone(), ParagraphStyle::Title),
        para(ctx.subtitle.clone(), ParagraphStyle::Subtitle),
        Block::Spacer(12.0),
        para(format!("Generated on: {}", ctx.generated_on), ParagraphStyle::Normal),
        para(format!("Source: {}", ctx.source_info), ParagraphStyle::Normal),
        Block::Spacer(18.0),
        para(STATS_HEADING.to_string(), ParagraphStyle::Heading2),
    ];

    if ctx.stats.is_empty() {
        blocks.push(para(NO_STATS.to_string(), ParagraphStyle::Normal));
    } else {
        blocks.push(Block::Table(stats_table(ctx)));
    }
    blocks.push(Block::Spacer(12.0));

    blocks.push(para(GROUPS_HEADING.to_string(), ParagraphStyle::Heading2));
    if ctx.grouped.is_empty() {
        blocks.push(para(NO_GROUPS.to_string(), ParagraphStyle::Normal));
    } else {
        blocks.push(Block::Table(group_table(ctx)));
    }
    blocks.push(Block::Spacer(12.0));

    for embedded in images {
        let (width, height) = fit_image(&embedded.image);
        blocks.push(para(heading_for(&embedded.name), ParagraphStyle::Heading3));
        blocks.push(Block::Image(ImageBlock {
            image: embedded.image.clone(),
            width,
            height,
        }));
        blocks.push(Block::Spacer(12.0));
    }
    blocks
}

/// Approximate Helvetica advance width. Builtin PDF fonts carry no metrics
/// here, so this uses per-class averages.
fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let em: f32 = text
        .chars()
        .map(|c| match c {
            ' ' => 0.278,
            '0'..='9' => 0.556,
            'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '!' | '\'' | '|' => 0.25,
            'f' | 't' | 'r' | '(' | ')' | '-' | '/' => 0.35,
            'm' | 'w' | 'M' | 'W' => 0.85,
            c if c.is_uppercase() => 0.68,
            _ => 0.54,
        })
        .sum();
    em * size * if bold { 1.06 } else { 1.0 }
}

/// Greedy word wrap to `max_width` points.
fn wrap(text: &str, size: f32, bold: bool, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if !current.is_empty() && text_width(&candidate, size, bold) > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn mm(pt: f32) -> Mm {
    Mm::from(Pt(pt))
}

fn grey(level: f32) -> Color {
    Color::Rgb(Rgb::new(level, level, level, None))
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Top-down cursor over the pages of a document.
struct Layout<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: Fonts,
    /// Distance of the cursor from the bottom edge, in points.
    y: f32,
}

impl<'a> Layout<'a> {
    fn top() -> f32 {
        PAGE_HEIGHT - MARGIN
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = Self::top();
    }

    /// Start a new page unless `height` fits below the cursor. A fresh page
    /// always accepts the block, even if it overflows.
    fn reserve(&mut self, height: f32) {
        if self.y - height < MARGIN && self.y < Self::top() {
            self.new_page();
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, baseline: f32, bold: bool) {
        let font = if bold { &self.fonts.bold } else { &self.fonts.regular };
        self.layer.use_text(text, size, mm(x), mm(baseline), font);
    }

    fn paragraph(&mut self, text: &str, style: ParagraphStyle) {
        let size = style.font_size();
        let (before, after) = style.spacing();
        if self.y < Self::top() {
            self.y -= before;
        }
        for line in wrap(text, size, style.bold(), PRINTABLE_WIDTH) {
            self.reserve(style.leading());
            let x = if style.centered() {
                MARGIN + (PRINTABLE_WIDTH - text_width(&line, size, style.bold())).max(0.0) / 2.0
            } else {
                MARGIN
            };
            self.y -= style.leading();
            self.text(&line, size, x, self.y + size * 0.25, style.bold());
        }
        self.y -= after;
    }

    fn table(&mut self, table: &TableBlock) {
        for (index, row) in table.rows.iter().enumerate() {
            let header = index == 0;
            self.reserve(ROW_HEIGHT);
            let bottom = self.y - ROW_HEIGHT;
            let mut x = MARGIN;
            for (col, (cell, width)) in row.iter().zip(&table.col_widths).enumerate() {
                let cell_rect = |mode| {
                    Rect::new(mm(x), mm(bottom), mm(x + width), mm(self.y)).with_mode(mode)
                };
                if header {
                    self.layer.set_fill_color(grey(0.827));
                    self.layer.add_rect(cell_rect(PaintMode::Fill));
                }
                self.layer.set_outline_color(grey(0.5));
                self.layer.set_outline_thickness(0.5);
                self.layer.add_rect(cell_rect(PaintMode::Stroke));

                self.layer.set_fill_color(grey(0.0));
                let text_x = if table.align_values_right && !header && col > 0 {
                    x + width - CELL_PADDING - text_width(cell, CELL_FONT_SIZE, false)
                } else {
                    x + CELL_PADDING
                };
                self.text(cell, CELL_FONT_SIZE, text_x, bottom + 5.5, false);
                x += width;
            }
            self.y = bottom;
        }
    }

    fn image(&mut self, block: &ImageBlock) {
        self.reserve(block.height);
        let bottom = self.y - block.height;
        let natural_w = block.image.width() as f32 * 72.0 / DPI as f32;
        let scale = block.width / natural_w;
        Image::from_dynamic_image(&block.image).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(mm(MARGIN)),
                translate_y: Some(mm(bottom)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(DPI as f32),
                ..Default::default()
            },
        );
        self.y = bottom;
    }
}

/// Render composed blocks to PDF bytes.
pub fn render_pdf(title: &str, blocks: &[Block]) -> Result<Vec<u8>, RenderError> {
    let (doc, page, layer) = PdfDocument::new(title, mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");
    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
    };
    let mut layout = Layout {
        layer: doc.get_page(page).get_layer(layer),
        doc: &doc,
        fonts,
        y: Layout::top(),
    };

    for block in blocks {
        match block {
            Block::Paragraph { text, style } => layout.paragraph(text, *style),
            Block::Spacer(height) => layout.y -= height,
            Block::Table(table) => layout.table(table),
            Block::Image(image) => layout.image(image),
        }
    }
    drop(layout);

    Ok(doc.save_to_bytes()?)
}

/// Build the report as PDF bytes.
///
/// `images` holds the charts that could be read and decoded. A chart listed
/// in `ctx.charts` without a matching image gets no subsection.
pub fn build(ctx: &ReportContext, images: &[EmbeddedImage]) -> Result<Vec<u8>, RenderError> {
    let blocks = compose(ctx, images);
    tracing::debug!("Composed {} blocks for '{}'", blocks.len(), ctx.title);
    render_pdf(&ctx.title, &blocks)
}
