//! MIC/DTA painter: draws the 41-box form and its values onto one PDF page.
//!
//! Geometry is authored in layout pixels on a 1700×2800 canvas with the
//! origin at the top-left; PDF space is 0.75 pt per pixel with the origin at
//! the bottom-left.

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::{debug, warn};

use crate::layout::fit::{fit_text, wrap_lines, FitConfig, Rect};
use crate::layout::font_metrics::PdfFont;
use crate::layout::RenderError;
use crate::manifest::fields::{FieldCategory, FieldSpec, PxRect, FIELDS};
use crate::manifest::record::{ManifestFields, DATE_FORMAT};

// ────────────────────────────────────────────────────────────────────────────
// Geometry constants
// ────────────────────────────────────────────────────────────────────────────

pub const CANVAS_WIDTH_PX: f32 = 1700.0;
pub const CANVAS_HEIGHT_PX: f32 = 2800.0;
pub const PT_PER_PX: f32 = 0.75;

const TITLE_OFFSET_PT: f32 = 24.0;
const SUBTITLE_OFFSET_PT: f32 = 16.0;
const FIELD_PADDING_PT: f32 = 8.0;
const TITLE_SIZE: f32 = 13.0;
const SUBTITLE_SIZE: f32 = 11.0;

/// Space under the caption of a box with a title and subtitle.
const CAPTION_BLOCK_PT: f32 = 34.0;

/// A short value goes multi-line past this many characters.
const SHORT_MULTILINE_THRESHOLD: usize = 80;

const HEADER: PxRect = PxRect { x: 55.0, y: 55.0, w: 1616.0, h: 108.5 };
const MIC_BOX: PxRect = PxRect { x: 79.0, y: 70.0, w: 235.0, h: 70.0 };
const BORDER: PxRect = PxRect { x: 55.0, y: 55.0, w: 1616.75, h: 2672.75 };
const TITLE_X_PX: f32 = 335.0;
const TITLE_Y_PX: f32 = 91.0;
const TITLE_LINE_GAP_PX: f32 = 38.0;

const HEADER_TITLE_ES: &str =
    "Manifiesto Internacional de Carga por Carretera / Declaración de Tránsito Aduanero";
const HEADER_TITLE_PT: &str = "Manifesto Internacional de Carga Rodoviária / Declaração de Trânsito";

const LEGAL_ES: &str = "Declaramos que las informaciones presentadas en este Documento son expresión de verdad, \
que los datos referentes a las mercaderías fueron transcriptos exactamente conforme a la declaración del remitente, \
las cuales son de su exclusiva responsabilidad, y que esta operación obedece a lo dispuesto en el Convenio sobre \
Transporte Internacional Terrestre de los países del Cono Sur.";
const LEGAL_PT: &str = "Declaramos que as informações prestadas neste Documento são a expressão de verdade que os dados \
referentes às mercadorias foram transcritos exatamente conforme a declaração do remetente, os quais são de sua \
exclusiva responsabilidade, e que esta operação obedece ao disposto no Convênio sobre Transporte Internacional Terrestre.";
const SIGNATURE_CAPTION: &str = "39 Firma y sello del porteador / Assinatura e carimbo do transportador";
const DEFAULT_CARRIER_NAME: &str = "TRANSPORTADOR";

pub fn px_to_pt(px: f32) -> f32 {
    px * PT_PER_PX
}

/// Converts a top-left pixel rectangle into a bottom-left point rectangle.
pub fn to_page_rect(r: PxRect) -> Rect {
    Rect {
        x: px_to_pt(r.x),
        y: px_to_pt(CANVAS_HEIGHT_PX - r.y - r.h),
        w: px_to_pt(r.w),
        h: px_to_pt(r.h),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Category configuration
// ────────────────────────────────────────────────────────────────────────────

/// Fitting rules for a box holding `value`, or `None` for boxes without data.
pub fn fit_config(spec: &FieldSpec, value: &str) -> Option<FitConfig> {
    let base = FitConfig {
        font: PdfFont::Helvetica,
        min_size: 8,
        max_size: 14,
        leading: 1.2,
        margin: 12.0,
        title_reserved: CAPTION_BLOCK_PT,
        multiline: false,
    };

    let config = match spec.category {
        FieldCategory::Carrier => FitConfig {
            max_size: 16,
            margin: 10.0,
            multiline: true,
            ..base
        },
        FieldCategory::Party => FitConfig {
            min_size: 7,
            max_size: 12,
            leading: 1.15,
            margin: 10.0,
            multiline: true,
            ..base
        },
        FieldCategory::Notes => FitConfig {
            min_size: 7,
            max_size: 10,
            leading: 1.1,
            margin: 6.0,
            title_reserved: 45.0,
            multiline: true,
            ..base
        },
        FieldCategory::Description => FitConfig {
            leading: 1.3,
            margin: 15.0,
            title_reserved: 45.0,
            multiline: true,
            ..base
        },
        FieldCategory::Short
            if value.contains('\n') || value.chars().count() > SHORT_MULTILINE_THRESHOLD =>
        {
            FitConfig {
                min_size: 7,
                max_size: 12,
                leading: 1.15,
                margin: 10.0,
                multiline: true,
                ..base
            }
        }
        FieldCategory::Short => base,
        FieldCategory::Signature | FieldCategory::Stamp => return None,
    };
    Some(config)
}

// ────────────────────────────────────────────────────────────────────────────
// Content stream helpers
// ────────────────────────────────────────────────────────────────────────────

/// Encodes text for a simple font with `/WinAnsiEncoding`. Characters with
/// no WinAnsi code become `?`; tabs become spaces.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            c if (c as u32) < 0x80 => c as u8,
            c if (0xA0..=0xFF).contains(&(c as u32)) => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

struct Painter {
    ops: Vec<Operation>,
}

impl Painter {
    fn new() -> Self {
        Painter { ops: Vec::new() }
    }

    fn rect(&mut self, r: Rect, line_width: f32) {
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new("w", vec![line_width.into()]));
        self.ops.push(Operation::new(
            "re",
            vec![r.x.into(), r.y.into(), r.w.into(), r.h.into()],
        ));
        self.ops.push(Operation::new("S", vec![]));
        self.ops.push(Operation::new("Q", vec![]));
    }

    fn text(&mut self, font: PdfFont, size: f32, x: f32, y: f32, text: &str) {
        if text.is_empty() {
            return;
        }
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new(
            "Tf",
            vec![
                Object::Name(font.resource_name().as_bytes().to_vec()),
                size.into(),
            ],
        ));
        self.ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(encode_win_ansi(text))],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn caption(&mut self, r: Rect, title: &str, subtitle: &str) {
        let x = r.x + FIELD_PADDING_PT;
        let y = r.y + r.h - TITLE_OFFSET_PT;
        self.text(PdfFont::HelveticaBold, TITLE_SIZE, x, y, title);
        self.text(PdfFont::Helvetica, SUBTITLE_SIZE, x, y - SUBTITLE_OFFSET_PT, subtitle);
    }

    fn into_content(self) -> Content {
        Content { operations: self.ops }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Form sections
// ────────────────────────────────────────────────────────────────────────────

fn draw_header(p: &mut Painter) {
    p.rect(to_page_rect(HEADER), 2.0);

    let mic = to_page_rect(MIC_BOX);
    p.rect(mic, 1.0);
    let label = "MIC/DTA";
    let label_w = PdfFont::HelveticaBold.metrics().text_width(label, 28.0);
    p.text(
        PdfFont::HelveticaBold,
        28.0,
        mic.x + (mic.w - label_w) / 2.0,
        mic.y + mic.h / 2.0 - 12.0,
        label,
    );

    let title_x = px_to_pt(TITLE_X_PX);
    p.text(
        PdfFont::HelveticaBold,
        20.0,
        title_x,
        px_to_pt(CANVAS_HEIGHT_PX - TITLE_Y_PX),
        HEADER_TITLE_ES,
    );
    p.text(
        PdfFont::Helvetica,
        20.0,
        title_x,
        px_to_pt(CANVAS_HEIGHT_PX - TITLE_Y_PX - TITLE_LINE_GAP_PX),
        HEADER_TITLE_PT,
    );
}

fn draw_field(p: &mut Painter, spec: &FieldSpec, fields: &ManifestFields) {
    let r = to_page_rect(spec.rect);
    p.rect(r, 1.0);
    p.caption(r, spec.title, spec.subtitle);

    if spec.key.is_none() {
        return;
    }
    let value = fields.display_text(spec.number);
    let Some(config) = fit_config(spec, &value) else {
        return;
    };

    let fitted = fit_text(&value, &r, &config);
    if fitted.truncated {
        warn!(
            field = spec.number,
            size = fitted.font_size,
            "Value does not fit its box and was truncated"
        );
    }
    for line in &fitted.lines {
        p.text(config.font, f32::from(fitted.font_size), line.x, line.y, &line.text);
    }
}

/// The name printed under the signature line: first line of box 1.
pub fn carrier_signature_name(fields: &ManifestFields) -> String {
    fields
        .text(1)
        .as_deref()
        .and_then(|c| c.lines().next())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_CARRIER_NAME)
        .to_string()
}

fn draw_signature(p: &mut Painter, spec: &FieldSpec, fields: &ManifestFields, today: NaiveDate) {
    let r = to_page_rect(spec.rect);
    p.rect(r, 1.0);

    let x = r.x + FIELD_PADDING_PT;
    let width = r.w - 2.0 * FIELD_PADDING_PT;
    let regular = PdfFont::Helvetica.metrics();
    let mut cursor = r.y + r.h - FIELD_PADDING_PT;

    for paragraph in [LEGAL_ES, LEGAL_PT] {
        for line in wrap_lines(paragraph, regular, 10.0, width) {
            cursor -= 12.0;
            p.text(PdfFont::Helvetica, 10.0, x, cursor, &line);
        }
    }

    cursor -= 10.0 + 13.0;
    let bold = PdfFont::HelveticaBold.metrics();
    for line in wrap_lines(SIGNATURE_CAPTION, bold, 11.0, width) {
        p.text(PdfFont::HelveticaBold, 11.0, x, cursor, &line);
        cursor -= 13.0;
    }

    cursor -= 20.0 + 3.0;
    p.text(PdfFont::HelveticaBold, 14.0, x, cursor, &carrier_signature_name(fields));

    let date = fields.issue_date.unwrap_or(today).format(DATE_FORMAT);
    p.text(
        PdfFont::Helvetica,
        12.0,
        x + 4.0,
        r.y + 25.0,
        &format!("Data / Fecha: {date}"),
    );
}

// ────────────────────────────────────────────────────────────────────────────
// Document assembly
// ────────────────────────────────────────────────────────────────────────────

fn build_content(fields: &ManifestFields, today: NaiveDate) -> Content {
    let mut p = Painter::new();
    draw_header(&mut p);
    for spec in FIELDS.iter() {
        match spec.category {
            FieldCategory::Signature => draw_signature(&mut p, spec, fields, today),
            _ => draw_field(&mut p, spec, fields),
        }
    }
    p.rect(to_page_rect(BORDER), 1.0);
    p.into_content()
}

/// Renders the manifest into PDF bytes. `today` dates the form when box 6
/// is empty.
pub fn render_manifest_pdf(fields: &ManifestFields, today: NaiveDate) -> Result<Vec<u8>, RenderError> {
    let mut fields = fields.clone();
    fields.mirror_owner();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = lopdf::Dictionary::new();
    for font in [PdfFont::Helvetica, PdfFont::HelveticaBold] {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font.resource_name(), font_id);
    }
    let resources_id = doc.add_object(dictionary! { "Font" => fonts });

    let content = build_content(&fields, today);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_w = px_to_pt(CANVAS_WIDTH_PX);
    let page_h = px_to_pt(CANVAS_HEIGHT_PX);
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let title = match fields.waybill_number.as_deref() {
        Some(number) => format!("MIC/DTA {number}"),
        None => "MIC/DTA".to_string(),
    };
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(encode_win_ansi(&title)),
        "Producer" => Object::string_literal(env!("CARGO_PKG_NAME")),
    });
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    debug!(bytes = bytes.len(), "Rendered MIC/DTA PDF");
    Ok(bytes)
}

/// Async entry point: renders on the blocking pool.
pub async fn render_manifest(fields: ManifestFields) -> Result<Vec<u8>, RenderError> {
    let today = chrono::Local::now().date_naive();
    tokio::task::spawn_blocking(move || render_manifest_pdf(&fields, today))
        .await
        .map_err(|e| RenderError::Task(e.to_string()))?
}
