//! Page-level PDF editing on top of lopdf
//!
//! [`PdfDocument`] is the editing surface the transforms use: per-page
//! images, text blocks and link annotations, text search, redaction,
//! text and link insertion, page deletion and saving.
//!
//! Text geometry is estimated from the content stream (text matrix, CTM,
//! font size and `/Widths`), so rectangles are close to what a renderer
//! draws but not glyph-exact.

use super::geometry::{Matrix, Rect};
use crate::error::{Error, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::HashMap;
use std::path::Path;

/// Resource name used for the font of inserted text
const INSERTED_FONT: &[u8] = b"FStamp";

/// Fallback glyph width (thousandths of text space) for fonts without `/Widths`
const DEFAULT_GLYPH_WIDTH: f32 = 500.0;

/// Line moves wider than this many line spacings split a text object into blocks
const BLOCK_GAP_FACTOR: f32 = 1.5;

/// Parent-chain depth limit when resolving inherited page attributes
const MAX_INHERIT_DEPTH: usize = 32;

/// US Letter, used when a page has no usable MediaBox
const DEFAULT_MEDIA_BOX: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// Image XObject available to a page
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    /// Resource name (without the leading slash)
    pub name: String,
    /// Object id of the image stream, when referenced indirectly
    pub id: Option<ObjectId>,
    /// Bounding box of the first placement on the page
    pub rect: Option<Rect>,
}

/// Text object (`BT` … `ET`) with its estimated bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub rect: Rect,
    pub text: String,
}

/// Link annotation on a page
#[derive(Debug, Clone, PartialEq)]
pub struct LinkAnnotation {
    /// URI target for `/S /URI` actions
    pub uri: Option<String>,
    /// Clickable area
    pub rect: Rect,
}

/// How much post-processing to apply when serializing
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Drop unreferenced objects and renumber
    pub garbage: bool,
    /// Flate-compress uncompressed streams
    pub deflate: bool,
}

impl SaveOptions {
    /// Maximal garbage collection plus stream deflation
    pub fn compact() -> Self {
        Self {
            garbage: true,
            deflate: true,
        }
    }
}

/// Counts of what a redaction pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedactionSummary {
    pub text_runs: usize,
    pub images: usize,
    pub links: usize,
}

impl RedactionSummary {
    pub fn is_empty(&self) -> bool {
        self.text_runs == 0 && self.images == 0 && self.links == 0
    }
}

/// Text insertion parameters
#[derive(Debug, Clone)]
pub struct TextStamp<'a> {
    pub text: &'a str,
    /// Baseline origin in user space
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    /// RGB, 0-1 range
    pub color: (f32, f32, f32),
}

/// Where a page's own `/Resources` dictionary lives
#[derive(Debug, Clone, Copy)]
enum ResourcesLocation {
    Inline,
    Indirect(ObjectId),
}

/// Simple-font metrics needed to estimate run widths
#[derive(Debug, Clone)]
struct FontMetrics {
    first_char: i64,
    widths: Vec<f32>,
    missing_width: f32,
    two_byte: bool,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            first_char: 0,
            widths: Vec::new(),
            missing_width: DEFAULT_GLYPH_WIDTH,
            two_byte: false,
        }
    }
}

impl FontMetrics {
    fn glyph_width(&self, code: u32) -> f32 {
        let idx = code as i64 - self.first_char;
        if idx >= 0 {
            if let Some(w) = self.widths.get(idx as usize) {
                return *w;
            }
        }
        self.missing_width
    }
}

/// Something drawn by the content stream
#[derive(Debug, Clone)]
enum ContentItem {
    Text {
        op_index: usize,
        block: usize,
        rect: Rect,
        text: String,
        new_line: bool,
        /// Horizontal advance in unscaled text space
        advance: f32,
        /// Font size times horizontal scaling
        scale: f32,
        /// Baseline origin in user space
        baseline_y: f32,
        /// Line spacing in user space (`TL`, or 1.2 × font size when unset)
        line_height: f32,
    },
    Image {
        op_index: usize,
        name: Vec<u8>,
        rect: Rect,
    },
}

#[derive(Debug, Clone)]
struct TextState {
    tm: Matrix,
    tlm: Matrix,
    font: FontMetrics,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font: FontMetrics::default(),
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn next_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    /// Advance (in text space) of one string operand
    fn string_advance(&self, bytes: &[u8]) -> f32 {
        let mut advance = 0.0;
        if self.font.two_byte {
            for pair in bytes.chunks(2) {
                let code = pair.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                advance += self.font.glyph_width(code) / 1000.0 * self.size + self.char_spacing;
            }
        } else {
            for &b in bytes {
                advance += self.font.glyph_width(b as u32) / 1000.0 * self.size + self.char_spacing;
                if b == b' ' {
                    advance += self.word_spacing;
                }
            }
        }
        advance * self.horizontal_scale
    }

    fn decode(&self, bytes: &[u8]) -> String {
        if self.font.two_byte {
            // No ToUnicode mapping; keep only the ASCII-range codes
            bytes
                .chunks(2)
                .filter_map(|pair| match pair {
                    [0, b] if b.is_ascii() => Some(*b as char),
                    _ => None,
                })
                .collect()
        } else {
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

/// Number operand as f32
fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn operand(op: &Operation, index: usize) -> f32 {
    op.operands.get(index).and_then(as_number).unwrap_or(0.0)
}

fn operand_matrix(op: &Operation) -> Matrix {
    Matrix::new(
        operand(op, 0),
        operand(op, 1),
        operand(op, 2),
        operand(op, 3),
        operand(op, 4),
        operand(op, 5),
    )
}

fn rect_from_array(doc: &Document, obj: &Object) -> Option<Rect> {
    let obj = resolve(doc, obj);
    let arr = obj.as_array().ok()?;
    if arr.len() < 4 {
        return None;
    }
    let n: Vec<f32> = arr
        .iter()
        .take(4)
        .map(|o| as_number(resolve(doc, o)))
        .collect::<Option<Vec<f32>>>()?;
    Some(Rect::new(n[0], n[1], n[2], n[3]))
}

fn rect_to_array(rect: &Rect) -> Object {
    Object::Array(vec![
        Object::Real(rect.x0),
        Object::Real(rect.y0),
        Object::Real(rect.x1),
        Object::Real(rect.y1),
    ])
}

/// Follow indirect references (bounded)
fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> &'a Object {
    for _ in 0..MAX_INHERIT_DEPTH {
        match obj {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => obj = target,
                Err(_) => return obj,
            },
            _ => return obj,
        }
    }
    obj
}

fn string_bytes(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise byte-per-char)
fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .map(|c| u16::from_be_bytes([c[0], *c.get(1).unwrap_or(&0)]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

/// Encode text for a WinAnsi simple font; unmappable characters become `?`
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}

/// An opened PDF document
pub struct PdfDocument {
    doc: Document,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("pages", &self.page_count())
            .finish()
    }
}

impl PdfDocument {
    /// Open a PDF from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::open_bytes(&data)
    }

    /// Open a PDF from bytes
    pub fn open_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::InvalidPdf {
                reason: "Not a valid PDF file".to_string(),
            });
        }

        let doc = Document::load_mem(data)?;
        if doc.is_encrypted() {
            return Err(Error::InvalidPdf {
                reason: "PDF is password protected".to_string(),
            });
        }
        if doc.get_pages().is_empty() {
            return Err(Error::InvalidPdf {
                reason: "PDF has no pages".to_string(),
            });
        }

        Ok(Self { doc })
    }

    /// Wrap an already-built lopdf document
    pub fn from_document(doc: Document) -> Self {
        Self { doc }
    }

    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Object id of the page at 0-based `index`
    fn page_id(&self, index: u32) -> Result<ObjectId> {
        let total = self.page_count();
        self.doc
            .get_pages()
            .get(&(index + 1))
            .copied()
            .ok_or(Error::PageOutOfRange {
                page: index + 1,
                total,
            })
    }

    fn page_dict(&self, page_id: ObjectId) -> Result<&Dictionary> {
        Ok(self.doc.get_object(page_id)?.as_dict()?)
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary> {
        Ok(self.doc.get_object_mut(page_id)?.as_dict_mut()?)
    }

    /// Look up a page attribute, walking `/Parent` for inherited values
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = self.doc.get_object(page_id).ok()?.as_dict().ok()?;
        for _ in 0..MAX_INHERIT_DEPTH {
            if let Ok(obj) = current.get(key) {
                return Some(resolve(&self.doc, obj));
            }
            let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
            current = self.doc.get_object(parent).ok()?.as_dict().ok()?;
        }
        None
    }

    fn resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        self.inherited(page_id, b"Resources")?.as_dict().ok()
    }

    fn resource_category(&self, page_id: ObjectId, category: &[u8]) -> Option<&Dictionary> {
        let resources = self.resources(page_id)?;
        resolve(&self.doc, resources.get(category).ok()?)
            .as_dict()
            .ok()
    }

    /// Page MediaBox at 0-based `index`
    pub fn page_rect(&self, index: u32) -> Result<Rect> {
        let page_id = self.page_id(index)?;
        Ok(self
            .inherited(page_id, b"MediaBox")
            .and_then(|obj| rect_from_array(&self.doc, obj))
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_MEDIA_BOX))
    }

    /// Names of image XObjects in the page resources
    fn image_xobjects(&self, page_id: ObjectId) -> HashMap<Vec<u8>, Option<ObjectId>> {
        let mut images = HashMap::new();
        let Some(xobjects) = self.resource_category(page_id, b"XObject") else {
            return images;
        };
        for (name, entry) in xobjects.iter() {
            let id = entry.as_reference().ok();
            let is_image = resolve(&self.doc, entry)
                .as_stream()
                .ok()
                .and_then(|s| s.dict.get(b"Subtype").ok())
                .and_then(|s| s.as_name().ok())
                .map(|s| s == b"Image")
                .unwrap_or(false);
            if is_image {
                images.insert(name.clone(), id);
            }
        }
        images
    }

    fn font_metrics(&self, page_id: ObjectId) -> HashMap<Vec<u8>, FontMetrics> {
        let mut fonts = HashMap::new();
        let Some(font_dict) = self.resource_category(page_id, b"Font") else {
            return fonts;
        };
        for (name, entry) in font_dict.iter() {
            let Ok(font) = resolve(&self.doc, entry).as_dict() else {
                continue;
            };
            let mut metrics = FontMetrics::default();
            let subtype = font.get(b"Subtype").and_then(|s| s.as_name()).unwrap_or(b"");
            if subtype == b"Type0" {
                metrics.two_byte = true;
                metrics.missing_width = font
                    .get(b"DW")
                    .ok()
                    .and_then(|o| as_number(resolve(&self.doc, o)))
                    .unwrap_or(1000.0);
            } else {
                metrics.first_char = font
                    .get(b"FirstChar")
                    .ok()
                    .and_then(|o| as_number(resolve(&self.doc, o)))
                    .unwrap_or(0.0) as i64;
                if let Ok(widths) = font.get(b"Widths") {
                    if let Ok(arr) = resolve(&self.doc, widths).as_array() {
                        metrics.widths = arr
                            .iter()
                            .map(|o| as_number(resolve(&self.doc, o)).unwrap_or(0.0))
                            .collect();
                    }
                }
            }
            fonts.insert(name.clone(), metrics);
        }
        fonts
    }

    /// Streams making up the page content, in drawing order.
    ///
    /// `/Contents` may be absent, a stream, or an array of streams, each
    /// either direct or behind a reference.
    fn content_streams(&self, page_id: ObjectId) -> Result<Vec<&Stream>> {
        let Ok(contents) = self.page_dict(page_id)?.get(b"Contents") else {
            return Ok(Vec::new());
        };
        match resolve(&self.doc, contents) {
            Object::Stream(stream) => Ok(vec![stream]),
            Object::Array(parts) => parts
                .iter()
                .map(|part| match resolve(&self.doc, part) {
                    Object::Stream(stream) => Ok(stream),
                    _ => Err(Error::InvalidPdf {
                        reason: "Content array entry is not a stream".to_string(),
                    }),
                })
                .collect(),
            Object::Null => Ok(Vec::new()),
            _ => Err(Error::InvalidPdf {
                reason: "Page /Contents is neither a stream nor an array".to_string(),
            }),
        }
    }

    fn decode_content(&self, page_id: ObjectId) -> Result<Vec<Operation>> {
        let mut bytes = Vec::new();
        for stream in self.content_streams(page_id)? {
            // Unfiltered streams have no decoded form
            match stream.decompressed_content() {
                Ok(data) => bytes.extend_from_slice(&data),
                Err(_) => bytes.extend_from_slice(&stream.content),
            }
            // Array parts are concatenated with whitespace between them
            bytes.push(b'\n');
        }
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Content::decode(&bytes)?.operations)
    }

    /// Interpret the page content stream into drawn items
    fn scan(&self, page_id: ObjectId) -> Result<(Vec<Operation>, Vec<ContentItem>)> {
        let operations = self.decode_content(page_id)?;
        let fonts = self.font_metrics(page_id);
        let images = self.image_xobjects(page_id);

        let mut items = Vec::new();
        let mut ctm = Matrix::IDENTITY;
        let mut stack: Vec<(Matrix, TextState)> = Vec::new();
        let mut ts = TextState::default();
        let mut block = 0usize;
        let mut new_line = false;

        for (op_index, op) in operations.iter().enumerate() {
            let mut shown: Option<(f32, String)> = None;
            match op.operator.as_str() {
                "q" => stack.push((ctm, ts.clone())),
                "Q" => {
                    if let Some((saved_ctm, saved_ts)) = stack.pop() {
                        ctm = saved_ctm;
                        ts = saved_ts;
                    }
                }
                "cm" => ctm = operand_matrix(op).then(&ctm),
                "BT" => {
                    ts.tm = Matrix::IDENTITY;
                    ts.tlm = Matrix::IDENTITY;
                    block += 1;
                    new_line = false;
                }
                "Tf" => {
                    let name = op.operands.first().and_then(|o| o.as_name().ok());
                    ts.font = name
                        .and_then(|n| fonts.get(n))
                        .cloned()
                        .unwrap_or_default();
                    ts.size = operand(op, 1);
                }
                "Tc" => ts.char_spacing = operand(op, 0),
                "Tw" => ts.word_spacing = operand(op, 0),
                "Tz" => ts.horizontal_scale = operand(op, 0) / 100.0,
                "TL" => ts.leading = operand(op, 0),
                "Td" => {
                    ts.next_line(operand(op, 0), operand(op, 1));
                    new_line = true;
                }
                "TD" => {
                    ts.leading = -operand(op, 1);
                    ts.next_line(operand(op, 0), operand(op, 1));
                    new_line = true;
                }
                "Tm" => {
                    ts.tlm = operand_matrix(op);
                    ts.tm = ts.tlm;
                    new_line = true;
                }
                "T*" => {
                    ts.next_line(0.0, -ts.leading);
                    new_line = true;
                }
                "Tj" | "'" | "\"" => {
                    if op.operator == "'" {
                        ts.next_line(0.0, -ts.leading);
                        new_line = true;
                    } else if op.operator == "\"" {
                        ts.word_spacing = operand(op, 0);
                        ts.char_spacing = operand(op, 1);
                        ts.next_line(0.0, -ts.leading);
                        new_line = true;
                    }
                    if let Some(bytes) = op.operands.last().and_then(string_bytes) {
                        shown = Some((ts.string_advance(bytes), ts.decode(bytes)));
                    }
                }
                "TJ" => {
                    if let Some(Ok(parts)) = op.operands.first().map(|o| o.as_array()) {
                        let mut advance = 0.0;
                        let mut text = String::new();
                        for part in parts {
                            if let Some(bytes) = string_bytes(part) {
                                advance += ts.string_advance(bytes);
                                text.push_str(&ts.decode(bytes));
                            } else if let Some(n) = as_number(part) {
                                advance -= n / 1000.0 * ts.size * ts.horizontal_scale;
                            }
                        }
                        shown = Some((advance, text));
                    }
                }
                "Do" => {
                    if let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) {
                        if images.contains_key(name) {
                            let rect = ctm.transform_rect(&Rect::new(0.0, 0.0, 1.0, 1.0));
                            items.push(ContentItem::Image {
                                op_index,
                                name: name.to_vec(),
                                rect,
                            });
                        }
                    }
                }
                _ => {}
            }

            if let Some((advance, text)) = shown {
                // Bare displacements (e.g. redacted runs) draw nothing
                if advance != 0.0 && ts.size != 0.0 && !text.is_empty() {
                    let local = Rect::new(0.0, -0.25 * ts.size, advance, 0.85 * ts.size);
                    let trm = ts.tm.then(&ctm);
                    let rect = trm.transform_rect(&local);
                    let (_, baseline_y) = trm.apply(0.0, 0.0);
                    let leading = if ts.leading > 0.0 {
                        ts.leading
                    } else {
                        1.2 * ts.size
                    };
                    let (_, lead_y) = trm.apply(0.0, leading);
                    items.push(ContentItem::Text {
                        op_index,
                        block,
                        rect,
                        text,
                        new_line,
                        advance,
                        scale: ts.size * ts.horizontal_scale,
                        baseline_y,
                        line_height: (lead_y - baseline_y).abs(),
                    });
                    new_line = false;
                }
                ts.tm = Matrix::translate(advance, 0.0).then(&ts.tm);
            }
        }

        Ok((operations, items))
    }

    /// Images available to the page at 0-based `index`
    pub fn page_images(&self, index: u32) -> Result<Vec<PageImage>> {
        let page_id = self.page_id(index)?;
        let (_, items) = self.scan(page_id)?;
        let mut images: Vec<PageImage> = self
            .image_xobjects(page_id)
            .into_iter()
            .map(|(name, id)| {
                let rect = items.iter().find_map(|item| match item {
                    ContentItem::Image { name: n, rect, .. } if *n == name => Some(*rect),
                    _ => None,
                });
                PageImage {
                    name: String::from_utf8_lossy(&name).into_owned(),
                    id,
                    rect,
                }
            })
            .collect();
        images.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(images)
    }

    /// Remove an image from the page: every `Do` placement and its resource entry
    pub fn delete_image(&mut self, index: u32, image: &PageImage) -> Result<()> {
        let page_id = self.page_id(index)?;
        let (operations, _) = self.scan(page_id)?;
        let name = image.name.as_bytes();

        let before = operations.len();
        let kept: Vec<Operation> = operations
            .into_iter()
            .filter(|op| {
                !(op.operator == "Do"
                    && op.operands.first().and_then(|o| o.as_name().ok()) == Some(name))
            })
            .collect();
        if kept.len() != before {
            self.write_content(page_id, kept)?;
        }

        self.resource_category_mut(page_id, b"XObject")?.remove(name);
        Ok(())
    }

    /// Text blocks on the page at 0-based `index`.
    ///
    /// A block is a run of lines inside one text object; a line move wider
    /// than [`BLOCK_GAP_FACTOR`] times the line spacing starts a new block.
    pub fn text_blocks(&self, index: u32) -> Result<Vec<TextBlock>> {
        let page_id = self.page_id(index)?;
        let (_, items) = self.scan(page_id)?;

        let mut blocks: Vec<TextBlock> = Vec::new();
        // Text object and baseline of the last line added
        let mut last: Option<(usize, f32)> = None;
        for item in items {
            let ContentItem::Text {
                block,
                rect,
                text,
                new_line,
                baseline_y,
                line_height,
                ..
            } = item
            else {
                continue;
            };
            let continues = match (last, blocks.last()) {
                (Some((current, previous_y)), Some(_)) if current == block => {
                    !new_line || (previous_y - baseline_y).abs() <= BLOCK_GAP_FACTOR * line_height
                }
                _ => false,
            };
            match blocks.last_mut() {
                Some(tb) if continues => {
                    if new_line && !tb.text.is_empty() {
                        tb.text.push('\n');
                    }
                    tb.text.push_str(&text);
                    tb.rect = tb.rect.union(&rect);
                }
                _ => blocks.push(TextBlock { rect, text }),
            }
            last = Some((block, baseline_y));
        }
        Ok(blocks)
    }

    /// Plain text of a page, blocks separated by newlines
    pub fn page_text(&self, index: u32) -> Result<String> {
        Ok(self
            .text_blocks(index)?
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Rectangles of text runs containing `needle`
    pub fn search_text(&self, index: u32, needle: &str) -> Result<Vec<Rect>> {
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let page_id = self.page_id(index)?;
        let (_, items) = self.scan(page_id)?;
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                ContentItem::Text { rect, text, .. } if text.contains(needle) => Some(rect),
                _ => None,
            })
            .collect())
    }

    fn annots_array(&self, page_id: ObjectId) -> Result<Vec<Object>> {
        let page = self.page_dict(page_id)?;
        Ok(match page.get(b"Annots") {
            Ok(obj) => resolve(&self.doc, obj)
                .as_array()
                .map(|a| a.to_vec())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        })
    }

    fn set_annots_array(&mut self, page_id: ObjectId, annots: Vec<Object>) -> Result<()> {
        let page = self.page_dict(page_id)?;
        let indirect = match page.get(b"Annots") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        match indirect {
            Some(id) => *self.doc.get_object_mut(id)? = Object::Array(annots),
            None => self.page_dict_mut(page_id)?.set("Annots", Object::Array(annots)),
        }
        Ok(())
    }

    fn link_from_annot(&self, annot: &Object) -> Option<LinkAnnotation> {
        let dict = resolve(&self.doc, annot).as_dict().ok()?;
        if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Link" {
            return None;
        }
        let rect = rect_from_array(&self.doc, dict.get(b"Rect").ok()?)?;
        let uri = dict
            .get(b"A")
            .ok()
            .and_then(|a| resolve(&self.doc, a).as_dict().ok())
            .filter(|a| {
                a.get(b"S")
                    .ok()
                    .and_then(|s| s.as_name().ok())
                    .map(|s| s == b"URI")
                    .unwrap_or(false)
            })
            .and_then(|a| a.get(b"URI").ok())
            .and_then(|u| string_bytes(resolve(&self.doc, u)))
            .map(decode_text_string);
        Some(LinkAnnotation { uri, rect })
    }

    /// Link annotations on the page at 0-based `index`
    pub fn links(&self, index: u32) -> Result<Vec<LinkAnnotation>> {
        let page_id = self.page_id(index)?;
        Ok(self
            .annots_array(page_id)?
            .iter()
            .filter_map(|a| self.link_from_annot(a))
            .collect())
    }

    /// Permanently remove content intersecting any of `regions`.
    ///
    /// Text runs intersecting a region are dropped (replaced by an equal
    /// horizontal displacement so later runs keep their position). Image
    /// placements are dropped only when fully covered by a region. Link
    /// annotations intersecting a region are removed.
    pub fn apply_redactions(&mut self, index: u32, regions: &[Rect]) -> Result<RedactionSummary> {
        let mut summary = RedactionSummary::default();
        if regions.is_empty() {
            return Ok(summary);
        }
        let page_id = self.page_id(index)?;
        let (operations, items) = self.scan(page_id)?;

        let mut replacements: HashMap<usize, Vec<Operation>> = HashMap::new();
        for item in &items {
            match item {
                ContentItem::Text {
                    op_index,
                    rect,
                    advance,
                    scale,
                    ..
                } if regions.iter().any(|r| r.intersects(rect)) => {
                    replacements.insert(
                        *op_index,
                        redacted_text_ops(&operations[*op_index], *advance, *scale),
                    );
                    summary.text_runs += 1;
                }
                ContentItem::Image { op_index, rect, .. }
                    if regions.iter().any(|r| r.union(rect) == *r) =>
                {
                    replacements.insert(*op_index, Vec::new());
                    summary.images += 1;
                }
                _ => {}
            }
        }

        if !replacements.is_empty() {
            let mut rewritten = Vec::with_capacity(operations.len());
            for (i, op) in operations.into_iter().enumerate() {
                match replacements.remove(&i) {
                    Some(ops) => rewritten.extend(ops),
                    None => rewritten.push(op),
                }
            }
            self.write_content(page_id, rewritten)?;
        }

        let annots = self.annots_array(page_id)?;
        let before = annots.len();
        let kept: Vec<Object> = annots
            .into_iter()
            .filter(|a| match self.link_from_annot(a) {
                Some(link) => !regions.iter().any(|r| r.intersects(&link.rect)),
                None => true,
            })
            .collect();
        if kept.len() != before {
            summary.links = before - kept.len();
            self.set_annots_array(page_id, kept)?;
        }

        Ok(summary)
    }

    /// Draw text on top of the existing page content
    pub fn insert_text(&mut self, index: u32, stamp: &TextStamp<'_>) -> Result<()> {
        let page_id = self.page_id(index)?;
        let font_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        self.resource_category_mut(page_id, b"Font")?
            .set(INSERTED_FONT.to_vec(), Object::Reference(font_id));

        let (r, g, b) = stamp.color;
        let mut operations = self.decode_content(page_id)?;
        // Isolate the existing graphics state from the stamp
        operations.insert(0, Operation::new("q", vec![]));
        operations.push(Operation::new("Q", vec![]));
        operations.extend(vec![
            Operation::new("q", vec![]),
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(INSERTED_FONT.to_vec()), stamp.font_size.into()],
            ),
            Operation::new("Td", vec![stamp.x.into(), stamp.y.into()]),
            Operation::new(
                "Tj",
                vec![Object::String(
                    encode_win_ansi(stamp.text),
                    StringFormat::Literal,
                )],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]);
        self.write_content(page_id, operations)
    }

    /// Add a clickable URI link annotation
    pub fn insert_link(&mut self, index: u32, rect: &Rect, uri: &str) -> Result<()> {
        let page_id = self.page_id(index)?;
        let annot_id = self.doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => rect_to_array(rect),
            "Border" => vec![0.into(), 0.into(), 0.into()],
            "A" => dictionary! {
                "S" => "URI",
                "URI" => Object::String(uri.as_bytes().to_vec(), StringFormat::Literal),
            },
        });
        let mut annots = self.annots_array(page_id)?;
        annots.push(Object::Reference(annot_id));
        self.set_annots_array(page_id, annots)
    }

    /// Delete the page at 0-based `index`
    pub fn delete_page(&mut self, index: u32) -> Result<()> {
        self.page_id(index)?;
        self.doc.delete_pages(&[index + 1]);
        Ok(())
    }

    /// Serialize the document
    pub fn save_to_bytes(&mut self, options: SaveOptions) -> Result<Vec<u8>> {
        if options.garbage {
            self.doc.prune_objects();
            self.doc.renumber_objects();
        }
        if options.deflate {
            self.doc.compress();
        }
        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Replace the page content with a single new stream.
    ///
    /// The previous streams are left for garbage collection, since other
    /// pages may share them.
    fn write_content(&mut self, page_id: ObjectId, operations: Vec<Operation>) -> Result<()> {
        let encoded = Content { operations }.encode()?;
        let stream_id = self.doc.add_object(Stream::new(Dictionary::new(), encoded));
        self.page_dict_mut(page_id)?
            .set("Contents", Object::Reference(stream_id));
        Ok(())
    }

    /// Give the page its own `/Resources` entry, copying inherited ones
    fn own_resources(&mut self, page_id: ObjectId) -> Result<ResourcesLocation> {
        match self.page_dict(page_id)?.get(b"Resources") {
            Ok(Object::Reference(id)) => return Ok(ResourcesLocation::Indirect(*id)),
            Ok(Object::Dictionary(_)) => return Ok(ResourcesLocation::Inline),
            _ => {}
        }
        let inherited = self.resources(page_id).cloned().unwrap_or_default();
        self.page_dict_mut(page_id)?.set("Resources", inherited);
        Ok(ResourcesLocation::Inline)
    }

    fn resources_mut(
        &mut self,
        page_id: ObjectId,
        location: ResourcesLocation,
    ) -> Result<&mut Dictionary> {
        match location {
            ResourcesLocation::Indirect(id) => Ok(self.doc.get_object_mut(id)?.as_dict_mut()?),
            ResourcesLocation::Inline => Ok(self
                .page_dict_mut(page_id)?
                .get_mut(b"Resources")?
                .as_dict_mut()?),
        }
    }

    /// Mutable resource sub-dictionary (`/Font`, `/XObject`, …), created if missing
    fn resource_category_mut(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
    ) -> Result<&mut Dictionary> {
        let location = self.own_resources(page_id)?;
        let indirect = match self.resources_mut(page_id, location)?.get(category) {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        if let Some(id) = indirect {
            return Ok(self.doc.get_object_mut(id)?.as_dict_mut()?);
        }

        let resources = self.resources_mut(page_id, location)?;
        if !matches!(resources.get(category), Ok(Object::Dictionary(_))) {
            resources.set(category.to_vec(), Dictionary::new());
        }
        Ok(resources.get_mut(category)?.as_dict_mut()?)
    }
}

/// Operations replacing a redacted text-showing operation
fn redacted_text_ops(op: &Operation, advance: f32, scale: f32) -> Vec<Operation> {
    let mut ops = Vec::new();
    match op.operator.as_str() {
        "'" => ops.push(Operation::new("T*", vec![])),
        "\"" => {
            let spacing = |i: usize| op.operands.get(i).cloned().unwrap_or(Object::Integer(0));
            ops.push(Operation::new("Tw", vec![spacing(0)]));
            ops.push(Operation::new("Tc", vec![spacing(1)]));
            ops.push(Operation::new("T*", vec![]));
        }
        _ => {}
    }
    if scale != 0.0 {
        let displacement = -advance * 1000.0 / scale;
        ops.push(Operation::new(
            "TJ",
            vec![Object::Array(vec![Object::Real(displacement)])],
        ));
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// How a test page stores its `/Contents`
    #[derive(Clone, Copy)]
    enum Layout {
        Missing,
        Stream,
        Array,
        IndirectArray,
    }

    /// One-page document, Helvetica as /F1, content split into `parts` streams
    fn page_with(layout: Layout, parts: Vec<Vec<Operation>>) -> PdfDocument {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let streams: Vec<Object> = parts
            .into_iter()
            .map(|operations| {
                let encoded = Content { operations }.encode().unwrap();
                doc.add_object(Stream::new(Dictionary::new(), encoded)).into()
            })
            .collect();

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        };
        match layout {
            Layout::Missing => {}
            Layout::Stream => page.set("Contents", streams[0].clone()),
            Layout::Array => page.set("Contents", streams),
            Layout::IndirectArray => {
                let array_id = doc.add_object(Object::Array(streams));
                page.set("Contents", array_id);
            }
        }
        let page_id = doc.add_object(page);

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
        PdfDocument::from_document(doc)
    }

    fn single_page(operations: Vec<Operation>) -> PdfDocument {
        page_with(Layout::Stream, vec![operations])
    }

    fn stamp() -> TextStamp<'static> {
        TextStamp {
            text: "Romandl",
            x: 50.0,
            y: 42.0,
            font_size: 18.0,
            color: (1.0, 0.0, 0.0),
        }
    }

    fn text_ops(x: i64, y: i64, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    #[test]
    fn test_open_rejects_non_pdf() {
        let result = PdfDocument::open_bytes(b"Hello World");
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn test_text_block_geometry() {
        let doc = single_page(text_ops(100, 700, "Hello"));
        let blocks = doc.text_blocks(0).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Hello");
        let rect = blocks[0].rect;
        assert!((rect.x0 - 100.0).abs() < 0.01);
        // 5 glyphs at the 500/1000 fallback width, 12pt
        assert!((rect.x1 - 130.0).abs() < 0.01);
        assert!(rect.y0 < 700.0 && rect.y1 > 700.0);
    }

    #[test]
    fn test_cm_is_applied_to_text() {
        let mut ops = vec![Operation::new(
            "cm",
            vec![1.into(), 0.into(), 0.into(), 1.into(), 50.into(), 0.into()],
        )];
        ops.extend(text_ops(100, 700, "A"));
        let doc = single_page(ops);
        let blocks = doc.text_blocks(0).unwrap();
        assert!((blocks[0].rect.x0 - 150.0).abs() < 0.01);
    }

    #[test]
    fn test_search_text_finds_run() {
        let mut ops = text_ops(100, 700, "Intro");
        ops.extend(text_ops(50, 42, "Romandl"));
        let doc = single_page(ops);
        let hits = doc.search_text(0, "Romandl").unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].y0 < 42.0);
        assert!(doc.search_text(0, "missing").unwrap().is_empty());
    }

    #[test]
    fn test_redaction_removes_intersecting_text_only() {
        let mut ops = text_ops(100, 700, "keep me");
        ops.extend(text_ops(100, 400, "mail@example.com"));
        let mut doc = single_page(ops);

        let region = Rect::new(90.0, 390.0, 300.0, 420.0);
        let summary = doc.apply_redactions(0, &[region]).unwrap();
        assert_eq!(summary.text_runs, 1);

        let text = doc.page_text(0).unwrap();
        assert!(text.contains("keep me"));
        assert!(!text.contains('@'));
    }

    #[test]
    fn test_redaction_preserves_following_run_position() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![100.into(), 500.into()]),
            Operation::new("Tj", vec![Object::string_literal("AAAA")]),
            Operation::new("Tj", vec![Object::string_literal("BB")]),
            Operation::new("ET", vec![]),
        ];
        let mut doc = single_page(ops);
        let before = doc.search_text(0, "BB").unwrap()[0];

        // Covers only the first run
        doc.apply_redactions(0, &[Rect::new(99.0, 495.0, 110.0, 510.0)])
            .unwrap();
        let after = doc.search_text(0, "BB").unwrap()[0];
        assert!((after.x0 - before.x0).abs() < 0.01);
    }

    #[test]
    fn test_insert_and_find_link() {
        let mut doc = single_page(text_ops(100, 700, "Body"));
        let rect = Rect::new(50.0, 27.0, 150.0, 47.0);
        doc.insert_link(0, &rect, "https://t.me/romandl").unwrap();

        let links = doc.links(0).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].uri.as_deref(), Some("https://t.me/romandl"));
        assert_eq!(links[0].rect, rect);

        let summary = doc.apply_redactions(0, &[rect]).unwrap();
        assert_eq!(summary.links, 1);
        assert!(doc.links(0).unwrap().is_empty());
    }

    #[test]
    fn test_insert_text_is_searchable() {
        let mut doc = single_page(text_ops(100, 700, "Body"));
        doc.insert_text(0, &stamp()).unwrap();
        assert_eq!(doc.search_text(0, "Romandl").unwrap().len(), 1);
        assert!(doc.page_text(0).unwrap().contains("Body"));
    }

    #[test]
    fn test_delete_page_out_of_range() {
        let mut doc = single_page(text_ops(100, 700, "Only"));
        let result = doc.delete_page(3);
        assert!(matches!(
            result,
            Err(Error::PageOutOfRange { page: 4, total: 1 })
        ));
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_save_round_trip_keeps_text() {
        let mut doc = single_page(text_ops(100, 700, "Persist"));
        let bytes = doc.save_to_bytes(SaveOptions::compact()).unwrap();
        let reopened = PdfDocument::open_bytes(&bytes).unwrap();
        assert_eq!(reopened.page_count(), 1);
        assert!(reopened.page_text(0).unwrap().contains("Persist"));
    }

    #[test]
    fn test_insert_text_on_page_without_contents() {
        let mut doc = page_with(Layout::Missing, vec![]);
        assert!(doc.text_blocks(0).unwrap().is_empty());

        doc.insert_text(0, &stamp()).unwrap();
        assert_eq!(doc.search_text(0, "Romandl").unwrap().len(), 1);
    }

    #[rstest]
    #[case(Layout::Stream)]
    #[case(Layout::Array)]
    #[case(Layout::IndirectArray)]
    fn test_edits_reach_every_contents_layout(#[case] layout: Layout) {
        let parts = match layout {
            Layout::Stream => {
                let mut ops = text_ops(100, 700, "Intro");
                ops.extend(text_ops(100, 400, "mail me@example.com"));
                vec![ops]
            }
            _ => vec![
                text_ops(100, 700, "Intro"),
                text_ops(100, 400, "mail me@example.com"),
            ],
        };
        let mut doc = page_with(layout, parts);
        assert_eq!(doc.page_text(0).unwrap(), "Intro\nmail me@example.com");

        let mention = doc.search_text(0, "@").unwrap();
        let summary = doc.apply_redactions(0, &mention).unwrap();
        assert_eq!(summary.text_runs, 1);
        doc.insert_text(0, &stamp()).unwrap();

        // Changes survive a save and reopen
        let bytes = doc.save_to_bytes(SaveOptions::compact()).unwrap();
        let reopened = PdfDocument::open_bytes(&bytes).unwrap();
        let text = reopened.page_text(0).unwrap();
        assert!(text.contains("Intro"));
        assert!(!text.contains('@'));
        assert_eq!(reopened.search_text(0, "Romandl").unwrap().len(), 1);
    }

    #[test]
    fn test_non_stream_contents_is_an_error() {
        let mut doc = single_page(text_ops(100, 700, "x"));
        let page_id = doc.page_id(0).unwrap();
        doc.page_dict_mut(page_id)
            .unwrap()
            .set("Contents", Object::Integer(3));
        assert!(matches!(doc.text_blocks(0), Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn test_text_object_splits_at_paragraph_gap() {
        // One text object: two lines 14pt apart, then a paragraph 60pt lower
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("TL", vec![14.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("First line")]),
            Operation::new("T*", vec![]),
            Operation::new("Tj", vec![Object::string_literal("Second line")]),
            Operation::new("Td", vec![0.into(), (-60).into()]),
            Operation::new("Tj", vec![Object::string_literal("write to a@b.c")]),
            Operation::new("ET", vec![]),
        ];
        let mut doc = single_page(ops);

        let blocks = doc.text_blocks(0).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "First line\nSecond line");
        assert_eq!(blocks[1].text, "write to a@b.c");

        let mention: Vec<Rect> = blocks
            .iter()
            .filter(|b| b.text.contains('@'))
            .map(|b| b.rect)
            .collect();
        doc.apply_redactions(0, &mention).unwrap();
        assert_eq!(doc.page_text(0).unwrap(), "First line\nSecond line");
    }

    #[test]
    fn test_decode_text_string_utf16() {
        let bytes = [0xFE, 0xFF, 0x00, b'h', 0x00, b'i'];
        assert_eq!(decode_text_string(&bytes), "hi");
        assert_eq!(decode_text_string(b"https://t.me/x"), "https://t.me/x");
    }
}
