//! Text extraction from the PDF manual.
//!
//! This interprets just enough of a page's content stream to know where each
//! string is drawn: the graphics state stack, the text matrices and the text
//! state parameters that influence glyph advances. Everything else (paths,
//! images, colors) is skipped.

use super::{Document, Page, Text};
use crate::error::Error;

use lopdf::content::Content;
use lopdf::{Dictionary, Object, ObjectId};

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// The Intel manual, opened as a PDF file.
pub struct PdfDocument {
    doc: lopdf::Document,
    /// Page object IDs, in page order.
    pages: Vec<ObjectId>,
}

impl PdfDocument {
    /// Opens and parses the PDF file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let doc = lopdf::Document::load(path)?;
        let pages = doc.get_pages().values().cloned().collect();
        Ok(PdfDocument { doc, pages })
    }

    fn fonts(&self, page: ObjectId) -> BTreeMap<Vec<u8>, Font> {
        self.doc.get_page_fonts(page)
            .into_iter()
            .map(|(name, dict)| (name, Font::from_dict(&self.doc, dict)))
            .collect()
    }
}

impl fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PdfDocument")
            .field("pages", &self.pages.len())
            .finish()
    }
}

impl Document for PdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page(&self, number: u32) -> Result<Page, Error> {
        let id = number.checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .cloned()
            .ok_or_else(|| Error::Unrecognized(format!("no page {}", number)))?;

        let data = self.doc.get_page_content(id)?;
        let content = Content::decode(&data)?;
        let fonts = self.fonts(id);

        let mut interp = Interpreter::new(&fonts);
        for op in &content.operations {
            interp.exec(&op.operator, &op.operands);
        }

        Ok(Page { number, texts: interp.texts })
    }
}

/// The parts of a font dictionary needed to compute advance widths.
#[derive(Debug)]
struct Font {
    /// Composite fonts use 2-byte character codes.
    composite: bool,
    first_char: u32,
    widths: Vec<f64>,
}

impl Font {
    fn from_dict(doc: &lopdf::Document, dict: &Dictionary) -> Self {
        let composite = match dict.get(b"Subtype").map(|o| resolve(doc, o)) {
            Ok(Object::Name(subtype)) => subtype.as_slice() == b"Type0",
            _ => false,
        };
        let first_char = dict.get(b"FirstChar").ok()
            .and_then(|o| number(resolve(doc, o)))
            .unwrap_or(0.0) as u32;
        let widths = match dict.get(b"Widths").map(|o| resolve(doc, o)) {
            Ok(Object::Array(widths)) => widths.iter()
                .map(|w| number(resolve(doc, w)).unwrap_or(0.0))
                .collect(),
            _ => Vec::new(),
        };
        Font { composite, first_char, widths }
    }

    /// Glyph width in text space units (1/1000 of the font size).
    fn width(&self, code: u32) -> f64 {
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .cloned()
            .unwrap_or(500.0)
    }

    /// Splits a PDF string into character codes.
    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.composite {
            bytes.chunks(2)
                .map(|c| (u32::from(c[0]) << 8) | c.get(1).map_or(0, |&b| u32::from(b)))
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        }
    }
}

fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Maps a character code of a simple font to text, assuming `WinAnsiEncoding`.
fn decode_char(code: u32) -> char {
    match code {
        0x85 => '…',
        0x91 => '‘',
        0x92 => '’',
        0x93 => '“',
        0x94 => '”',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0xAD => '-',
        _ => std::char::from_u32(code).unwrap_or('\u{FFFD}'),
    }
}

/// 2D affine transformation `[a b c d e f]`, as used by PDF.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f64, ty: f64) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// Computes `self × other` (apply `self` first).
    fn then(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [oa, ob, oc, od, oe, of] = other.0;
        Matrix([
            a * oa + b * oc,
            a * ob + b * od,
            c * oa + d * oc,
            c * ob + d * od,
            e * oa + f * oc + oe,
            e * ob + f * od + of,
        ])
    }

    fn x_scale(&self) -> f64 {
        (self.0[0] * self.0[0] + self.0[1] * self.0[1]).sqrt()
    }

    fn y_scale(&self) -> f64 {
        (self.0[2] * self.0[2] + self.0[3] * self.0[3]).sqrt()
    }
}

/// Content stream interpreter state.
struct Interpreter<'a> {
    fonts: &'a BTreeMap<Vec<u8>, Font>,
    ctm: Matrix,
    stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    font: Option<&'a Font>,
    size: f64,
    char_space: f64,
    word_space: f64,
    hscale: f64,
    leading: f64,
    texts: Vec<Text>,
}

impl<'a> Interpreter<'a> {
    fn new(fonts: &'a BTreeMap<Vec<u8>, Font>) -> Self {
        Interpreter {
            fonts,
            ctm: Matrix::IDENTITY,
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font: None,
            size: 0.0,
            char_space: 0.0,
            word_space: 0.0,
            hscale: 1.0,
            leading: 0.0,
            texts: Vec::new(),
        }
    }

    fn exec(&mut self, operator: &str, operands: &[Object]) {
        let num = |i: usize| operands.get(i).and_then(number).unwrap_or(0.0);
        match operator {
            "q" => self.stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                let m = Matrix([num(0), num(1), num(2), num(3), num(4), num(5)]);
                self.ctm = m.then(&self.ctm);
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                self.font = match operands.get(0) {
                    Some(Object::Name(name)) => self.fonts.get(name),
                    _ => None,
                };
                self.size = num(1);
            }
            "Tc" => self.char_space = num(0),
            "Tw" => self.word_space = num(0),
            "Tz" => self.hscale = num(0) / 100.0,
            "TL" => self.leading = num(0),
            "Td" => self.move_line(num(0), num(1)),
            "TD" => {
                self.leading = -num(1);
                self.move_line(num(0), num(1));
            }
            "Tm" => {
                self.tlm = Matrix([num(0), num(1), num(2), num(3), num(4), num(5)]);
                self.tm = self.tlm;
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(s) = operands.get(0) {
                    self.show(std::slice::from_ref(s));
                }
            }
            "'" => {
                self.next_line();
                if let Some(s) = operands.get(0) {
                    self.show(std::slice::from_ref(s));
                }
            }
            "\"" => {
                self.word_space = num(0);
                self.char_space = num(1);
                self.next_line();
                if let Some(s) = operands.get(2) {
                    self.show(std::slice::from_ref(s));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.get(0) {
                    self.show(items);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.leading;
        self.move_line(0.0, -leading);
    }

    /// Shows the strings in `items` (with `TJ` position adjustments in
    /// between) and records them as a single run.
    fn show(&mut self, items: &[Object]) {
        let font = match self.font {
            Some(font) => font,
            None => return,
        };
        let start = self.tm.then(&self.ctm);
        let mut s = String::new();
        let mut advance = 0.0;

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    for code in font.codes(bytes) {
                        let mut tx = font.width(code) / 1000.0 * self.size + self.char_space;
                        if code == 0x20 {
                            tx += self.word_space;
                        }
                        advance += tx * self.hscale;
                        s.push(decode_char(code));
                    }
                }
                other => {
                    if let Some(adjust) = number(other) {
                        // large negative adjustments are used instead of spaces
                        if adjust < -250.0 && !s.ends_with(' ') {
                            s.push(' ');
                        }
                        advance -= adjust / 1000.0 * self.size * self.hscale;
                    }
                }
            }
        }

        self.tm = Matrix::translate(advance, 0.0).then(&self.tm);
        if s.trim().is_empty() {
            return;
        }
        self.texts.push(Text {
            size: self.size * start.y_scale(),
            x: start.0[4],
            y: start.0[5],
            w: advance * start.x_scale(),
            s,
        });
    }
}
