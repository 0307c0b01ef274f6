//! Minimal single-page PDF construction shared by the overlay renderers

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;

use crate::error::Result;
use crate::layout::{PageSize, Transform};

/// A one-page document under construction
///
/// Resources are registered first, then `finish` writes the page with its
/// content stream and saves the file.
pub(crate) struct OverlayDocument {
    doc: Document,
    pages_id: ObjectId,
    resources: Dictionary,
}

impl OverlayDocument {
    pub(crate) fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        Self {
            doc,
            pages_id,
            resources: Dictionary::new(),
        }
    }

    /// Add an object and expose it to the page as `/<category> /<name>`
    pub(crate) fn add_resource(&mut self, category: &str, name: &str, object: Dictionary) {
        let id = self.doc.add_object(Object::Dictionary(object));

        let mut entries = match self.resources.get(category.as_bytes()) {
            Ok(Object::Dictionary(existing)) => existing.clone(),
            _ => Dictionary::new(),
        };
        entries.set(name, Object::Reference(id));
        self.resources.set(category, Object::Dictionary(entries));
    }

    /// Write the page and save the document to `output`
    pub(crate) fn finish(
        mut self,
        output: &Path,
        page: PageSize,
        operations: Vec<Operation>,
    ) -> Result<()> {
        let content = Content { operations };
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(self.pages_id));
        page_dict.set("MediaBox", media_box(page));
        page_dict.set("Resources", Object::Dictionary(self.resources));
        page_dict.set("Contents", Object::Reference(content_id));
        let page_id = self.doc.add_object(Object::Dictionary(page_dict));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        pages.set("Count", Object::Integer(1));
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(self.pages_id));
        let catalog_id = self.doc.add_object(Object::Dictionary(catalog));
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        self.doc.compress();
        self.doc.save(output)?;

        Ok(())
    }
}

fn media_box(page: PageSize) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        real(page.width),
        real(page.height),
    ])
}

pub(crate) fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// `cm` operator for a transformation matrix
pub(crate) fn concat_matrix(matrix: &Transform) -> Operation {
    Operation::new("cm", matrix.to_array().iter().map(|&v| real(v)).collect())
}

/// Standard Type 1 font, available in every viewer without embedding
pub(crate) fn standard_font(base_font: &str) -> Dictionary {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(base_font.as_bytes().to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    font
}

/// Graphics state applying a constant fill and stroke opacity
pub(crate) fn opacity_state(opacity: f64) -> Dictionary {
    let mut state = Dictionary::new();
    state.set("Type", Object::Name(b"ExtGState".to_vec()));
    state.set("ca", real(opacity));
    state.set("CA", real(opacity));
    state
}

/// Encode text for a WinAnsi simple font
///
/// Latin-1 characters map to their own byte; anything else becomes `?`.
pub(crate) fn win_ansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
