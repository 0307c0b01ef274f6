//! Page geometry and page counting

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::layout::PageSize;

/// Guard against cyclic Parent chains in malformed page trees
const MAX_TREE_DEPTH: usize = 64;

/// Follow a reference to the object it points at
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object> {
    match object {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Look up a page attribute, walking up the page tree for inheritable keys
/// (Resources, MediaBox, CropBox, Rotate)
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node_id = page_id;

    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(node_id).ok()?;

        if let Ok(value) = node.get(key) {
            return resolve(doc, value).ok().cloned();
        }

        node_id = match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => *parent_id,
            _ => return None,
        };
    }

    None
}

/// Read a `[llx lly urx ury]` rectangle into a page size
fn box_to_size(doc: &Document, rect: &Object) -> Option<PageSize> {
    let items = match rect {
        Object::Array(items) => items,
        _ => return None,
    };

    if items.len() != 4 {
        return None;
    }

    let mut coords = [0.0_f64; 4];
    for (slot, item) in coords.iter_mut().zip(items) {
        *slot = match resolve(doc, item).ok()? {
            Object::Integer(n) => *n as f64,
            Object::Real(r) => *r as f64,
            _ => return None,
        };
    }

    Some(PageSize::from_box(coords[0], coords[1], coords[2], coords[3]))
}

/// Size of a page already loaded in a document
///
/// MediaBox is preferred, CropBox is the fallback, and a page with neither
/// is assumed to be A4.
pub(crate) fn page_size_of(doc: &Document, page_id: ObjectId) -> PageSize {
    [b"MediaBox".as_slice(), b"CropBox".as_slice()]
        .iter()
        .filter_map(|key| inherited_attribute(doc, page_id, key))
        .find_map(|rect| box_to_size(doc, &rect))
        .unwrap_or_else(PageSize::a4)
}

/// Resources dictionary in effect for a page, own or inherited
pub(crate) fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    }
}

/// Load a document, failing cleanly on missing files and empty page trees
fn load_with_pages(path: &Path) -> Result<(Document, ObjectId)> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;

    let first_page = doc
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| Error::EmptyPdf(path.to_path_buf()))?;

    Ok((doc, first_page))
}

/// Read the page size of a PDF file
///
/// Only the first page is inspected; every page is assumed to share its size.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn page_size(path: &Path) -> Result<PageSize> {
    let (doc, first_page) = load_with_pages(path)?;
    let size = page_size_of(&doc, first_page);

    debug!(width = size.width, height = size.height, "Read page geometry");
    Ok(size)
}

/// Count the number of pages in a PDF file
pub fn count_pages(path: &Path) -> Result<usize> {
    let (doc, _) = load_with_pages(path)?;
    Ok(doc.get_pages().len())
}
