//! Compositing a single-page overlay onto every page of a document

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, instrument};

use super::geometry::{effective_resources, page_size_of, resolve};
use super::writer::real;
use crate::error::{Error, Result};

/// Prefix of the XObject names under which overlays are registered
const OVERLAY_NAME_PREFIX: &str = "Overlay";

/// Overlay the first page of `overlay_path` onto every page of `target_path`
///
/// The overlay is drawn after the existing page content, so it lands on top.
/// Existing content is wrapped in `q`/`Q` first so any transformation it
/// leaves behind cannot displace the overlay. Everything else about the
/// target (trailer, catalog, page count, annotations) is kept as is.
///
/// `output_path` may be the same file as `target_path`.
///
/// # Example
///
/// ```no_run
/// use pdf_hashmark::pdf::overlay_pdf;
/// use std::path::Path;
///
/// overlay_pdf(
///     Path::new("source.pdf"),
///     Path::new("watermark.pdf"),
///     Path::new("output.pdf")
/// ).expect("Failed to overlay");
/// ```
#[instrument(
    skip_all,
    fields(target = %target_path.display(), overlay = %overlay_path.display())
)]
pub fn overlay_pdf(target_path: &Path, overlay_path: &Path, output_path: &Path) -> Result<()> {
    for path in [target_path, overlay_path] {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
    }

    let mut target = Document::load(target_path)?;
    let mut overlay = Document::load(overlay_path)?;
    overlay.decompress();

    let overlay_page = overlay
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| Error::EmptyPdf(overlay_path.to_path_buf()))?;

    let target_pages: Vec<ObjectId> = target.get_pages().into_values().collect();
    if target_pages.is_empty() {
        return Err(Error::EmptyPdf(target_path.to_path_buf()));
    }

    let form_id = import_page_as_form(&mut target, &overlay, overlay_page)?;

    // Shared across pages: isolate the original content's graphics state
    let save_id = target.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = target.add_object(Stream::new(Dictionary::new(), b"Q\n".to_vec()));
    let mut invoke_ids: HashMap<Vec<u8>, ObjectId> = HashMap::new();

    for page_id in &target_pages {
        let name = register_form(&mut target, *page_id, form_id)?;

        let invoke_id = *invoke_ids.entry(name.clone()).or_insert_with(|| {
            let mut invoke = b"q\n/".to_vec();
            invoke.extend_from_slice(&name);
            invoke.extend_from_slice(b" Do\nQ\n");
            target.add_object(Stream::new(Dictionary::new(), invoke))
        });

        wrap_and_append_content(&mut target, *page_id, save_id, restore_id, invoke_id)?;
    }

    info!(pages = target_pages.len(), "Overlay applied to every page");

    target.compress();
    target.save(output_path)?;

    Ok(())
}

/// Copy an overlay page into `target` as a Form XObject
///
/// Only the objects reachable from the page's resources are imported, with
/// fresh IDs above everything already in the target.
fn import_page_as_form(
    target: &mut Document,
    overlay: &Document,
    page_id: ObjectId,
) -> Result<ObjectId> {
    let resources = Object::Dictionary(effective_resources(overlay, page_id));

    let mut referenced = BTreeSet::new();
    collect_references(overlay, &resources, &mut referenced);

    let first_free = target
        .objects
        .keys()
        .map(|id| id.0)
        .max()
        .unwrap_or(0)
        .max(target.max_id)
        + 1;

    let id_map: HashMap<ObjectId, ObjectId> = referenced
        .iter()
        .zip(first_free..)
        .map(|(old_id, new_num)| (*old_id, (new_num, 0)))
        .collect();

    for (old_id, new_id) in &id_map {
        let object = overlay.get_object(*old_id)?;
        target.objects.insert(*new_id, renumber_object_references(object, &id_map));
    }
    target.max_id = target.max_id.max(first_free + id_map.len() as u32 - 1);

    debug!(imported = id_map.len(), "Imported overlay resources");

    let size = page_size_of(overlay, page_id);
    let mut form = Dictionary::new();
    form.set("Type", Object::Name(b"XObject".to_vec()));
    form.set("Subtype", Object::Name(b"Form".to_vec()));
    form.set("FormType", Object::Integer(1));
    form.set("BBox", Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        real(size.width),
        real(size.height),
    ]));
    form.set("Matrix", Object::Array(vec![
        Object::Integer(1),
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(1),
        Object::Integer(0),
        Object::Integer(0),
    ]));
    form.set("Resources", renumber_object_references(&resources, &id_map));

    let content = page_content_bytes(overlay, page_id);
    Ok(target.add_object(Stream::new(form, content)))
}

/// Gather every object ID reachable from `object`
fn collect_references(doc: &Document, object: &Object, seen: &mut BTreeSet<ObjectId>) {
    match object {
        Object::Reference(id) => {
            if seen.insert(*id) {
                if let Ok(target) = doc.get_object(*id) {
                    collect_references(doc, target, seen);
                }
            }
        }
        Object::Array(items) => {
            for item in items {
                collect_references(doc, item, seen);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                collect_references(doc, value, seen);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                collect_references(doc, value, seen);
            }
        }
        _ => {}
    }
}

/// Renumber all object references in an object
fn renumber_object_references(object: &Object, id_map: &HashMap<ObjectId, ObjectId>) -> Object {
    match object {
        Object::Reference(old_id) => Object::Reference(*id_map.get(old_id).unwrap_or(old_id)),
        Object::Array(arr) => {
            Object::Array(arr.iter().map(|obj| renumber_object_references(obj, id_map)).collect())
        }
        Object::Dictionary(dict) => Object::Dictionary(renumber_dictionary(dict, id_map)),
        Object::Stream(stream) => Object::Stream(Stream {
            dict: renumber_dictionary(&stream.dict, id_map),
            content: stream.content.clone(),
            allows_compression: stream.allows_compression,
            start_position: stream.start_position,
        }),
        _ => object.clone(),
    }
}

fn renumber_dictionary(dict: &Dictionary, id_map: &HashMap<ObjectId, ObjectId>) -> Dictionary {
    let mut new_dict = Dictionary::new();
    for (key, value) in dict.iter() {
        new_dict.set(key.clone(), renumber_object_references(value, id_map));
    }
    new_dict
}

/// Content stream references of a page, in drawing order
///
/// `Contents` may also be a reference to an array of streams.
fn content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page = doc.get_dictionary(page_id)?;

    let refs = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => vec![],
    };

    Ok(refs)
}

/// Concatenated (already decompressed) content of a page
fn page_content_bytes(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let mut content = Vec::new();

    for item in content_refs(doc, page_id).unwrap_or_default() {
        if let Ok(Object::Stream(stream)) = resolve(doc, &item) {
            content.extend_from_slice(&stream.content);
            content.push(b'\n');
        }
    }

    content
}

/// Add the form to the page's XObject resources under an unused name
///
/// Inherited resources are copied onto the page so the form can be added
/// without touching siblings sharing the same parent.
fn register_form(doc: &mut Document, page_id: ObjectId, form_id: ObjectId) -> Result<Vec<u8>> {
    let mut resources = effective_resources(doc, page_id);

    let mut xobjects = match resources.get(b"XObject") {
        Ok(existing) => match resolve(doc, existing)? {
            Object::Dictionary(dict) => dict.clone(),
            _ => Dictionary::new(),
        },
        Err(_) => Dictionary::new(),
    };

    let mut n = 0;
    let name = loop {
        let candidate = format!("{}{}", OVERLAY_NAME_PREFIX, n).into_bytes();
        if !xobjects.has(&candidate) {
            break candidate;
        }
        n += 1;
    };

    xobjects.set(name.clone(), Object::Reference(form_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    if let Object::Dictionary(ref mut page_dict) = doc.get_object_mut(page_id)? {
        page_dict.set("Resources", Object::Dictionary(resources));
    }

    Ok(name)
}

/// Wrap the page's existing content in q/Q and append the overlay invocation
fn wrap_and_append_content(
    doc: &mut Document,
    page_id: ObjectId,
    save_id: ObjectId,
    restore_id: ObjectId,
    invoke_id: ObjectId,
) -> Result<()> {
    let existing = content_refs(doc, page_id)?;

    let mut contents = Vec::with_capacity(existing.len() + 3);
    if !existing.is_empty() {
        contents.push(Object::Reference(save_id));
        contents.extend(existing);
        contents.push(Object::Reference(restore_id));
    }
    contents.push(Object::Reference(invoke_id));

    if let Object::Dictionary(ref mut page_dict) = doc.get_object_mut(page_id)? {
        page_dict.set("Contents", Object::Array(contents));
    }

    Ok(())
}
