//! Dotted-path helpers over BSON documents.
//!
//! A dotted path joins nested keys with `.`; a segment made only of ASCII
//! digits addresses an array element, so `"names.0.value"` is the `value`
//! field of the first element of the `names` array.

use bson::{Bson, Document};

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn empty_container(array: bool) -> Bson {
    if array {
        Bson::Array(Vec::new())
    } else {
        Bson::Document(Document::new())
    }
}

fn is_container_for(value: &Bson, array: bool) -> bool {
    matches!(
        (value, array),
        (Bson::Array(_), true) | (Bson::Document(_), false)
    )
}

/// Flatten a document into one-level dotted keys, in document order.
///
/// Empty sub-documents and arrays produce no keys.
pub fn flatten(doc: &Document) -> Vec<(String, Bson)> {
    let mut out = Vec::new();
    for (key, value) in doc {
        flatten_value(key.clone(), value, &mut out);
    }
    out
}

fn flatten_value(path: String, value: &Bson, out: &mut Vec<(String, Bson)>) {
    match value {
        Bson::Document(sub) => {
            for (key, child) in sub {
                flatten_value(format!("{path}.{key}"), child, out);
            }
        }
        Bson::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_value(format!("{path}.{i}"), child, out);
            }
        }
        other => out.push((path, other.clone())),
    }
}

/// Set `value` at `path`, creating intermediate documents and arrays.
///
/// An intermediate scalar standing where a container is needed is replaced.
/// Array gaps are padded with `null`.
pub fn set_path(doc: &mut Document, path: &str, value: Bson) {
    let segments: Vec<&str> = path.split('.').collect();
    set_in_document(doc, &segments, value);
}

fn set_in_document(doc: &mut Document, segments: &[&str], value: Bson) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(next) = rest.first() else {
        doc.insert(*head, value);
        return;
    };

    let array = is_index(next);
    if !doc.get(*head).is_some_and(|v| is_container_for(v, array)) {
        doc.insert(*head, empty_container(array));
    }
    if let Some(slot) = doc.get_mut(*head) {
        set_in_value(slot, rest, value);
    }
}

fn set_in_array(items: &mut Vec<Bson>, segments: &[&str], value: Bson) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Ok(index) = head.parse::<usize>() else {
        return;
    };
    if items.len() <= index {
        items.resize(index + 1, Bson::Null);
    }
    let Some(next) = rest.first() else {
        items[index] = value;
        return;
    };

    let array = is_index(next);
    if !is_container_for(&items[index], array) {
        items[index] = empty_container(array);
    }
    set_in_value(&mut items[index], rest, value);
}

fn set_in_value(slot: &mut Bson, segments: &[&str], value: Bson) {
    match slot {
        Bson::Document(doc) => set_in_document(doc, segments, value),
        Bson::Array(items) => set_in_array(items, segments, value),
        _ => {}
    }
}

/// Read the value at `path`, if every segment resolves.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(sub) => sub.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// True when `path` equals `prefix` or lies beneath it segment-wise.
pub fn is_under(path: &str, prefix: &str) -> bool {
    path == prefix
        || (path.len() > prefix.len()
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn flatten_nested_documents() {
        let flat = flatten(&doc! { "name": { "firstname": "test" } });
        assert_eq!(flat, vec![("name.firstname".to_string(), Bson::from("test"))]);
    }

    #[test]
    fn flatten_keeps_dotted_keys_and_order() {
        let flat = flatten(&doc! {
            "googleGroup.id": 1,
            "metadata": { "path": "primaryEmail", "id": 225.0 },
        });
        let keys: Vec<&str> = flat.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["googleGroup.id", "metadata.path", "metadata.id"]);
    }

    #[test]
    fn flatten_arrays_by_index() {
        let flat = flatten(&doc! {
            "names": [{ "value": "kevin" }, { "value": "alexis" }],
            "person": { "tags": ["a", "b"] },
        });
        let keys: Vec<&str> = flat.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["names.0.value", "names.1.value", "person.tags.0", "person.tags.1"]
        );
    }

    #[test]
    fn set_and_get() {
        let mut doc = Document::new();
        set_path(&mut doc, "banana.color", Bson::from(5));
        set_path(&mut doc, "banana.size", Bson::from(25));
        set_path(&mut doc, "country", Bson::from("France"));

        assert_eq!(doc, doc! { "banana": { "color": 5, "size": 25 }, "country": "France" });
        assert_eq!(get_path(&doc, "banana.color"), Some(&Bson::Int32(5)));
        assert_eq!(get_path(&doc, "unknown"), None);
        assert_eq!(get_path(&doc, "banana.country"), None);
        assert_eq!(get_path(&doc, "country.name"), None);
    }

    #[test]
    fn set_builds_arrays_for_index_segments() {
        let mut doc = Document::new();
        set_path(&mut doc, "names.0", Bson::from("kevin"));
        set_path(&mut doc, "names.2", Bson::from("nicolas"));
        set_path(&mut doc, "people.0.name", Bson::from("alexis"));

        assert_eq!(
            doc,
            doc! {
                "names": ["kevin", null, "nicolas"],
                "people": [{ "name": "alexis" }],
            }
        );
        assert_eq!(get_path(&doc, "people.0.name"), Some(&Bson::from("alexis")));
    }

    #[test]
    fn set_replaces_scalar_in_the_way() {
        let mut doc = doc! { "client": 5 };
        set_path(&mut doc, "client.id", Bson::from(5));
        assert_eq!(doc, doc! { "client": { "id": 5 } });
    }

    #[test]
    fn is_under_respects_segments() {
        assert!(is_under("client", "client"));
        assert!(is_under("client.name", "client"));
        assert!(!is_under("client_id", "client"));
        assert!(!is_under("cli", "client"));
    }
}
