//! Path parsing and nested container access.
//!
//! A path addresses a location inside a JSON value tree using dot and
//! bracket notation, freely mixed and chained: `a.b[0]['c-d']`. Parsing
//! produces an ordered key sequence; the access functions walk (and for
//! `set_in`, build) the container structure.
//!
//! All-digit keys are always sequence indices, quoted or not, and force the
//! parent container to be an array rather than a map.

use serde_json::{Map, Value};

use lockstep_types::error::PathError;

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// One segment of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// A named map key.
    Field(String),
    /// A sequence index.
    Index(usize),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a path expression into its key sequence.
///
/// Empty text parses to an empty sequence ("the whole container"). Keys are
/// non-empty; a bracketed segment is a decimal index or a single/double-
/// quoted key. Anything else is a `PathError`.
pub fn parse(text: &str) -> Result<Vec<Key>, PathError> {
    let mut keys = Vec::new();
    let mut buf = String::new();
    let mut chars = text.chars().peekable();
    let mut after_bracket = false;

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if buf.is_empty() {
                    if !after_bracket {
                        return Err(PathError::EmptyKey);
                    }
                } else {
                    keys.push(classify(std::mem::take(&mut buf))?);
                }
                after_bracket = false;
            }
            '[' => {
                if !buf.is_empty() {
                    keys.push(classify(std::mem::take(&mut buf))?);
                }
                keys.push(bracket_key(&mut chars)?);
                after_bracket = true;
            }
            _ if after_bracket => {
                return Err(PathError::Malformed(format!(
                    "expected '.' or '[' after ']', found '{c}'"
                )));
            }
            _ => buf.push(c),
        }
    }

    if !buf.is_empty() {
        keys.push(classify(buf)?);
    } else if text.ends_with('.') {
        return Err(PathError::EmptyKey);
    }

    Ok(keys)
}

/// All-digit keys are indices; everything else is a field name.
fn classify(segment: String) -> Result<Key, PathError> {
    if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
        segment
            .parse::<usize>()
            .map(Key::Index)
            .map_err(|_| PathError::Malformed(format!("index '{segment}' is out of range")))
    } else {
        Ok(Key::Field(segment))
    }
}

/// Parse the contents of a bracket segment, consuming up to and including
/// the closing `]`.
fn bracket_key(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Key, PathError> {
    match chars.peek() {
        Some(&quote) if quote == '\'' || quote == '"' => {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some(c) if c == quote => break,
                    Some(c) => key.push(c),
                    None => {
                        return Err(PathError::Malformed(
                            "unterminated quoted key".to_string(),
                        ));
                    }
                }
            }
            if !matches!(chars.next(), Some(']')) {
                return Err(PathError::Malformed(
                    "expected ']' after quoted key".to_string(),
                ));
            }
            if key.is_empty() {
                return Err(PathError::EmptyKey);
            }
            classify(key)
        }
        _ => {
            let mut segment = String::new();
            loop {
                match chars.next() {
                    Some(']') => break,
                    Some(c) => segment.push(c),
                    None => {
                        return Err(PathError::Malformed("unterminated bracket".to_string()));
                    }
                }
            }
            if segment.is_empty() {
                return Err(PathError::Malformed("empty bracket segment".to_string()));
            }
            if !segment.chars().all(|c| c.is_ascii_digit()) {
                return Err(PathError::Malformed(format!(
                    "bracket segment '{segment}' is not an index or quoted key"
                )));
            }
            classify(segment)
        }
    }
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// Resolve a key sequence against a container.
///
/// An empty sequence resolves to the container itself. A miss anywhere is
/// `None`, never an error. Index keys look up array positions; against a map
/// they fall back to the decimal string key.
pub fn get_in<'a>(container: &'a Value, keys: &[Key]) -> Option<&'a Value> {
    let mut current = container;
    for key in keys {
        current = match (current, key) {
            (Value::Object(map), Key::Field(name)) => map.get(name)?,
            (Value::Object(map), Key::Index(index)) => map.get(&index.to_string())?,
            (Value::Array(seq), Key::Index(index)) => seq.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write a value at a key sequence, creating intermediate containers as
/// needed: an index key creates an array (padded with nulls up to the
/// index), a field key creates a map. A scalar in the middle of the path is
/// replaced by the container the path requires.
///
/// Requires at least one key.
pub fn set_in(container: &mut Value, keys: &[Key], value: Value) -> Result<(), PathError> {
    let Some((last, inner)) = keys.split_last() else {
        return Err(PathError::Empty);
    };

    let mut current = container;
    for key in inner {
        current = descend(current, key);
    }

    match last {
        Key::Field(name) => {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            if let Value::Object(map) = current {
                map.insert(name.clone(), value);
            }
        }
        Key::Index(index) => {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            if let Value::Array(seq) = current {
                while seq.len() <= *index {
                    seq.push(Value::Null);
                }
                seq[*index] = value;
            }
        }
    }
    Ok(())
}

/// Step one level down through `key`, coercing the current slot to the
/// container shape the key demands and creating the slot when absent.
fn descend<'a>(current: &'a mut Value, key: &Key) -> &'a mut Value {
    match key {
        Key::Field(name) => {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            match current {
                Value::Object(map) => map.entry(name.clone()).or_insert(Value::Null),
                other => other,
            }
        }
        Key::Index(index) => {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            match current {
                Value::Array(seq) => {
                    while seq.len() <= *index {
                        seq.push(Value::Null);
                    }
                    &mut seq[*index]
                }
                other => other,
            }
        }
    }
}

/// Remove the value at a key sequence. A no-op when any segment is absent;
/// removing an array element shifts the rest down.
///
/// Requires at least one key.
pub fn delete_in(container: &mut Value, keys: &[Key]) -> Result<(), PathError> {
    let Some((last, inner)) = keys.split_last() else {
        return Err(PathError::Empty);
    };

    let mut current = container;
    for key in inner {
        let child = match (current, key) {
            (Value::Object(map), Key::Field(name)) => map.get_mut(name),
            (Value::Object(map), Key::Index(index)) => map.get_mut(&index.to_string()),
            (Value::Array(seq), Key::Index(index)) => seq.get_mut(*index),
            _ => None,
        };
        match child {
            Some(value) => current = value,
            None => return Ok(()),
        }
    }

    match (current, last) {
        (Value::Object(map), Key::Field(name)) => {
            map.remove(name);
        }
        (Value::Object(map), Key::Index(index)) => {
            map.remove(&index.to_string());
        }
        (Value::Array(seq), Key::Index(index)) if *index < seq.len() => {
            seq.remove(*index);
        }
        _ => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parse_empty_text_is_empty_sequence() {
        assert_eq!(parse("").unwrap(), vec![]);
    }

    #[test]
    fn parse_dotted_fields() {
        assert_eq!(
            parse("a.b.c").unwrap(),
            vec![
                Key::Field("a".to_string()),
                Key::Field("b".to_string()),
                Key::Field("c".to_string()),
            ]
        );
    }

    #[test]
    fn parse_mixed_notation() {
        assert_eq!(
            parse("a.b[0]['c-d']").unwrap(),
            vec![
                Key::Field("a".to_string()),
                Key::Field("b".to_string()),
                Key::Index(0),
                Key::Field("c-d".to_string()),
            ]
        );
    }

    #[test]
    fn parse_double_quoted_key_may_contain_dots() {
        assert_eq!(
            parse(r#"a["x.y"]"#).unwrap(),
            vec![Key::Field("a".to_string()), Key::Field("x.y".to_string())]
        );
    }

    #[test]
    fn parse_all_digit_dotted_key_is_index() {
        assert_eq!(
            parse("a.0.b").unwrap(),
            vec![
                Key::Field("a".to_string()),
                Key::Index(0),
                Key::Field("b".to_string()),
            ]
        );
    }

    #[test]
    fn parse_quoted_all_digit_key_is_still_index() {
        assert_eq!(
            parse("a['0']").unwrap(),
            vec![Key::Field("a".to_string()), Key::Index(0)]
        );
    }

    #[test]
    fn parse_leading_bracket() {
        assert_eq!(parse("[2]").unwrap(), vec![Key::Index(2)]);
    }

    #[test]
    fn parse_chained_brackets() {
        assert_eq!(
            parse("m[0][1]").unwrap(),
            vec![Key::Field("m".to_string()), Key::Index(0), Key::Index(1)]
        );
    }

    #[test]
    fn parse_rejects_empty_keys() {
        assert!(matches!(parse("a..b"), Err(PathError::EmptyKey)));
        assert!(matches!(parse(".a"), Err(PathError::EmptyKey)));
        assert!(matches!(parse("a."), Err(PathError::EmptyKey)));
        assert!(matches!(parse("a['']"), Err(PathError::EmptyKey)));
    }

    #[test]
    fn parse_rejects_malformed_brackets() {
        assert!(matches!(parse("a[0"), Err(PathError::Malformed(_))));
        assert!(matches!(parse("a[]"), Err(PathError::Malformed(_))));
        assert!(matches!(parse("a[b]"), Err(PathError::Malformed(_))));
        assert!(matches!(parse("a['x"), Err(PathError::Malformed(_))));
        assert!(matches!(parse("a[0]x"), Err(PathError::Malformed(_))));
    }

    // -----------------------------------------------------------------------
    // get_in
    // -----------------------------------------------------------------------

    #[test]
    fn get_empty_path_is_whole_container() {
        let value = json!({"a": 1});
        assert_eq!(get_in(&value, &[]), Some(&value));
    }

    #[test]
    fn get_nested() {
        let value = json!({"users": [{"name": "Ada"}]});
        let keys = parse("users[0].name").unwrap();
        assert_eq!(get_in(&value, &keys), Some(&json!("Ada")));
    }

    #[test]
    fn get_missing_is_none() {
        let value = json!({"users": [{"name": "Ada"}]});
        let keys = parse("users[1].name").unwrap();
        assert_eq!(get_in(&value, &keys), None);
        let keys = parse("nope.deep").unwrap();
        assert_eq!(get_in(&value, &keys), None);
    }

    #[test]
    fn get_index_against_map_falls_back_to_string_key() {
        let value = json!({"0": "zero"});
        let keys = parse("[0]").unwrap();
        assert_eq!(get_in(&value, &keys), Some(&json!("zero")));
    }

    // -----------------------------------------------------------------------
    // set_in
    // -----------------------------------------------------------------------

    #[test]
    fn set_round_trip() {
        let mut value = json!({});
        let keys = parse("users[0].name").unwrap();
        set_in(&mut value, &keys, json!("Ada")).unwrap();
        assert_eq!(get_in(&value, &keys), Some(&json!("Ada")));
        assert_eq!(value, json!({"users": [{"name": "Ada"}]}));
    }

    #[test]
    fn set_numeric_key_creates_array_otherwise_map() {
        let mut value = json!({});
        set_in(&mut value, &parse("a[1]").unwrap(), json!("x")).unwrap();
        assert_eq!(value, json!({"a": [null, "x"]}));

        let mut value = json!({});
        set_in(&mut value, &parse("a.b").unwrap(), json!("x")).unwrap();
        assert_eq!(value, json!({"a": {"b": "x"}}));
    }

    #[test]
    fn set_replaces_scalar_intermediate() {
        let mut value = json!({"a": 7});
        set_in(&mut value, &parse("a.b").unwrap(), json!(1)).unwrap();
        assert_eq!(value, json!({"a": {"b": 1}}));
    }

    #[test]
    fn set_empty_path_is_error() {
        let mut value = json!({});
        assert!(matches!(
            set_in(&mut value, &[], json!(1)),
            Err(PathError::Empty)
        ));
    }

    #[test]
    fn set_overwrites_existing() {
        let mut value = json!({"a": {"b": 1}});
        set_in(&mut value, &parse("a.b").unwrap(), json!(2)).unwrap();
        assert_eq!(value, json!({"a": {"b": 2}}));
    }

    // -----------------------------------------------------------------------
    // delete_in
    // -----------------------------------------------------------------------

    #[test]
    fn delete_removes_target() {
        let mut value = json!({"a": {"b": 1, "c": 2}});
        delete_in(&mut value, &parse("a.b").unwrap()).unwrap();
        assert_eq!(value, json!({"a": {"c": 2}}));
    }

    #[test]
    fn delete_array_element_shifts() {
        let mut value = json!({"xs": [1, 2, 3]});
        delete_in(&mut value, &parse("xs[1]").unwrap()).unwrap();
        assert_eq!(value, json!({"xs": [1, 3]}));
    }

    #[test]
    fn delete_absent_is_noop() {
        let mut value = json!({"a": {"b": 1}});
        delete_in(&mut value, &parse("a.z.q").unwrap()).unwrap();
        delete_in(&mut value, &parse("xs[9]").unwrap()).unwrap();
        assert_eq!(value, json!({"a": {"b": 1}}));
    }

    #[test]
    fn delete_empty_path_is_error() {
        let mut value = json!({});
        assert!(matches!(delete_in(&mut value, &[]), Err(PathError::Empty)));
    }
}
