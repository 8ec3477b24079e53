//! Maps JSON pointers back to positions in the original document text.
//!
//! `serde_json::Value` keeps no positions, so the text is scanned along the
//! pointer's tokens instead. The scanner assumes well-formed JSON (the
//! document has already been parsed) and gives up with `None` otherwise.

/// Byte span of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

/// One member of an object: key and the span of its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Member {
    pub key: String,
    pub value: Span,
}

/// Splits an RFC 6901 pointer into unescaped tokens.
pub(crate) fn pointer_tokens(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer
        .trim_start_matches('/')
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Span of the value addressed by `tokens`.
pub(crate) fn find(text: &str, tokens: &[String]) -> Option<Span> {
    let bytes = text.as_bytes();
    let mut pos = skip_ws(bytes, 0);
    for token in tokens {
        match bytes.get(pos)? {
            b'{' => {
                let member = members(text, pos)?.into_iter().find(|m| &m.key == token)?;
                pos = member.value.start;
            }
            b'[' => {
                let index: usize = token.parse().ok()?;
                pos = elements(bytes, pos)?.get(index)?.start;
            }
            _ => return None,
        }
    }
    let end = skip_value(bytes, pos)?;
    Some(Span { start: pos, end })
}

/// Members of the object starting at `start`, in document order.
pub(crate) fn members(text: &str, start: usize) -> Option<Vec<Member>> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }
    let mut out = Vec::new();
    let mut pos = skip_ws(bytes, start + 1);
    if bytes.get(pos) == Some(&b'}') {
        return Some(out);
    }
    loop {
        let key_end = skip_string(bytes, pos)?;
        let key: String = serde_json::from_str(text.get(pos..key_end)?).ok()?;
        pos = skip_ws(bytes, key_end);
        if bytes.get(pos) != Some(&b':') {
            return None;
        }
        let value_start = skip_ws(bytes, pos + 1);
        let value_end = skip_value(bytes, value_start)?;
        out.push(Member {
            key,
            value: Span {
                start: value_start,
                end: value_end,
            },
        });
        pos = skip_ws(bytes, value_end);
        match bytes.get(pos)? {
            b',' => pos = skip_ws(bytes, pos + 1),
            b'}' => return Some(out),
            _ => return None,
        }
    }
}

fn elements(bytes: &[u8], start: usize) -> Option<Vec<Span>> {
    let mut out = Vec::new();
    let mut pos = skip_ws(bytes, start + 1);
    if bytes.get(pos) == Some(&b']') {
        return Some(out);
    }
    loop {
        let end = skip_value(bytes, pos)?;
        out.push(Span { start: pos, end });
        pos = skip_ws(bytes, end);
        match bytes.get(pos)? {
            b',' => pos = skip_ws(bytes, pos + 1),
            b']' => return Some(out),
            _ => return None,
        }
    }
}

fn skip_ws(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
        pos += 1;
    }
    pos
}

fn skip_string(bytes: &[u8], start: usize) -> Option<usize> {
    if bytes.get(start) != Some(&b'"') {
        return None;
    }
    let mut pos = start + 1;
    loop {
        match bytes.get(pos)? {
            b'\\' => pos += 2,
            b'"' => return Some(pos + 1),
            _ => pos += 1,
        }
    }
}

/// End (exclusive) of the value starting at `start`.
fn skip_value(bytes: &[u8], start: usize) -> Option<usize> {
    match bytes.get(start)? {
        b'"' => skip_string(bytes, start),
        open @ (b'{' | b'[') => {
            let close = if *open == b'{' { b'}' } else { b']' };
            let mut depth = 0usize;
            let mut pos = start;
            loop {
                match bytes.get(pos)? {
                    b'"' => {
                        pos = skip_string(bytes, pos)?;
                        continue;
                    }
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth -= 1;
                        if depth == 0 {
                            return (bytes[pos] == close).then_some(pos + 1);
                        }
                    }
                    _ => {}
                }
                pos += 1;
            }
        }
        _ => {
            let mut pos = start;
            while bytes
                .get(pos)
                .is_some_and(|b| !matches!(b, b',' | b'}' | b']') && !b.is_ascii_whitespace())
            {
                pos += 1;
            }
            (pos > start).then_some(pos)
        }
    }
}

/// 1-based line and column of a byte offset.
pub(crate) fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count() + 1;
    let column = before
        .rsplit('\n')
        .next()
        .map_or(0, |tail| tail.chars().count())
        + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "{\n  \"a\": [1, {\"b\": \"x}\"}],\n  \"c~/d\": null\n}";

    #[test]
    fn finds_nested_values() {
        let span = find(DOC, &pointer_tokens("/a/1/b")).expect("span");
        assert_eq!(&DOC[span.start..span.end], "\"x}\"");
        let escaped = find(DOC, &pointer_tokens("/c~0~1d")).expect("span");
        assert_eq!(&DOC[escaped.start..escaped.end], "null");
        let root = find(DOC, &[]).expect("root");
        assert_eq!((root.start, root.end), (0, DOC.len()));
        assert!(find(DOC, &pointer_tokens("/missing")).is_none());
    }

    #[test]
    fn lists_members_in_order() {
        let keys: Vec<String> = members(DOC, 0)
            .expect("members")
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(keys, vec!["a", "c~/d"]);
    }

    #[test]
    fn line_and_column_are_one_based() {
        assert_eq!(line_column(DOC, 0), (1, 1));
        let offset = DOC.find("\"c").expect("offset");
        assert_eq!(line_column(DOC, offset), (3, 3));
    }
}
