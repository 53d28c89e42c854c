//! Textual tool-call protocol parsing. Deliberately not regex-based: nested
//! braces inside string argument values would break a naive pattern, so
//! every scanner here tracks brace depth while honouring string literals
//! (an unescaped `"` toggles in/out of a string; `\"` does not).

/// Find the first top-level `{...}` JSON object in `text` and return its
/// span. Depth counting starts at the first `{` seen outside a string.
pub fn find_first_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = None;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        let idx = start + offset;
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(idx + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    end.map(|e| &text[start..e])
}

/// Extract every `TOOL_CALL: { ... }` block. Each returned string is the
/// balanced JSON object following one marker.
pub fn find_tool_call_blocks(text: &str) -> Vec<&str> {
    const MARKER: &str = "TOOL_CALL:";
    let mut blocks = Vec::new();
    let mut search_from = 0;

    while let Some(rel) = text[search_from..].find(MARKER) {
        let marker_end = search_from + rel + MARKER.len();
        match find_first_json_object(&text[marker_end..]) {
            Some(obj) => {
                blocks.push(obj);
                search_from = marker_end + obj.len();
            }
            None => break,
        }
    }

    blocks
}
