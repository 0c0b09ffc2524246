// Minimal HTML slicing for the draw archive table.
// Tag names are matched ASCII case-insensitively. Lowercasing only touches
// ASCII, so byte offsets in the lowered copy line up with the input.

fn to_lower_ascii(s: &str) -> String {
    s.chars()
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Inner HTML of the first `<tag ...>...</tag>` block.
pub fn first_element<'a>(html: &'a str, tag: &str) -> Option<&'a str> {
    let (start, end) = next_element(html, tag, 0)?;
    inner(&html[start..end])
}

/// Byte range of the next complete `<tag ...>...</tag>` block at or after
/// `from`. Nested blocks of the same tag are not supported.
pub fn next_element(html: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let lc = to_lower_ascii(html);
    let open = format!("<{}", to_lower_ascii(tag));
    let close = format!("</{}>", to_lower_ascii(tag));

    let mut search = from;
    let start = loop {
        let idx = lc.get(search..)?.find(&open)? + search;
        // "<tr" must not match "<track"
        match lc[idx + open.len()..].chars().next() {
            Some(c) if c == '>' || c.is_ascii_whitespace() || c == '/' => break idx,
            _ => search = idx + open.len(),
        }
    };
    let open_end = html[start..].find('>')? + start + 1;
    let end = lc[open_end..].find(&close)? + open_end + close.len();
    Some((start, end))
}

/// All `<tag>` blocks inside `html`, in document order.
pub fn elements<'a>(html: &'a str, tag: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some((start, end)) = next_element(html, tag, pos) {
        out.push(&html[start..end]);
        pos = end;
    }
    out
}

/// Text between the end of the opening tag and the start of the closing tag.
pub fn inner(block: &str) -> Option<&str> {
    let open_end = block.find('>')? + 1;
    let close_start = block.rfind("</")?;
    (close_start >= open_end).then(|| &block[open_end..close_start])
}

/// Drops tags, decodes the few entities the archive uses and collapses
/// whitespace. Tags become spaces so adjacent `<span>` values stay apart.
pub fn text(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    let decoded = out.replace("&nbsp;", " ").replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
