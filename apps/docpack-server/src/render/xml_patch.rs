//! Word XML normalization before template rendering
//!
//! Word freely splits typed text into several runs (`<w:r>`), so a tag typed
//! as `{{ ФИО }}` may reach us as `{{</w:t></w:r><w:r><w:t> ФИО }}`. These
//! passes put every template tag back together so the template engine sees
//! plain `{{ … }}` / `{% … %}` / `{# … #}` syntax.

/// Block-level statements that replace their whole enclosing element,
/// e.g. `{%p if x %}` replaces the paragraph it is typed in. Order matters:
/// rows before cells before paragraphs before runs.
const BLOCK_ELEMENTS: [&str; 4] = ["tr", "tc", "p", "r"];

/// Run all normalization passes
pub fn prepare_template_xml(xml: &str) -> String {
    let joined = join_split_delimiters(xml);
    let mut patched = strip_markup_inside_tags(&joined);
    for element in BLOCK_ELEMENTS {
        patched = collapse_block_tag(&patched, element);
    }
    patched
}

/// Remove markup between the two characters of a tag delimiter:
/// `{<…>{`, `{<…>%`, `{<…>#` and `%<…>}`, `}<…>}`, `#<…>}`.
fn join_split_delimiters(xml: &str) -> String {
    let bytes = xml.as_bytes();
    let mut out = String::with_capacity(xml.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        let followers: &[u8] = match bytes[i] {
            b'{' => b"{%#",
            b'%' | b'}' | b'#' => b"}",
            _ => {
                i += 1;
                continue;
            }
        };

        let mut j = i + 1;
        let mut skipped_markup = false;
        while j < bytes.len() && bytes[j] == b'<' {
            match xml[j..].find('>') {
                Some(end) => {
                    j += end + 1;
                    skipped_markup = true;
                }
                None => break,
            }
        }

        if skipped_markup && j < bytes.len() && followers.contains(&bytes[j]) {
            out.push_str(&xml[copied..=i]);
            copied = j;
            i = j;
        } else {
            i += 1;
        }
    }

    out.push_str(&xml[copied..]);
    out
}

/// Find the next tag opener and its closer
fn find_opener(s: &str) -> Option<(usize, &'static str)> {
    let bytes = s.as_bytes();
    let mut from = 0;
    while let Some(pos) = s[from..].find('{') {
        let at = from + pos;
        match bytes.get(at + 1) {
            Some(b'{') => return Some((at, "}}")),
            Some(b'%') => return Some((at, "%}")),
            Some(b'#') => return Some((at, "#}")),
            _ => from = at + 1,
        }
    }
    None
}

/// Inside every tag, drop run boundaries and restore characters that Word
/// stored as entities or typographic quotes.
fn strip_markup_inside_tags(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;

    while let Some((start, closer)) = find_opener(rest) {
        let body_start = start + 2;
        let body_end = rest[body_start..]
            .find(closer)
            .map(|i| body_start + i)
            .unwrap_or(rest.len());

        out.push_str(&rest[..body_start]);
        out.push_str(&clean_expression(&remove_run_breaks(&rest[body_start..body_end])));
        rest = &rest[body_end..];
    }

    out.push_str(rest);
    out
}

/// Remove every `</w:t> … <w:t>` span (the gap between two text nodes)
fn remove_run_breaks(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(close) = rest.find("</w:t>") {
        let after_close = close + "</w:t>".len();
        let Some(reopen_end) = find_text_open_end(&rest[after_close..]) else {
            break;
        };
        out.push_str(&rest[..close]);
        rest = &rest[after_close + reopen_end..];
    }

    out.push_str(rest);
    out
}

/// End offset (exclusive) of the next `<w:t>` or `<w:t …>` start tag
fn find_text_open_end(s: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(pos) = s[from..].find("<w:t") {
        let at = from + pos;
        let next = s.as_bytes().get(at + 4).copied();
        if matches!(next, Some(b'>') | Some(b' ')) {
            let end = s[at..].find('>')?;
            return Some(at + end + 1);
        }
        from = at + 4;
    }
    None
}

fn clean_expression(body: &str) -> String {
    body.replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#8216;", "'")
        .replace("&#8217;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201c}', '\u{201d}'], "\"")
}

/// Replace each element `<w:{element}>` that contains `{%{element} … %}` (or
/// `{{{element} … }}`) with the bare statement.
fn collapse_block_tag(xml: &str, element: &str) -> String {
    let markers = [
        (format!("{{%{} ", element), "{%", "%}"),
        (format!("{{{{{} ", element), "{{", "}}"),
    ];
    let element_open = format!("<w:{}", element);
    let element_close = format!("</w:{}>", element);

    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;

    loop {
        let next = markers
            .iter()
            .filter_map(|(marker, open, close)| rest.find(marker.as_str()).map(|at| (at, marker, *open, *close)))
            .min_by_key(|(at, ..)| *at);
        let Some((at, marker, open, close)) = next else {
            break;
        };

        let body_start = at + marker.len();
        let Some(body_len) = rest[body_start..].find(close) else {
            break;
        };
        let body = &rest[body_start..body_start + body_len];
        let statement_end = body_start + body_len + close.len();

        let start = if body.contains(['}', '%']) {
            None
        } else {
            rfind_element_start(&rest[..at], &element_open)
        };
        let end = rest[statement_end..]
            .find(&element_close)
            .map(|i| statement_end + i + element_close.len());

        match (start, end) {
            (Some(start), Some(end)) => {
                out.push_str(&rest[..start]);
                out.push_str(open);
                out.push(' ');
                out.push_str(body);
                out.push_str(close);
                rest = &rest[end..];
            }
            _ => {
                out.push_str(&rest[..statement_end]);
                rest = &rest[statement_end..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Last `<w:x ` / `<w:x>` start tag in `haystack`, skipping longer names
/// such as `<w:pPr>` when looking for `<w:p`
fn rfind_element_start(haystack: &str, element_open: &str) -> Option<usize> {
    haystack
        .rmatch_indices(element_open)
        .map(|(i, _)| i)
        .find(|&i| {
            matches!(
                haystack.as_bytes().get(i + element_open.len()),
                Some(b' ') | Some(b'>')
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejoins_tag_split_across_runs() {
        let xml = r#"<w:p><w:r><w:t>Студент: {</w:t></w:r><w:r><w:t>{ ФИ</w:t></w:r><w:proofErr w:type="spellStart"/><w:r><w:t xml:space="preserve">О }</w:t></w:r><w:r><w:t>}</w:t></w:r></w:p>"#;
        let patched = prepare_template_xml(xml);
        assert_eq!(
            patched,
            r#"<w:p><w:r><w:t>Студент: {{ ФИО }}</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn test_restores_quotes_and_entities_inside_tags() {
        let xml = "<w:t>{{ x|default(\u{201c}a &amp; b\u{201d}) }} &amp; {% if y == &quot;1&quot; %}</w:t>";
        let patched = prepare_template_xml(xml);
        assert_eq!(
            patched,
            "<w:t>{{ x|default(\"a & b\") }} &amp; {% if y == \"1\" %}</w:t>"
        );
    }

    #[test]
    fn test_paragraph_statement_replaces_paragraph() {
        let xml = concat!(
            "<w:body>",
            "<w:p><w:pPr><w:jc w:val=\"center\"/></w:pPr><w:r><w:t>{%p if Курс %}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>Курс {{ Курс }}</w:t></w:r></w:p>",
            "<w:p w:rsidR=\"00AB\"><w:r><w:t>{%p endif %}</w:t></w:r></w:p>",
            "</w:body>"
        );
        let patched = prepare_template_xml(xml);
        assert_eq!(
            patched,
            concat!(
                "<w:body>",
                "{% if Курс %}",
                "<w:p><w:r><w:t>Курс {{ Курс }}</w:t></w:r></w:p>",
                "{% endif %}",
                "</w:body>"
            )
        );
    }

    #[test]
    fn test_table_row_statement() {
        let xml = "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>{%tr for x in items %}</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:p><w:r><w:t>{{ x }}</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:p><w:r><w:t>{%tr endfor %}</w:t></w:r></w:p></w:tc></w:tr></w:tbl>";
        let patched = prepare_template_xml(xml);
        assert_eq!(
            patched,
            "<w:tbl>{% for x in items %}<w:tr><w:tc><w:p><w:r><w:t>{{ x }}</w:t></w:r></w:p></w:tc></w:tr>{% endfor %}</w:tbl>"
        );
    }

    #[test]
    fn test_plain_text_is_untouched() {
        let xml = "<w:p><w:r><w:t>no tags {here} 100%</w:t></w:r><w:r><w:t>.</w:t></w:r></w:p>";
        assert_eq!(prepare_template_xml(xml), xml);
    }
}
