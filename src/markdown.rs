//! Markdown to DOM rendering with pulldown-cmark.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};

use crate::dom::{Fragment, NodeId};

/// Render markdown into a fresh fragment rooted at a `div`.
///
/// Soft breaks become a single space and hard breaks a `<br>`, so the
/// fragment's text content is the document's plain text. Raw HTML is kept as
/// text rather than parsed.
pub fn render(text: &str) -> Fragment {
    let mut fragment = Fragment::new("div");
    let mut stack: Vec<NodeId> = vec![fragment.root()];
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS;

    for event in Parser::new_ext(text, options) {
        let parent = stack.last().copied().unwrap_or(fragment.root());
        match event {
            Event::Start(tag) => {
                let element = open_element(&mut fragment, &tag);
                fragment.append_child(parent, element);
                stack.push(element);
            },
            Event::End(_) => {
                if stack.len() > 1 {
                    stack.pop();
                }
            },
            Event::Code(code) => {
                let element = fragment.create_element("code");
                let node = fragment.create_text(&code);
                fragment.append_child(element, node);
                fragment.append_child(parent, element);
            },
            Event::HardBreak => {
                let element = fragment.create_element("br");
                fragment.append_child(parent, element);
            },
            Event::Rule => {
                let element = fragment.create_element("hr");
                fragment.append_child(parent, element);
            },
            Event::SoftBreak => append_text(&mut fragment, parent, " "),
            Event::TaskListMarker(checked) => {
                let element = fragment.create_element("input");
                fragment.set_attr(element, "type", "checkbox");
                fragment.set_attr(element, "disabled", "");
                if checked {
                    fragment.set_attr(element, "checked", "");
                }
                fragment.append_child(parent, element);
            },
            Event::Text(t) | Event::Html(t) | Event::InlineHtml(t) => append_text(&mut fragment, parent, &t),
            Event::FootnoteReference(name) => {
                let element = fragment.create_element("sup");
                let node = fragment.create_text(&name);
                fragment.append_child(element, node);
                fragment.append_child(parent, element);
            },
            _ => {},
        }
    }
    return fragment;
}

/// Append text to `parent`, extending its last child when that is already text.
fn append_text(fragment: &mut Fragment, parent: NodeId, text: &str) {
    let node = fragment.create_text(text);
    fragment.append_child(parent, node);
    fragment.merge_adjacent_text(parent);
}

/// Heading tag name for a level.
const fn heading_tag(level: HeadingLevel) -> &'static str {
    return match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    };
}

/// Create the element for a start tag.
fn open_element(fragment: &mut Fragment, tag: &Tag<'_>) -> NodeId {
    return match tag {
        Tag::BlockQuote(_) => fragment.create_element("blockquote"),
        Tag::CodeBlock(kind) => {
            let pre = fragment.create_element("pre");
            if let CodeBlockKind::Fenced(lang) = kind
                && !lang.is_empty()
            {
                fragment.set_attr(pre, "data-lang", lang);
            }
            pre
        },
        Tag::Emphasis => fragment.create_element("em"),
        Tag::Heading { level, .. } => fragment.create_element(heading_tag(*level)),
        Tag::Image { dest_url, title, .. } => {
            let span = fragment.create_element("span");
            fragment.set_attr(span, "class", "image-alt");
            fragment.set_attr(span, "data-src", dest_url);
            if !title.is_empty() {
                fragment.set_attr(span, "title", title);
            }
            span
        },
        Tag::Item => fragment.create_element("li"),
        Tag::Link { dest_url, title, .. } => {
            let a = fragment.create_element("a");
            fragment.set_attr(a, "href", dest_url);
            if !title.is_empty() {
                fragment.set_attr(a, "title", title);
            }
            a
        },
        Tag::List(Some(first)) => {
            let ol = fragment.create_element("ol");
            if *first != 1 {
                fragment.set_attr(ol, "start", &first.to_string());
            }
            ol
        },
        Tag::List(None) => fragment.create_element("ul"),
        Tag::Paragraph => fragment.create_element("p"),
        Tag::Strikethrough => fragment.create_element("del"),
        Tag::Strong => fragment.create_element("strong"),
        Tag::Table(_) => fragment.create_element("table"),
        Tag::TableCell => fragment.create_element("td"),
        Tag::TableHead | Tag::TableRow => fragment.create_element("tr"),
        _ => fragment.create_element("div"),
    };
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use super::*;
    use crate::dom::keep_all;

    #[test]
    fn renders_inline_markup() {
        let f = render("The *quick* fox");
        assert_eq!(f.to_html(), "<p>The <em>quick</em> fox</p>");
    }

    #[test]
    fn soft_breaks_join_lines_with_space() {
        let f = render("one\ntwo");
        assert_eq!(f.text_content_filtered(f.root(), &keep_all), "one two");
    }

    #[test]
    fn text_content_drops_markdown_syntax() {
        let f = render("# Title\n\nSome **bold** and `code` with [a link](https://x.test).");
        assert_eq!(f.text_content_filtered(f.root(), &keep_all), "TitleSome bold and code with a link.");
        assert!(f.to_html().contains("<a href=\"https://x.test\">a link</a>"));
    }

    #[test]
    fn escapes_raw_html_as_text() {
        let f = render("a <b>tag</b>");
        assert_eq!(f.to_html(), "<p>a &lt;b&gt;tag&lt;/b&gt;</p>");
    }

    #[test]
    fn lists_and_code_blocks() {
        let f = render("- one\n- two\n\n```rust\nlet x = 1;\n```\n");
        let html = f.to_html();
        assert!(html.contains("<ul><li>one</li><li>two</li></ul>"));
        assert!(html.contains("<pre data-lang=\"rust\">let x = 1;\n</pre>"));
    }
}
