//! XML utility functions for navigating eCFR full-text documents.
//!
//! eCFR structures a title as nested `DIV1`..`DIV9` elements whose `TYPE`
//! attribute names the hierarchy level and whose `N` attribute carries the
//! level's number.

use roxmltree::Node;
use unicode_normalization::UnicodeNormalization;

/// Get the tag name without namespace prefix.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use ecfr_harvester::xml::get_tag_name;
///
/// let xml = r#"<DIV1><HEAD>Title 1</HEAD></DIV1>"#;
/// let doc = Document::parse(xml).unwrap();
/// let head = doc.root_element().first_element_child().unwrap();
/// assert_eq!(get_tag_name(head), "HEAD");
/// ```
pub fn get_tag_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Find the first child element with the given tag name.
pub fn find_child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && get_tag_name(*child) == tag)
}

/// Find all child elements with the given tag name.
pub fn find_children<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && get_tag_name(*child) == tag)
}

/// The `TYPE` attribute of a hierarchy `DIV`, if the node is one.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use ecfr_harvester::xml::div_type;
///
/// let doc = Document::parse(r#"<DIV5 N="1" TYPE="PART"/>"#).unwrap();
/// assert_eq!(div_type(doc.root_element()), Some("PART"));
/// ```
pub fn div_type<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    if node.is_element() && get_tag_name(node).starts_with("DIV") {
        node.attribute("TYPE")
    } else {
        None
    }
}

/// Collect all text below a node, collapse whitespace and apply NFC.
pub fn collect_text(node: Node<'_, '_>) -> String {
    let raw: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    normalize_text(&raw)
}

/// Collapse runs of whitespace to single spaces and apply NFC.
///
/// # Examples
/// ```
/// use ecfr_harvester::xml::normalize_text;
///
/// assert_eq!(normalize_text("  a\n\t b  "), "a b");
/// ```
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .nfc()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn test_find_child() {
        let xml = r#"<DIV8><HEAD>h</HEAD><P>a</P><P>b</P></DIV8>"#;
        let doc = Document::parse(xml).unwrap();
        let root = doc.root_element();

        assert!(find_child(root, "HEAD").is_some());
        assert!(find_child(root, "CITA").is_none());
    }

    #[test]
    fn test_find_children() {
        let xml = r#"<DIV8><P>1</P><HEAD/><P>2</P></DIV8>"#;
        let doc = Document::parse(xml).unwrap();
        let items: Vec<_> = find_children(doc.root_element(), "P").collect();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_div_type_ignores_non_div() {
        let xml = r#"<HEAD TYPE="SECTION"/>"#;
        let doc = Document::parse(xml).unwrap();
        assert_eq!(div_type(doc.root_element()), None);
    }

    #[test]
    fn test_collect_text_includes_inline_markup() {
        let xml = r#"<P>(a) <I>Agency</I> means   any
            authority.</P>"#;
        let doc = Document::parse(xml).unwrap();
        assert_eq!(collect_text(doc.root_element()), "(a) Agency means any authority.");
    }

    #[test]
    fn test_normalize_text_composes() {
        // "e" followed by a combining acute accent
        assert_eq!(normalize_text("caf\u{0065}\u{0301}"), "caf\u{00e9}");
    }
}
