//! Record-relative xpaths over an [`XmlElement`] tree.
//!
//! Only the subset the augmentation layer needs: `/`-separated element
//! steps, an optional 1-based `[n]` position per step, and an optional
//! trailing `@attribute` step.

use std::sync::LazyLock;

use recmap_model::{ColumnMapping, Value, XmlElement};
use regex::Regex;

static POSITION_PREDICATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("Invalid position predicate regex"));

/// The xpath a declared column reads, relative to the record element.
pub fn column_xpath(column: &ColumnMapping) -> String {
    let cell = column.xml_cell.as_ref();
    let mut steps: Vec<&str> = Vec::new();
    if let Some(parent) = cell.and_then(|cell| cell.relative_path.as_deref()) {
        steps.extend(parent.split('/').filter(|step| !step.is_empty()));
    }
    if !column.name().is_empty() {
        steps.push(column.name());
    }
    let mut xpath = steps.join("/");
    if let Some(attribute) = cell.and_then(|cell| cell.attribute.as_deref()) {
        if !xpath.is_empty() {
            xpath.push('/');
        }
        xpath.push('@');
        xpath.push_str(attribute);
    }
    xpath
}

/// Every leaf element and every attribute below the record, in document
/// order.
///
/// Steps carry a `[n]` position only when the element has same-name
/// siblings, so a section that occurs once reads exactly like the declared
/// column path.
pub fn mappable_xpaths(record: &XmlElement) -> Vec<String> {
    let mut xpaths = Vec::new();
    collect_mappable(record, "", &mut xpaths);
    xpaths
}

fn collect_mappable(parent: &XmlElement, prefix: &str, out: &mut Vec<String>) {
    let children: Vec<&XmlElement> = parent.elements().collect();
    for (i, child) in children.iter().enumerate() {
        let same_name = children.iter().filter(|other| other.name == child.name).count();
        let step = if same_name > 1 {
            let position = children[..=i]
                .iter()
                .filter(|other| other.name == child.name)
                .count();
            format!("{}[{position}]", child.name)
        } else {
            child.name.clone()
        };
        let path = if prefix.is_empty() {
            step
        } else {
            format!("{prefix}/{step}")
        };
        for (key, _) in &child.attributes {
            out.push(format!("{path}/@{key}"));
        }
        if child.has_element_children() {
            collect_mappable(child, &path, out);
        } else {
            out.push(path);
        }
    }
}

/// Removes every `[n]` position predicate.
pub fn strip_predicates(xpath: &str) -> String {
    POSITION_PREDICATE.replace_all(xpath, "").into_owned()
}

/// The position numbers of an xpath, outermost first.
pub fn predicate_tokens(xpath: &str) -> Vec<String> {
    POSITION_PREDICATE
        .captures_iter(xpath)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Splits a trailing `@attribute` step from the element path.
pub fn split_attribute(xpath: &str) -> (&str, Option<&str>) {
    let (element, last) = xpath.rsplit_once('/').unwrap_or(("", xpath));
    match last.strip_prefix('@') {
        Some(attribute) => (element, Some(attribute)),
        None => (xpath, None),
    }
}

/// Elements reached by an element path (no attribute step).
pub fn select<'a>(record: &'a XmlElement, element_path: &str) -> Vec<&'a XmlElement> {
    let mut nodes = vec![record];
    for step in element_path.split('/').filter(|step| !step.is_empty()) {
        let (name, position) = parse_step(step);
        nodes = nodes
            .into_iter()
            .flat_map(|node| {
                let matching = node.elements().filter(move |child| child.name == name);
                match position {
                    Some(position) => matching.skip(position.saturating_sub(1)).take(1).collect(),
                    None => matching.collect::<Vec<_>>(),
                }
            })
            .collect();
    }
    nodes
}

fn parse_step(step: &str) -> (&str, Option<usize>) {
    step.strip_suffix(']')
        .and_then(|rest| rest.split_once('['))
        .and_then(|(name, position)| Some((name, Some(position.parse().ok()?))))
        .unwrap_or((step, None))
}

/// The cell value an xpath reads from a record.
///
/// No match reads as null. More than one match reads as an empty string
/// rather than picking one of them.
pub fn resolve_cell(record: &XmlElement, xpath: &str) -> Value {
    let (element_path, attribute) = split_attribute(xpath);
    let nodes = select(record, element_path);
    let mut values: Vec<String> = match attribute {
        Some(attribute) => nodes
            .iter()
            .filter_map(|node| node.attribute(attribute))
            .map(str::to_string)
            .collect(),
        None => nodes.iter().map(|node| node.inner_text()).collect(),
    };
    match values.len() {
        0 => Value::Null,
        1 => Value::Text(values.remove(0)),
        _ => Value::Text(String::new()),
    }
}

/// How many instances exist of the repeating container an xpath sits in.
///
/// The container is the path up to and including the first positioned
/// step; a path with no positions is its own container.
pub fn container_count(record: &XmlElement, xpath: &str) -> usize {
    let (element_path, _) = split_attribute(xpath);
    let mut container = Vec::new();
    for step in element_path.split('/').filter(|step| !step.is_empty()) {
        let (name, position) = parse_step(step);
        container.push(name);
        if position.is_some() {
            break;
        }
    }
    select(record, &container.join("/")).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> XmlElement {
        XmlElement::parse_str(
            r#"<Record>
                 <Name>Ann</Name>
                 <Treatment id="t1"><Code>A</Code><Date>2020-01-01</Date></Treatment>
                 <Treatment id="t2"><Code>B</Code></Treatment>
               </Record>"#,
        )
        .unwrap()
    }

    #[test]
    fn mappable_paths_number_repeated_siblings_only() {
        assert_eq!(
            mappable_xpaths(&record()),
            vec![
                "Name",
                "Treatment[1]/@id",
                "Treatment[1]/Code",
                "Treatment[1]/Date",
                "Treatment[2]/@id",
                "Treatment[2]/Code",
            ]
        );
    }

    #[test]
    fn predicates_strip_and_tokenize() {
        assert_eq!(strip_predicates("A[2]/B[10]/@x"), "A/B/@x");
        assert_eq!(predicate_tokens("A[2]/B[10]/@x"), vec!["2", "10"]);
        assert!(predicate_tokens("A/B").is_empty());
    }

    #[test]
    fn cells_resolve_text_and_attributes() {
        let record = record();
        assert_eq!(resolve_cell(&record, "Name"), Value::from("Ann"));
        assert_eq!(resolve_cell(&record, "Treatment[2]/Code"), Value::from("B"));
        assert_eq!(resolve_cell(&record, "Treatment[1]/@id"), Value::from("t1"));
        assert_eq!(resolve_cell(&record, "Missing"), Value::Null);
    }

    #[test]
    fn ambiguous_paths_read_as_empty() {
        assert_eq!(resolve_cell(&record(), "Treatment/Code"), Value::from(""));
    }

    #[test]
    fn container_counts_cover_the_repeating_step() {
        let record = record();
        assert_eq!(container_count(&record, "Treatment[2]/Code"), 2);
        assert_eq!(container_count(&record, "Name"), 1);
    }

    #[test]
    fn attribute_steps_split_off() {
        assert_eq!(split_attribute("A/B/@x"), ("A/B", Some("x")));
        assert_eq!(split_attribute("A/B"), ("A/B", None));
        assert_eq!(split_attribute("@x"), ("", Some("x")));
    }
}
