// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! EAD3 grammar adapter.
//!
//! Builds the logical structMap from an EAD3 finding aid instead of the
//! directory tree. The description is parsed once into a typed tree
//! ([`FindingAid`] / [`Component`] / [`Link`]); every tag goes through
//! [`classify`], and anything it does not recognise is ignored.
//!
//! Per component the emitted children are: nested components, then one
//! `daoset` division per link group, then the component's direct links.
//! Links whose target is not a known content path are skipped; the rest of
//! the group is still linked.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use sip_refs::{normalize_path, ROOT_DIRECTORY};
use tracing::{trace, warn};

use crate::filesec::FileSecBuilder;
use crate::model::{Div, DivChild, FilePointer, StructMap};
use crate::properties::FileProperties;
use crate::synth::{decorated_div, SynthContext};
use crate::CompileError;

/// structMap `TYPE` of the EAD3 grammar.
pub const EAD_STRUCTMAP_TYPE: &str = "EAD3-logical";
/// div `TYPE` wrapping one linked object.
pub const DAO_DIV_TYPE: &str = "dao";
/// div `TYPE` of a link group.
pub const DAOSET_DIV_TYPE: &str = "daoset";

/// Errors raised while reading an EAD3 description.
#[derive(Debug, thiserror::Error)]
pub enum EadError {
    /// The description is not well-formed XML.
    #[error("[EAD_XML] {0}")]
    Xml(String),
    /// A required element is missing.
    #[error("[EAD_MISSING_ROOT] no `{0}` element")]
    MissingRoot(&'static str),
}

/// Recognised EAD3 element kinds.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EadTag {
    /// `ead` document element.
    Ead,
    /// `archdesc`.
    ArchDesc,
    /// `dsc`, the container of top-level components.
    Dsc,
    /// `c` or `c01` … `c12`.
    Component,
    /// `did`, descriptive identification.
    Did,
    /// `dao`, a digital object link.
    Dao,
    /// `daoset`, a link group.
    DaoSet,
    /// `unittitle`.
    UnitTitle,
    /// Anything else.
    Other,
}

/// Classify an element by its local name (namespace prefixes ignored).
pub fn classify(local: &str) -> EadTag {
    match local {
        "ead" => EadTag::Ead,
        "archdesc" => EadTag::ArchDesc,
        "dsc" => EadTag::Dsc,
        "did" => EadTag::Did,
        "dao" => EadTag::Dao,
        "daoset" => EadTag::DaoSet,
        "unittitle" => EadTag::UnitTitle,
        "c" => EadTag::Component,
        _ if is_numbered_component(local) => EadTag::Component,
        _ => EadTag::Other,
    }
}

fn is_numbered_component(local: &str) -> bool {
    matches!(
        local.strip_prefix('c'),
        Some(n) if n.len() == 2 && n.parse::<u8>().is_ok_and(|n| (1..=12).contains(&n))
    )
}

/// A parsed finding aid.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FindingAid {
    /// The `archdesc`, with `dsc` components as its children.
    pub archdesc: Component,
}

/// `archdesc` or a component.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Component {
    /// div `TYPE`: `label`, else `otherlevel`, else `level`, else the tag name.
    pub div_type: String,
    /// div `LABEL`: the `did/unittitle` text.
    pub title: Option<String>,
    /// Nested components in document order.
    pub components: Vec<Component>,
    /// Links under `did`, in document order.
    pub links: Vec<Link>,
}

/// Content link found under a `did`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Link {
    /// Direct `did/dao`.
    Dao(DigitalObject),
    /// `did/daoset` group.
    DaoSet(DaoSet),
}

/// A `dao` pointing at a workspace path.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DigitalObject {
    /// Normalized target path.
    pub href: String,
    /// `linktitle` (or `label`).
    pub label: Option<String>,
}

/// A `daoset`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DaoSet {
    /// `label` attribute.
    pub label: Option<String>,
    /// Member links in document order.
    pub objects: Vec<DigitalObject>,
}

// ── parsing ─────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Node {
    Text(String),
    Element(Element),
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    content: Vec<Node>,
}

impl Element {
    fn tag(&self) -> EadTag {
        classify(&self.name)
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn children(&self) -> impl Iterator<Item = &Self> {
        self.content.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    fn first(&self, tag: EadTag) -> Option<&Self> {
        self.children().find(|child| child.tag() == tag)
    }

    /// Descendant text in document order, whitespace runs collapsed.
    fn text_content(&self) -> String {
        let mut raw = String::new();
        self.collect_text(&mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.content {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Element(child) => child.collect_text(out),
            }
        }
    }
}

fn xml_error(err: impl std::fmt::Display) -> EadError {
    EadError::Xml(err.to_string())
}

fn utf8(bytes: &[u8]) -> Result<String, EadError> {
    std::str::from_utf8(bytes).map(str::to_owned).map_err(xml_error)
}

fn open(start: &BytesStart<'_>) -> Result<Element, EadError> {
    let name = utf8(start.local_name().as_ref())?;
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = utf8(attr.key.local_name().as_ref())?;
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        attrs.push((key, value));
    }
    Ok(Element {
        name,
        attrs,
        ..Element::default()
    })
}

fn close(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), EadError> {
    if let Some(parent) = stack.last_mut() {
        parent.content.push(Node::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(EadError::Xml("more than one document element".into()));
    }
    *root = Some(element);
    Ok(())
}

fn parse_xml(source: &str) -> Result<Element, EadError> {
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => stack.push(open(&start)?),
            Event::Empty(start) => {
                let element = open(&start)?;
                close(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| EadError::Xml("unbalanced end tag".into()))?;
                close(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let text = text.unescape().map_err(xml_error)?.into_owned();
                    top.content.push(Node::Text(text));
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    top.content.push(Node::Text(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(EadError::Xml("unexpected end of document".into()));
    }
    root.ok_or_else(|| EadError::Xml("document has no root element".into()))
}

/// Parse an EAD3 description into its typed tree.
pub fn parse_finding_aid(source: &str) -> Result<FindingAid, EadError> {
    let root = parse_xml(source)?;
    if root.tag() != EadTag::Ead {
        return Err(EadError::MissingRoot("ead"));
    }
    let archdesc = root
        .first(EadTag::ArchDesc)
        .ok_or(EadError::MissingRoot("archdesc"))?;
    Ok(FindingAid {
        archdesc: component(archdesc),
    })
}

fn component(element: &Element) -> Component {
    let nested: Vec<&Element> = if element.tag() == EadTag::ArchDesc {
        element
            .children()
            .filter(|child| child.tag() == EadTag::Dsc)
            .flat_map(Element::children)
            .collect()
    } else {
        element.children().collect()
    };
    let components = nested
        .into_iter()
        .filter(|child| {
            let keep = child.tag() == EadTag::Component;
            if !keep && !matches!(child.tag(), EadTag::Did | EadTag::Dsc) {
                trace!(tag = %child.name, "ignoring element");
            }
            keep
        })
        .map(component)
        .collect();

    let did = element.first(EadTag::Did);
    let title = did
        .and_then(|did| did.first(EadTag::UnitTitle))
        .map(Element::text_content)
        .filter(|title| !title.is_empty());
    let links = did.map(links).unwrap_or_default();

    Component {
        div_type: element
            .attr("label")
            .or_else(|| element.attr("otherlevel"))
            .or_else(|| element.attr("level"))
            .unwrap_or(&element.name)
            .to_owned(),
        title,
        components,
        links,
    }
}

fn links(did: &Element) -> Vec<Link> {
    did.children()
        .filter_map(|child| match child.tag() {
            EadTag::Dao => digital_object(child).map(Link::Dao),
            EadTag::DaoSet => Some(Link::DaoSet(DaoSet {
                label: child.attr("label").map(str::to_owned),
                objects: child
                    .children()
                    .filter(|dao| dao.tag() == EadTag::Dao)
                    .filter_map(digital_object)
                    .collect(),
            })),
            _ => None,
        })
        .collect()
}

fn digital_object(dao: &Element) -> Option<DigitalObject> {
    let Some(href) = dao.attr("href") else {
        warn!("dao without href; skipped");
        return None;
    };
    let href = normalize_path(href);
    if href == ROOT_DIRECTORY {
        warn!("dao href points at the package root; skipped");
        return None;
    }
    Some(DigitalObject {
        href,
        label: dao
            .attr("linktitle")
            .or_else(|| dao.attr("label"))
            .map(str::to_owned),
    })
}

// ── synthesis ───────────────────────────────────────────────────────────

/// Logical structMap for a finding aid.
pub fn ead_structmap(
    aid: &FindingAid,
    filesec: &mut FileSecBuilder,
    ctx: &SynthContext<'_>,
    root_type: &str,
) -> StructMap {
    let mut root = Div::new(root_type);
    (root.dmd_ids, root.amd_ids) = ctx.directory_ids(ROOT_DIRECTORY);
    root.children
        .push(DivChild::Div(component_div(&aid.archdesc, filesec, ctx)));
    StructMap {
        kind: EAD_STRUCTMAP_TYPE.to_owned(),
        label: None,
        root,
    }
}

/// Parse `source` and compile its structMap.
///
/// Linked files are registered in `filesec`; finishing the builder yields the
/// fileSec and the path → id map. A run keeps using the same builder for its
/// supplementary structMap so both maps share ids.
pub fn compile_from_description(
    source: &str,
    filesec: &mut FileSecBuilder,
    ctx: &SynthContext<'_>,
    root_type: &str,
) -> Result<StructMap, CompileError> {
    let aid = parse_finding_aid(source)?;
    Ok(ead_structmap(&aid, filesec, ctx, root_type))
}

fn component_div(
    component: &Component,
    filesec: &mut FileSecBuilder,
    ctx: &SynthContext<'_>,
) -> Div {
    let mut div = Div::new(component.div_type.clone());
    div.label.clone_from(&component.title);
    for nested in &component.components {
        div.children
            .push(DivChild::Div(component_div(nested, filesec, ctx)));
    }
    for link in &component.links {
        if let Link::DaoSet(set) = link {
            let mut set_div = Div::new(DAOSET_DIV_TYPE);
            set_div.label.clone_from(&set.label);
            attach_links(&mut set_div, set.objects.iter(), filesec, ctx);
            div.children.push(DivChild::Div(set_div));
        }
    }
    let direct = component.links.iter().filter_map(|link| match link {
        Link::Dao(object) => Some(object),
        Link::DaoSet(_) => None,
    });
    attach_links(&mut div, direct, filesec, ctx);
    div
}

fn dao_div(object: &DigitalObject, ptr: FilePointer, props: &FileProperties) -> Div {
    let mut div = decorated_div(DAO_DIV_TYPE, ptr, props);
    div.label.clone_from(&object.label);
    div
}

fn attach_links<'o>(
    div: &mut Div,
    objects: impl Iterator<Item = &'o DigitalObject>,
    filesec: &mut FileSecBuilder,
    ctx: &SynthContext<'_>,
) {
    let mut resolved = Vec::new();
    for object in objects {
        if ctx.collected.get(&object.href).is_none() {
            warn!(href = %object.href, "linked object is not a known content path; skipped");
            continue;
        }
        let (ptr, props) = ctx.pointer(&object.href, filesec);
        resolved.push((object, ptr, props));
    }

    let wrap_each =
        resolved.len() > 1 && resolved.iter().any(|(_, _, props)| props.is_decorated());
    if wrap_each {
        for (object, ptr, props) in resolved {
            div.children
                .push(DivChild::Div(dao_div(object, ptr, &props)));
        }
        return;
    }

    let single_ordered =
        resolved.len() == 1 && resolved.iter().all(|(_, _, props)| props.order.is_some());
    if single_ordered {
        if let Some((object, ptr, props)) = resolved.pop() {
            if div.children.is_empty() && div.order.is_none() {
                div.order = props.order;
                div.children.push(DivChild::Pointer(ptr));
            } else {
                div.children
                    .push(DivChild::Div(dao_div(object, ptr, &props)));
            }
        }
        return;
    }

    div.children.extend(
        resolved
            .into_iter()
            .map(|(_, ptr, _)| DivChild::Pointer(ptr)),
    );
}
