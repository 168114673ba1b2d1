// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! METS serialization of the compiled sections.
//!
//! Each document is a `mets:mets` element holding exactly one section, ready
//! for the manifest assembler to splice into `mets.xml`. Id-list attributes
//! are space-joined and left out when empty.

use std::collections::BTreeSet;
use std::fmt::Display;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::model::{Div, DivChild, FileEntry, FileSec, StructMap};
use crate::CompileError;

/// METS namespace.
pub const METS_NS: &str = "http://www.loc.gov/METS/";
/// XLink namespace.
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
/// `mets:file/@USE` of bit-level-only objects.
pub const NO_VALIDATION_USE: &str = "fi-dpres-no-file-format-validation";

fn serialize_error(err: impl Display) -> CompileError {
    CompileError::Serialize(err.to_string())
}

fn id_list(ids: &BTreeSet<String>) -> Option<String> {
    (!ids.is_empty()).then(|| ids.iter().map(String::as_str).collect::<Vec<_>>().join(" "))
}

struct MetsWriter {
    inner: Writer<Vec<u8>>,
}

impl MetsWriter {
    fn new() -> Result<Self, CompileError> {
        let mut inner = Writer::new_with_indent(Vec::new(), b' ', 2);
        inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(serialize_error)?;
        let mut root = BytesStart::new("mets:mets");
        root.push_attribute(("xmlns:mets", METS_NS));
        root.push_attribute(("xmlns:xlink", XLINK_NS));
        inner
            .write_event(Event::Start(root))
            .map_err(serialize_error)?;
        Ok(Self { inner })
    }

    fn start(&mut self, start: BytesStart<'_>) -> Result<(), CompileError> {
        self.inner
            .write_event(Event::Start(start))
            .map_err(serialize_error)
    }

    fn empty(&mut self, start: BytesStart<'_>) -> Result<(), CompileError> {
        self.inner
            .write_event(Event::Empty(start))
            .map_err(serialize_error)
    }

    fn end(&mut self, name: &str) -> Result<(), CompileError> {
        self.inner
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(serialize_error)
    }

    fn div(&mut self, div: &Div) -> Result<(), CompileError> {
        let mut start = BytesStart::new("mets:div");
        start.push_attribute(("TYPE", div.kind.as_str()));
        if let Some(label) = &div.label {
            start.push_attribute(("LABEL", label.as_str()));
        }
        if let Some(order) = div.order {
            start.push_attribute(("ORDER", order.to_string().as_str()));
        }
        if let Some(dmd) = id_list(&div.dmd_ids) {
            start.push_attribute(("DMDID", dmd.as_str()));
        }
        if let Some(amd) = id_list(&div.amd_ids) {
            start.push_attribute(("ADMID", amd.as_str()));
        }
        if div.children.is_empty() {
            return self.empty(start);
        }
        self.start(start)?;
        for child in &div.children {
            match child {
                DivChild::Pointer(ptr) => {
                    let mut fptr = BytesStart::new("mets:fptr");
                    fptr.push_attribute(("FILEID", ptr.file_id.as_str()));
                    self.empty(fptr)?;
                }
                DivChild::Div(sub) => self.div(sub)?,
            }
        }
        self.end("mets:div")
    }

    fn file(&mut self, entry: &FileEntry) -> Result<(), CompileError> {
        let mut start = BytesStart::new("mets:file");
        start.push_attribute(("ID", entry.id.as_str()));
        if let Some(amd) = id_list(&entry.amd_ids) {
            start.push_attribute(("ADMID", amd.as_str()));
        }
        if entry.bit_level {
            start.push_attribute(("USE", NO_VALIDATION_USE));
        }
        self.start(start)?;

        let mut flocat = BytesStart::new("mets:FLocat");
        flocat.push_attribute(("LOCTYPE", "URL"));
        flocat.push_attribute(("xlink:type", "simple"));
        flocat.push_attribute(("xlink:href", entry.location().as_str()));
        self.empty(flocat)?;

        for stream in &entry.streams {
            let mut start = BytesStart::new("mets:stream");
            if let Some(amd) = id_list(&stream.amd_ids) {
                start.push_attribute(("ADMID", amd.as_str()));
            }
            self.empty(start)?;
        }
        self.end("mets:file")
    }

    fn finish(mut self) -> Result<String, CompileError> {
        self.end("mets:mets")?;
        String::from_utf8(self.inner.into_inner()).map_err(serialize_error)
    }
}

/// `mets:mets` document holding one `mets:structMap`.
pub fn structmap_document(structmap: &StructMap) -> Result<String, CompileError> {
    let mut out = MetsWriter::new()?;
    let mut start = BytesStart::new("mets:structMap");
    start.push_attribute(("TYPE", structmap.kind.as_str()));
    if let Some(label) = &structmap.label {
        start.push_attribute(("LABEL", label.as_str()));
    }
    out.start(start)?;
    out.div(&structmap.root)?;
    out.end("mets:structMap")?;
    out.finish()
}

/// `mets:mets` document holding the `mets:fileSec`.
pub fn filesec_document(filesec: &FileSec) -> Result<String, CompileError> {
    let mut out = MetsWriter::new()?;
    out.start(BytesStart::new("mets:fileSec"))?;
    for group in &filesec.groups {
        let mut start = BytesStart::new("mets:fileGrp");
        if let Some(use_label) = &group.use_label {
            start.push_attribute(("USE", use_label.as_str()));
        }
        out.start(start)?;
        for entry in &group.files {
            out.file(entry)?;
        }
        out.end("mets:fileGrp")?;
    }
    out.end("mets:fileSec")?;
    out.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{FileGroup, FileId, FilePointer, StreamEntry};

    fn ids(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn structmap_attributes_and_nesting() {
        let mut root = Div::new("directory").with_label(".");
        root.dmd_ids = ids(&["_d2", "_d1"]);
        root.children.push(DivChild::Pointer(FilePointer {
            file_id: FileId("_f1".into()),
        }));
        let mut wrapper = Div::wrapping(
            "file",
            FilePointer {
                file_id: FileId("_f2".into()),
            },
        );
        wrapper.order = Some(1);
        root.children.push(DivChild::Div(wrapper));
        root.children
            .push(DivChild::Div(Div::new("directory").with_label("a & b")));
        let xml = structmap_document(&StructMap {
            kind: "Directory-physical".into(),
            label: None,
            root,
        })
        .unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"<mets:mets xmlns:mets="http://www.loc.gov/METS/" xmlns:xlink="http://www.w3.org/1999/xlink">"#));
        assert!(xml.contains(r#"<mets:structMap TYPE="Directory-physical">"#));
        assert!(xml.contains(r#"<mets:div TYPE="directory" LABEL="." DMDID="_d1 _d2">"#));
        assert!(xml.contains(r#"<mets:div TYPE="file" ORDER="1">"#));
        assert!(xml.contains(r#"<mets:fptr FILEID="_f1"/>"#));
        assert!(xml.contains(r#"<mets:div TYPE="directory" LABEL="a &amp; b"/>"#));
        assert!(!xml.contains("ADMID"));
        let fptr = xml.find(r#"FILEID="_f1""#).unwrap();
        let wrapper = xml.find(r#"ORDER="1""#).unwrap();
        assert!(fptr < wrapper);
    }

    #[test]
    fn structmap_label_is_written() {
        let xml = structmap_document(&StructMap {
            kind: "logical".into(),
            label: Some("supplementary".into()),
            root: Div::new("fi-preservation-supplementary"),
        })
        .unwrap();
        assert!(xml.contains(r#"<mets:structMap TYPE="logical" LABEL="supplementary">"#));
        assert!(xml.contains(r#"<mets:div TYPE="fi-preservation-supplementary"/>"#));
    }

    #[test]
    fn filesec_groups_files_and_streams() {
        let main = FileEntry {
            id: FileId("_a".into()),
            path: "a/x y.wav".into(),
            amd_ids: ids(&["_tech", "_av"]),
            bit_level: true,
            streams: vec![StreamEntry {
                index: 0,
                amd_ids: ids(&["_s0"]),
            }],
        };
        let schema = FileEntry {
            id: FileId("_s".into()),
            path: "schemas/s.xsd".into(),
            amd_ids: BTreeSet::new(),
            bit_level: false,
            streams: Vec::new(),
        };
        let xml = filesec_document(&FileSec {
            groups: vec![
                FileGroup {
                    use_label: None,
                    files: vec![main],
                },
                FileGroup {
                    use_label: Some("fi-preservation-xml-schemas".into()),
                    files: vec![schema],
                },
            ],
        })
        .unwrap();

        assert!(xml.contains("<mets:fileGrp>"));
        assert!(xml.contains(r#"<mets:fileGrp USE="fi-preservation-xml-schemas">"#));
        assert!(xml.contains(
            r#"<mets:file ID="_a" ADMID="_av _tech" USE="fi-dpres-no-file-format-validation">"#
        ));
        assert!(xml.contains(
            r#"<mets:FLocat LOCTYPE="URL" xlink:type="simple" xlink:href="file://a/x%20y.wav"/>"#
        ));
        assert!(xml.contains(r#"<mets:stream ADMID="_s0"/>"#));
        assert!(xml.contains(r#"<mets:file ID="_s">"#));
        assert!(xml.trim_end().ends_with("</mets:mets>"));
    }

    #[test]
    fn empty_filesec_is_still_a_document() {
        let xml = filesec_document(&FileSec::default()).unwrap();
        assert!(xml.contains("<mets:fileSec>"));
        assert!(xml.contains("</mets:fileSec>"));
    }
}
