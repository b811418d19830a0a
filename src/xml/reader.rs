// Push-style XML reader
//
//  Copyright (C) 2014-2023 Ryan Specialty, LLC.
//
//  This file is part of TAME.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Push-style adapter over [`quick_xml`].
//!
//! [`NodesetXmlReader`] pulls events from a [`quick_xml::Reader`] over an
//!   in-memory document and pushes them into an [`XmlSink`]:
//!
//!   - a start tag becomes [`XmlSink::open`];
//!   - an end tag becomes [`XmlSink::close`];
//!   - an empty element becomes [`XmlSink::open`] followed by
//!       [`XmlSink::close`]; and
//!   - text and CDATA become [`XmlSink::text`],
//!       unescaped.
//!
//! Element and attribute names are delivered as local names,
//!   stripped of any namespace prefix.
//! Comments, processing instructions, and the XML declaration are
//!   discarded.
//!
//! Each tag event carries the byte offset into the document immediately
//!   following the tag,
//!     which allows a sink to recover the verbatim content between two
//!     tags from [`NodesetXmlReader::input`].

use quick_xml::{events::Event as XmlEvent, Reader as XmlReader};
use std::borrow::Cow;

/// Attribute of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr<'x> {
    /// Local name of the attribute.
    pub key: &'x str,

    /// Unescaped value.
    pub value: Cow<'x, str>,
}

impl<'x> Attr<'x> {
    pub fn new(key: &'x str, value: impl Into<Cow<'x, str>>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Value of the attribute named `key`,
///   if present.
pub fn attr<'x>(attrs: &'x [Attr<'_>], key: &str) -> Option<&'x str> {
    attrs
        .iter()
        .find(|attr| attr.key == key)
        .map(|attr| attr.value.as_ref())
}

/// Receiver of XML events.
///
/// Text passed to a sink is valid only for the duration of the call;
///   a sink must copy anything that it retains.
pub trait XmlSink {
    type Error: From<quick_xml::Error>;

    /// An element named `name` with attributes `attrs` opened,
    ///   ending at byte offset `pos`.
    fn open(
        &mut self,
        name: &str,
        attrs: &[Attr],
        pos: usize,
    ) -> Result<(), Self::Error>;

    /// The element named `name` closed,
    ///   ending at byte offset `pos`.
    fn close(&mut self, name: &str, pos: usize) -> Result<(), Self::Error>;

    /// Character data within the current element.
    ///
    /// Character data of a single element may be delivered in multiple
    ///   calls.
    fn text(&mut self, text: &str) -> Result<(), Self::Error>;
}

/// Reader of an in-memory XML document.
pub struct NodesetXmlReader<'i> {
    reader: XmlReader<&'i [u8]>,
    input: &'i str,
}

impl<'i> NodesetXmlReader<'i> {
    pub fn new(input: &'i str) -> Self {
        let mut reader = XmlReader::from_str(input);

        reader.expand_empty_elements(true).check_end_names(true);

        Self { reader, input }
    }

    /// The document being read.
    pub fn input(&self) -> &'i str {
        self.input
    }

    /// Byte offset of the reader into the document.
    pub fn position(&self) -> usize {
        self.reader.buffer_position()
    }

    /// Push every event of the document into `sink`.
    ///
    /// Errors
    /// ======
    /// The first error produced by either [`quick_xml`] or `sink` aborts
    ///   reading and is returned.
    pub fn run<S: XmlSink>(&mut self, sink: &mut S) -> Result<(), S::Error> {
        loop {
            match self.reader.read_event().map_err(S::Error::from)? {
                XmlEvent::Start(ele) => {
                    let name = utf8(ele.local_name().into_inner())?;

                    let raw = ele
                        .attributes()
                        .with_checks(false)
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(quick_xml::Error::from)?;

                    let attrs = raw
                        .iter()
                        .map(|attr| {
                            Ok(Attr {
                                key: utf8(attr.key.local_name().into_inner())?,
                                value: attr.unescape_value()?,
                            })
                        })
                        .collect::<Result<Vec<_>, quick_xml::Error>>()?;

                    sink.open(name, &attrs, self.position())?;
                }

                XmlEvent::End(ele) => {
                    let name = utf8(ele.local_name().into_inner())?;
                    sink.close(name, self.position())?;
                }

                XmlEvent::Text(text) => {
                    sink.text(&text.unescape().map_err(S::Error::from)?)?
                }

                XmlEvent::CData(data) => {
                    sink.text(utf8(&data.into_inner())?)?;
                }

                XmlEvent::Eof => break Ok(()),

                // Empty elements are expanded by the reader.
                XmlEvent::Empty(_)
                | XmlEvent::Comment(_)
                | XmlEvent::Decl(_)
                | XmlEvent::PI(_)
                | XmlEvent::DocType(_) => (),
            }
        }
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, quick_xml::Error> {
    Ok(std::str::from_utf8(bytes)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum Ev {
        Open(String, Vec<(String, String)>),
        Close(String),
        Text(String),
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Ev>,
        positions: Vec<usize>,
    }

    impl XmlSink for Recorder {
        type Error = quick_xml::Error;

        fn open(
            &mut self,
            name: &str,
            attrs: &[Attr],
            pos: usize,
        ) -> Result<(), Self::Error> {
            self.positions.push(pos);
            self.events.push(Ev::Open(
                name.into(),
                attrs
                    .iter()
                    .map(|a| (a.key.into(), a.value.to_string()))
                    .collect(),
            ));
            Ok(())
        }

        fn close(&mut self, name: &str, pos: usize) -> Result<(), Self::Error> {
            self.positions.push(pos);
            self.events.push(Ev::Close(name.into()));
            Ok(())
        }

        fn text(&mut self, text: &str) -> Result<(), Self::Error> {
            if !text.trim().is_empty() {
                self.events.push(Ev::Text(text.into()));
            }
            Ok(())
        }
    }

    fn read(input: &str) -> Result<Recorder, quick_xml::Error> {
        let mut sink = Recorder::default();
        NodesetXmlReader::new(input).run(&mut sink)?;
        Ok(sink)
    }

    #[test]
    fn strips_prefixes_and_unescapes() {
        let sink = read(
            r#"<?xml version="1.0"?>
               <ua:Alias xmlns:ua="urn:x" ua:Alias="A&amp;B">i=1 &lt;</ua:Alias>"#,
        )
        .expect("read failed");

        assert_eq!(
            vec![
                Ev::Open(
                    "Alias".into(),
                    vec![
                        ("ua".into(), "urn:x".into()),
                        ("Alias".into(), "A&B".into())
                    ]
                ),
                Ev::Text("i=1 <".into()),
                Ev::Close("Alias".into()),
            ],
            sink.events
        );
    }

    #[test]
    fn empty_element_opens_and_closes() {
        let sink = read(r#"<a><b x="1"/></a>"#).expect("read failed");

        assert_eq!(
            vec![
                Ev::Open("a".into(), vec![]),
                Ev::Open("b".into(), vec![("x".into(), "1".into())]),
                Ev::Close("b".into()),
                Ev::Close("a".into()),
            ],
            sink.events
        );
    }

    #[test]
    fn positions_follow_tags() {
        let input = "<a><b>text</b></a>";
        let sink = read(input).expect("read failed");

        assert_eq!(vec![3, 6, 14, 18], sink.positions);
        assert_eq!("text</b>", &input[sink.positions[1]..sink.positions[2]]);
    }

    #[test]
    fn cdata_is_text() {
        let sink = read("<a><![CDATA[<raw>]]></a>").expect("read failed");

        assert_eq!(Ev::Text("<raw>".into()), sink.events[1]);
    }

    #[test]
    fn mismatched_end_tag_fails() {
        assert!(read("<a><b></a>").is_err());
    }

    #[test]
    fn attr_lookup() {
        let attrs = [Attr::new("NodeId", "i=1"), Attr::new("IsForward", "false")];

        assert_eq!(Some("false"), attr(&attrs, "IsForward"));
        assert_eq!(None, attr(&attrs, "Symmetric"));
    }
}
